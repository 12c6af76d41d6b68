//! Instance ordering.
//!
//! A layered heuristic, not a single comparator family. The tiers run in this
//! exact order (downstream grouping assumes it):
//!
//! 1. Both identified, neither time-kind, neither numeric -> message index.
//! 2. Both time-kind *and* the same module name -> parsed timestamp. Time
//!    keys of different modules are deliberately not comparable and fall
//!    through to the later tiers.
//! 3. Both values parse as numbers -> numeric ascending.
//! 4. Both identified (mixed kinds) -> lexicographic.
//! 5. Exactly one side identified -> the identified side sorts first.
//! 6. Neither identified -> message index.
//!
//! Each instance's identifier is resolved once into a [`SortKey`] tag
//! (numeric / temporal / lexical / none), so "is this numeric or time-like"
//! is decided in one place.

use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::config::CompiledConfig;
use crate::engine::identify::{self, GroupKey};
use crate::timetext;
use crate::{NormalizedModule, SortKey};

/// Classify a resolved group key for sorting.
pub(crate) fn sort_key(key: &GroupKey, reference: NaiveDateTime) -> SortKey {
    if !key.from_identifier {
        return SortKey::None;
    }
    if key.is_time {
        return SortKey::Temporal(timetext::sort_timestamp(&key.key, reference));
    }
    if let Ok(n) = key.key.trim().parse::<f64>() {
        return SortKey::Numeric(n);
    }
    SortKey::Lexical(key.key.clone())
}

/// Sort instances in place by the tier order above. Ties keep extraction
/// order (the sort is stable).
///
/// The tier relation is not a total order: a temporal key compares by
/// timestamp against its own module but lexicographically against everything
/// else, which admits cycles across three or more keys. `slice::sort_by`
/// panics when it detects such a comparator, so this runs a stable insertion
/// sort instead, which accepts any pairwise relation.
pub(crate) fn sort_instances(instances: &mut Vec<NormalizedModule>, compiled: &CompiledConfig, reference: NaiveDateTime) {
    let paired: Vec<(NormalizedModule, GroupKey, SortKey)> = instances
        .drain(..)
        .map(|inst| {
            let key = identify::resolve_key(&inst, compiled);
            let tag = sort_key(&key, reference);
            (inst, key, tag)
        })
        .collect();

    let mut sorted: Vec<(NormalizedModule, GroupKey, SortKey)> = Vec::with_capacity(paired.len());
    for item in paired {
        let pos = sorted
            .iter()
            .rposition(|placed| compare(placed, &item) != Ordering::Greater)
            .map_or(0, |p| p + 1);
        sorted.insert(pos, item);
    }
    instances.extend(sorted.into_iter().map(|(inst, _, _)| inst));
}

fn compare(a: &(NormalizedModule, GroupKey, SortKey), b: &(NormalizedModule, GroupKey, SortKey)) -> Ordering {
    let (ia, ka, sa) = a;
    let (ib, kb, sb) = b;

    match (sa, sb) {
        // Tier 1: non-numeric, non-temporal identifiers keep transcript order.
        (SortKey::Lexical(_), SortKey::Lexical(_)) => ia.message_index.cmp(&ib.message_index),

        // Tier 2: time keys are only comparable within one module.
        (SortKey::Temporal(ta), SortKey::Temporal(tb)) if ia.module_name == ib.module_name => ta.cmp(tb),

        // Tier 6: neither side has an identifier.
        (SortKey::None, SortKey::None) => ia.message_index.cmp(&ib.message_index),

        // Tier 5: the identified side sorts first.
        (SortKey::None, _) => Ordering::Greater,
        (_, SortKey::None) => Ordering::Less,

        // Tiers 3 and 4 for the remaining mixes.
        _ => match (numeric(sa, ka), numeric(sb, kb)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => ka.key.cmp(&kb.key),
        },
    }
}

/// Numeric view of a key for tier 3. A temporal key whose raw value happens
/// to be a plain number still counts as numeric here.
fn numeric(tag: &SortKey, key: &GroupKey) -> Option<f64> {
    match tag {
        SortKey::Numeric(n) => Some(*n),
        SortKey::Temporal(_) => key.key.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Source;
    use crate::config::{ModuleDefinition, VariableDefinition};

    fn reference() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2023, 10, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn def(name: &str, id_var: &str) -> ModuleDefinition {
        ModuleDefinition {
            name: name.to_string(),
            variables: vec![VariableDefinition {
                name: id_var.to_string(),
                is_identifier: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn inst(module: &str, config: Option<usize>, message_index: i64, vars: &[(&str, &str)]) -> NormalizedModule {
        NormalizedModule {
            raw: String::new(),
            message_index,
            is_user: false,
            speaker: String::new(),
            source: Source::Chat,
            original_module_name: module.to_string(),
            module_name: module.to_string(),
            variables: vars.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            config,
        }
    }

    #[test]
    fn numeric_identifiers_sort_ascending() {
        let defs = vec![def("Status", "hp")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Status", Some(0), 0, &[("hp", "100")]),
            inst("Status", Some(0), 0, &[("hp", "90")]),
            inst("Status", Some(0), 1, &[("hp", "9.5")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        let hps: Vec<&str> = v.iter().map(|i| i.get("hp").unwrap()).collect();
        assert_eq!(hps, vec!["9.5", "90", "100"]);
    }

    #[test]
    fn textual_identifiers_keep_message_order() {
        let defs = vec![def("Char", "name")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Char", Some(0), 4, &[("name", "Zed")]),
            inst("Char", Some(0), 1, &[("name", "Ada")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].get("name"), Some("Ada"));
        assert_eq!(v[1].get("name"), Some("Zed"));
    }

    #[test]
    fn time_identifiers_sort_by_timestamp_within_module() {
        let defs = vec![def("Diary", "time")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Diary", Some(0), 0, &[("time", "2023-10-02 09:00")]),
            inst("Diary", Some(0), 1, &[("time", "2023-09-30 21:30")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].get("time"), Some("2023-09-30 21:30"));
    }

    #[test]
    fn range_midpoint_orders_between_endpoints() {
        let defs = vec![def("Diary", "time")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Diary", Some(0), 0, &[("time", "2024-01-02 12:00")]),
            inst("Diary", Some(0), 1, &[("time", "2024-01-01 00:00~2024-01-03 00:00")]),
            inst("Diary", Some(0), 2, &[("time", "2024-01-01 06:00")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        let times: Vec<&str> = v.iter().map(|i| i.get("time").unwrap()).collect();
        // Midpoint of the range is 2024-01-02 00:00.
        assert_eq!(times, vec!["2024-01-01 06:00", "2024-01-01 00:00~2024-01-03 00:00", "2024-01-02 12:00"]);
    }

    #[test]
    fn slash_date_time_identifiers_sort_chronologically() {
        let defs = vec![def("Diary", "time")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Diary", Some(0), 0, &[("time", "2024/01/02 10:00")]),
            inst("Diary", Some(0), 1, &[("time", "2023/01/01 10:00")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].get("time"), Some("2023/01/01 10:00"));
        assert_eq!(v[1].get("time"), Some("2024/01/02 10:00"));
    }

    #[test]
    fn cyclic_tier_relation_sorts_without_panicking() {
        // "Ada" and "Zed" compare by message index (9 > 1), "Zed" beats the
        // temporal key lexicographically, and the temporal key beats "Ada"
        // lexicographically: a three-way cycle the sorter must tolerate.
        let defs = vec![def("Char", "name"), def("Diary", "time")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Char", Some(0), 9, &[("name", "Ada")]),
            inst("Char", Some(0), 1, &[("name", "Zed")]),
            inst("Diary", Some(1), 0, &[("time", "Back then")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v.len(), 3);
        assert!(v.iter().any(|i| i.module_name == "Diary"));
        assert_eq!(v.iter().filter(|i| i.module_name == "Char").count(), 2);
    }

    #[test]
    fn cross_module_time_keys_fall_through_to_lexicographic() {
        let defs = vec![def("Diary", "time"), def("Agenda", "time")];
        let compiled = CompiledConfig::new(&defs);
        // Lexicographically "2023-01-01..." < "2024-01-01..." even though the
        // Agenda entry is chronologically later than Diary's.
        let mut v = vec![
            inst("Diary", Some(0), 0, &[("time", "2024-01-01 00:00")]),
            inst("Agenda", Some(1), 1, &[("time", "2023-01-01 00:00")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].module_name, "Agenda");
    }

    #[test]
    fn identified_sorts_before_unidentified() {
        let defs = vec![def("Status", "hp")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Mystery", None, 0, &[]),
            inst("Status", Some(0), 5, &[("hp", "10")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].module_name, "Status");
    }

    #[test]
    fn unidentified_instances_keep_message_order() {
        let compiled = CompiledConfig::new(&[]);
        let mut v = vec![
            inst("B", None, 7, &[]),
            inst("A", None, 2, &[]),
        ];
        sort_instances(&mut v, &compiled, reference());
        assert_eq!(v[0].module_name, "A");
    }

    #[test]
    fn unparseable_time_sorts_earliest() {
        let defs = vec![def("Diary", "time")];
        let compiled = CompiledConfig::new(&defs);
        let mut v = vec![
            inst("Diary", Some(0), 0, &[("time", "2023-09-30 21:30")]),
            inst("Diary", Some(0), 1, &[("time", "sometime later")]),
        ];
        sort_instances(&mut v, &compiled, reference());
        // Sentinel 0 sorts as "earliest/unknown".
        assert_eq!(v[0].get("time"), Some("sometime later"));
    }
}
