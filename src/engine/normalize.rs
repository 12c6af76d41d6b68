//! Instance normalization.
//!
//! Maps each raw extracted instance onto its configured module definition:
//! module names resolve by exact match else alias membership, variable names
//! resolve through the definition's alias map (unknown names are dropped
//! silently), and every configured variable is present afterwards even when
//! the text never mentioned it. Unmatched modules are retained best-effort
//! with their raw name and pairs, so information is never lost just because
//! configuration is incomplete.
//!
//! After mapping, partial times are completed per originating message (see
//! `timetext`), then the whole set is ordered by the sorter.

use chrono::NaiveDateTime;

use crate::config::{CompiledConfig, VarFlags};
use crate::engine::{sort, variables};
use crate::timetext::{self, ReferenceTime};
use crate::{ExtractedModule, NormalizedModule, trace_enabled};

/// Normalize raw instances against the compiled configuration, complete
/// partial times, and return them in sorted order.
pub(crate) fn normalize(
    raw: Vec<ExtractedModule>,
    compiled: &CompiledConfig,
    reference: NaiveDateTime,
) -> Vec<NormalizedModule> {
    let mut out: Vec<NormalizedModule> = raw.into_iter().map(|e| normalize_one(e, compiled)).collect();
    complete_times(&mut out, compiled, reference);
    sort::sort_instances(&mut out, compiled, reference);
    out
}

fn normalize_one(extracted: ExtractedModule, compiled: &CompiledConfig) -> NormalizedModule {
    let raw = extracted.raw;
    let original_module_name = raw.module_name.clone();
    let parsed = variables::parse_variables(&raw.var_segment);

    let (module_name, variables, config) = match compiled.resolve_module(&raw.module_name) {
        Some(id) => {
            let module = compiled.module(id);
            // All configured variables present, empty until the text fills them.
            let mut vars: Vec<(String, String)> =
                module.var_order.iter().map(|name| (name.clone(), String::new())).collect();
            for pair in parsed {
                let Some(canonical) = module.var_aliases.get(&pair.name) else {
                    if trace_enabled() {
                        eprintln!("[normalize] dropping unknown variable '{}' on '{}'", pair.name, raw.module_name);
                    }
                    continue;
                };
                if let Some(slot) = vars.iter_mut().find(|(n, _)| n == canonical) {
                    slot.1 = pair.value;
                }
            }
            (compiled.canonical_name(id).to_string(), vars, Some(id))
        }
        None => {
            let vars = parsed.into_iter().map(|p| (p.name, p.value)).collect();
            (raw.module_name.clone(), vars, None)
        }
    };

    NormalizedModule {
        raw: raw.raw,
        message_index: extracted.message_index,
        is_user: extracted.is_user,
        speaker: extracted.speaker,
        source: extracted.source,
        original_module_name,
        module_name,
        variables,
        config,
    }
}

/// Whether a variable participates in time-key detection and completion.
fn is_timeish(inst: &NormalizedModule, name: &str, compiled: &CompiledConfig) -> bool {
    match inst.config {
        Some(id) => compiled.flags(id, name).contains(VarFlags::TIMEISH),
        None => name.to_lowercase().contains("time"),
    }
}

/// Complete partial time values (empty or bare `HH:MM`) within each group of
/// instances that share an originating message index.
fn complete_times(instances: &mut [NormalizedModule], compiled: &CompiledConfig, now: NaiveDateTime) {
    let mut indices: Vec<i64> = instances.iter().map(|i| i.message_index).collect();
    indices.sort_unstable();
    indices.dedup();

    for message_index in indices {
        let group: Vec<usize> =
            (0..instances.len()).filter(|&i| instances[i].message_index == message_index).collect();
        let Some(reference) = find_reference(instances, &group, compiled, now) else { continue };

        for &i in &group {
            let names: Vec<String> = instances[i].variables.iter().map(|(n, _)| n.clone()).collect();
            for name in names {
                if !is_timeish(&instances[i], &name, compiled) {
                    continue;
                }
                let value = instances[i].get(&name).unwrap_or("").to_string();
                if let Some(completed) = timetext::complete_value(&reference, &value) {
                    if trace_enabled() {
                        eprintln!(
                            "[normalize] completed '{}' on '{}' ({value:?} -> {completed:?})",
                            name, instances[i].module_name
                        );
                    }
                    instances[i].set(&name, completed);
                }
            }
        }
    }
}

/// Pick the group's reference time: a full-date value from a module flagged
/// as the time-reference standard wins; otherwise any time-named variable
/// that spells out a full date.
fn find_reference(
    instances: &[NormalizedModule],
    group: &[usize],
    compiled: &CompiledConfig,
    now: NaiveDateTime,
) -> Option<ReferenceTime> {
    for &i in group {
        let inst = &instances[i];
        let Some(id) = inst.config else { continue };
        if !compiled.definition(id).time_reference_standard {
            continue;
        }
        for (name, value) in &inst.variables {
            if is_timeish(inst, name, compiled) {
                if let Some(r) = ReferenceTime::from_value(value, now) {
                    return Some(r);
                }
            }
        }
    }

    for &i in group {
        let inst = &instances[i];
        for (name, value) in &inst.variables {
            if is_timeish(inst, name, compiled) {
                if let Some(r) = ReferenceTime::from_value(value, now) {
                    return Some(r);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModuleDefinition, VariableDefinition};
    use crate::engine::extract;
    use crate::transcript::ChatMessage;

    fn reference() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2023, 10, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn extract_one(text: &str) -> Vec<ExtractedModule> {
        extract::extract_from_messages(&[ChatMessage::new(text, false, "n")], 0, 0, None, &[])
    }

    fn status_defs() -> Vec<ModuleDefinition> {
        vec![ModuleDefinition {
            name: "Status".to_string(),
            compatible_module_names: vec!["State".to_string()],
            variables: vec![
                VariableDefinition {
                    name: "hp".to_string(),
                    is_identifier: true,
                    compatible_variable_names: vec!["health".to_string()],
                    ..Default::default()
                },
                VariableDefinition { name: "loc".to_string(), ..Default::default() },
            ],
            ..Default::default()
        }]
    }

    #[test]
    fn resolves_module_and_variable_aliases() {
        let defs = status_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[State|health:90]"), &compiled, reference());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].module_name, "Status");
        assert_eq!(out[0].original_module_name, "State");
        assert_eq!(out[0].get("hp"), Some("90"));
        // Configured but absent variables are present and empty.
        assert_eq!(out[0].get("loc"), Some(""));
    }

    #[test]
    fn unknown_variables_are_dropped_silently() {
        let defs = status_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[Status|hp:50|mana:10]"), &compiled, reference());
        assert_eq!(out[0].get("hp"), Some("50"));
        assert_eq!(out[0].get("mana"), None);
    }

    #[test]
    fn unmatched_module_keeps_raw_data() {
        let defs = status_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[Inventory|item:Sword]"), &compiled, reference());
        assert_eq!(out[0].module_name, "Inventory");
        assert!(out[0].config.is_none());
        assert_eq!(out[0].get("item"), Some("Sword"));
    }

    #[test]
    fn unparseable_variable_section_still_yields_instance() {
        let defs = status_defs();
        let compiled = CompiledConfig::new(&defs);
        // The lone segment is a bare name that resolves to nothing.
        let out = normalize(extract_one("[Status|junkdata]"), &compiled, reference());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("hp"), Some(""));
    }

    fn time_defs() -> Vec<ModuleDefinition> {
        vec![
            ModuleDefinition {
                name: "A".to_string(),
                time_reference_standard: true,
                variables: vec![VariableDefinition { name: "time".to_string(), ..Default::default() }],
                ..Default::default()
            },
            ModuleDefinition {
                name: "B".to_string(),
                variables: vec![VariableDefinition { name: "time".to_string(), ..Default::default() }],
                ..Default::default()
            },
        ]
    }

    #[test]
    fn completes_bare_time_from_reference_module() {
        let defs = time_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[A|time:2023-09-30 21:30] [B|time:08:23]"), &compiled, reference());

        let b = out.iter().find(|m| m.module_name == "B").unwrap();
        assert_eq!(b.get("time"), Some("2023-09-30 08:23"));
    }

    #[test]
    fn completes_in_reference_textual_pattern() {
        let defs = time_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[A|time:2023年9月30日 21:30] [B|time:08:23]"), &compiled, reference());

        let b = out.iter().find(|m| m.module_name == "B").unwrap();
        assert_eq!(b.get("time"), Some("2023年09月30日 08:23"));
    }

    #[test]
    fn empty_time_takes_full_reference_string() {
        let defs = time_defs();
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[A|time:2023-09-30 21:30] [B|time:]"), &compiled, reference());

        let b = out.iter().find(|m| m.module_name == "B").unwrap();
        assert_eq!(b.get("time"), Some("2023-09-30 21:30"));
    }

    #[test]
    fn any_full_date_serves_when_no_standard_module() {
        let mut defs = time_defs();
        defs[0].time_reference_standard = false;
        let compiled = CompiledConfig::new(&defs);
        let out = normalize(extract_one("[A|time:2023-09-30 21:30] [B|time:08:23]"), &compiled, reference());

        let b = out.iter().find(|m| m.module_name == "B").unwrap();
        assert_eq!(b.get("time"), Some("2023-09-30 08:23"));
    }

    #[test]
    fn completion_is_scoped_to_one_message() {
        let defs = time_defs();
        let compiled = CompiledConfig::new(&defs);
        let messages = vec![
            ChatMessage::new("[A|time:2023-09-30 21:30]", false, "n"),
            ChatMessage::new("[B|time:08:23]", false, "n"),
        ];
        let raw = extract::extract_from_messages(&messages, 0, 1, None, &[]);
        let out = normalize(raw, &compiled, reference());

        // B sits in a different message with no reference: left as written.
        let b = out.iter().find(|m| m.module_name == "B").unwrap();
        assert_eq!(b.get("time"), Some("08:23"));
    }
}
