//! Grouping, merging, and output serialization.
//!
//! Sorted instances are partitioned per module name and rendered under the
//! module's configured output policy:
//!
//! - **Incremental**: within each (module, identifier-key) group, later
//!   non-empty values overlay earlier ones field by field; an empty value
//!   never overwrites a prior non-empty one. One merged record per group.
//! - **Full**: the module's instances are windowed by distinct originating
//!   message index ("floor") first, then every surviving instance is emitted
//!   individually. `retain_layers` counts floors, not instances, and the
//!   window is shared across all identifier groups of the module.
//!
//! Both policies run hide-condition suppression before emission: a variable
//! flagged as a hide condition whose resolved value contains any configured
//! hide value (substring match) suppresses the whole record.
//!
//! Serialization is the wire form `[name|k:v|...]` with variables in the
//! definition's declared order (unconfigured modules keep their raw pair
//! order); empty values are omitted, and a record with nothing left still
//! serializes as `[name]`.

use std::collections::HashMap;

use crate::config::{CompiledConfig, OutputMode, VarFlags};
use crate::error::ModloreError;
use crate::{NormalizedModule, trace_enabled};

/// Rendered output of one merge run.
#[derive(Debug, Clone, Default)]
pub(crate) struct MergeOutput {
    /// Serialized records, newline-joined.
    pub content: String,
    /// Display names of the modules that emitted at least one record, in
    /// output order.
    pub titles: Vec<String>,
    /// Number of emitted records.
    pub module_count: usize,
}

/// Merge sorted instances into serialized output.
///
/// The only propagating failure is an unrecognized `output_mode` string on a
/// matched definition; everything else degrades to fewer records.
pub(crate) fn merge(
    instances: &[NormalizedModule],
    compiled: &CompiledConfig,
    default_retain_layers: i32,
) -> Result<MergeOutput, ModloreError> {
    let mut output = MergeOutput::default();
    let mut records: Vec<String> = Vec::new();

    for (name, group) in module_groups(instances, compiled) {
        let config = group[0].config;
        let mode = match config {
            Some(id) => compiled.definition(id).output_mode.parse::<OutputMode>()?,
            None => OutputMode::Incremental,
        };

        let emitted = match mode {
            OutputMode::Incremental => merge_incremental(&group, compiled),
            OutputMode::Full => {
                let retain = config
                    .and_then(|id| compiled.definition(id).retain_layers)
                    .unwrap_or(default_retain_layers);
                merge_full(&group, compiled, retain)
            }
        };

        if trace_enabled() {
            eprintln!("[merge] '{name}' {:?} -> {} records from {} instances", mode, emitted.len(), group.len());
        }
        if !emitted.is_empty() {
            let title = config
                .map(|id| {
                    let def = compiled.definition(id);
                    if def.display_name.is_empty() { def.name.clone() } else { def.display_name.clone() }
                })
                .unwrap_or_else(|| name.clone());
            output.titles.push(title);
            output.module_count += emitted.len();
            records.extend(emitted);
        }
    }

    output.content = records.join("\n");
    Ok(output)
}

/// Partition instances by module name (order preserved from the sorter),
/// then order the groups for output: configured modules by
/// (`output_position`, definition order), unconfigured groups after them in
/// first-appearance order.
fn module_groups<'a>(
    instances: &'a [NormalizedModule],
    compiled: &CompiledConfig,
) -> Vec<(String, Vec<&'a NormalizedModule>)> {
    let mut groups: Vec<(String, Vec<&NormalizedModule>)> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for inst in instances {
        match by_name.get(inst.module_name.as_str()) {
            Some(&i) => groups[i].1.push(inst),
            None => {
                by_name.insert(inst.module_name.as_str(), groups.len());
                groups.push((inst.module_name.clone(), vec![inst]));
            }
        }
    }

    let position = |group: &(String, Vec<&NormalizedModule>)| -> (i32, i64, usize) {
        match group.1[0].config {
            Some(id) => (0, compiled.definition(id).output_position as i64, compiled.module(id).def_index),
            None => (1, 0, 0),
        }
    };
    groups.sort_by_key(position);
    groups
}

/// Group a module's instances by identifier key, preserving order of first
/// appearance (the input is already sorted).
fn key_groups<'a>(
    group: &[&'a NormalizedModule],
    compiled: &CompiledConfig,
) -> Vec<Vec<&'a NormalizedModule>> {
    let mut out: Vec<Vec<&NormalizedModule>> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for inst in group {
        let key = crate::engine::identify::resolve_key(inst, compiled).key;
        match by_key.get(&key) {
            Some(&i) => out[i].push(inst),
            None => {
                by_key.insert(key, out.len());
                out.push(vec![inst]);
            }
        }
    }
    out
}

fn merge_incremental(group: &[&NormalizedModule], compiled: &CompiledConfig) -> Vec<String> {
    let mut records = Vec::new();
    for bucket in key_groups(group, compiled) {
        let first = bucket[0];
        let mut vars: Vec<(String, String)> = first.variables.clone();
        for inst in &bucket[1..] {
            for (name, value) in &inst.variables {
                if value.trim().is_empty() {
                    continue;
                }
                match vars.iter_mut().find(|(n, _)| n == name) {
                    Some(slot) => slot.1 = value.clone(),
                    None => vars.push((name.clone(), value.clone())),
                }
            }
        }
        if is_hidden(first.config, &vars, compiled) {
            continue;
        }
        records.push(serialize_record(&first.module_name, &vars));
    }
    records
}

fn merge_full(group: &[&NormalizedModule], compiled: &CompiledConfig, retain_layers: i32) -> Vec<String> {
    if retain_layers == 0 {
        return Vec::new();
    }

    // Floors are distinct message indices across the whole module, so two
    // instances on one floor consume a single retention slot, and the window
    // is shared by every identifier group.
    let survivors: Vec<&NormalizedModule> = if retain_layers < 0 {
        group.to_vec()
    } else {
        let mut floors: Vec<i64> = group.iter().map(|i| i.message_index).collect();
        floors.sort_unstable_by(|a, b| b.cmp(a));
        floors.dedup();
        floors.truncate(retain_layers as usize);
        group.iter().copied().filter(|i| floors.contains(&i.message_index)).collect()
    };

    let mut records = Vec::new();
    for bucket in key_groups(&survivors, compiled) {
        for inst in bucket {
            if is_hidden(inst.config, &inst.variables, compiled) {
                continue;
            }
            records.push(serialize_record(&inst.module_name, &inst.variables));
        }
    }
    records
}

/// Substring hide-condition check over a record's resolved variables.
fn is_hidden(config: Option<usize>, vars: &[(String, String)], compiled: &CompiledConfig) -> bool {
    let Some(id) = config else { return false };
    for (name, value) in vars {
        if !compiled.flags(id, name).contains(VarFlags::HIDE_CONDITION) {
            continue;
        }
        let Some(def) = compiled.variable_definition(id, name) else { continue };
        if def.hide_condition_values.iter().any(|h| !h.is_empty() && value.contains(h)) {
            return true;
        }
    }
    false
}

/// Wire form: `[name|k:v|...]` with empty values omitted; `[name]` when no
/// value survives.
fn serialize_record(name: &str, vars: &[(String, String)]) -> String {
    let mut out = String::from("[");
    out.push_str(name);
    for (k, v) in vars {
        if v.is_empty() {
            continue;
        }
        out.push('|');
        out.push_str(k);
        out.push(':');
        out.push_str(v);
    }
    out.push(']');
    out
}
