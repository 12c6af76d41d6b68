//! Module configuration and compilation.
//!
//! This module holds the *static* side of the pipeline: the user-authored
//! schemas (`ModuleDefinition` / `VariableDefinition`, persisted externally as
//! JSON) and the cheap indexes derived from them for one processing run.
//!
//! Processing is intentionally split into two phases:
//!
//! 1. **Compile/index definitions** (this module): build `CompiledConfig`, a
//!    read-only snapshot with name/alias lookup tables and per-variable flag
//!    sets.
//! 2. **Run** (see `engine.rs`): extract, normalize, sort, and merge against
//!    that snapshot.
//!
//! ## Invariants
//!
//! - `ModuleId` is an index into `CompiledConfig::modules`. Definitions that
//!   are disabled do not get a `ModuleId` and are invisible to matching.
//! - Alias resolution is idempotent: a canonical module or variable name
//!   always resolves to itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ModloreError;

/// A user-authored variable schema inside a [`ModuleDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableDefinition {
    /// Canonical variable name.
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Alternate spellings found in transcripts that resolve to `name`.
    pub compatible_variable_names: Vec<String>,
    /// Primary grouping/sort key.
    pub is_identifier: bool,
    /// Fallback key used when no primary identifier has a value.
    pub is_backup_identifier: bool,
    /// When the resolved value contains any of `hide_condition_values`, the
    /// whole instance is suppressed at render time.
    pub is_hide_condition: bool,
    pub hide_condition_values: Vec<String>,
    pub enabled: bool,
}

impl Default for VariableDefinition {
    fn default() -> Self {
        VariableDefinition {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            compatible_variable_names: Vec::new(),
            is_identifier: false,
            is_backup_identifier: false,
            is_hide_condition: false,
            hide_condition_values: Vec::new(),
            enabled: true,
        }
    }
}

/// A user-authored module schema.
///
/// Loaded once per session from external storage and treated as immutable for
/// the duration of a processing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleDefinition {
    /// Canonical module name (unique).
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    /// Alternate module names found in transcripts that resolve to `name`.
    pub compatible_module_names: Vec<String>,
    /// `"full"` or `"incremental"`; kept as the persisted string and parsed
    /// at merge time so an unknown value surfaces as an explicit error.
    pub output_mode: String,
    /// Ordering of this module's block in the assembled output.
    pub output_position: i32,
    /// Distinct-floor retention window for full output mode: -1 keeps all,
    /// 0 keeps nothing, N keeps the N most-recent distinct message indices.
    /// `None` falls back to the caller's global default. Recency is raw
    /// message index, which may differ from chronological recency when
    /// messages are deleted or reordered.
    pub retain_layers: Option<i32>,
    /// Advisory cardinality hints surfaced by the configuration UI.
    pub range_mode: String,
    pub item_min: i32,
    pub item_max: i32,
    /// This module's time variable is authoritative when completing partial
    /// times in the same message.
    pub time_reference_standard: bool,
    pub variables: Vec<VariableDefinition>,
}

impl Default for ModuleDefinition {
    fn default() -> Self {
        ModuleDefinition {
            name: String::new(),
            display_name: String::new(),
            enabled: true,
            compatible_module_names: Vec::new(),
            output_mode: "incremental".to_string(),
            output_position: 0,
            retain_layers: None,
            range_mode: String::new(),
            item_min: 0,
            item_max: 0,
            time_reference_standard: false,
            variables: Vec::new(),
        }
    }
}

/// Output policy parsed from `ModuleDefinition::output_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Field-by-field overlay per identifier group; only non-empty values
    /// override earlier ones.
    Incremental,
    /// Individual instances retained, windowed by most-recent distinct floors.
    Full,
}

impl FromStr for OutputMode {
    type Err = ModloreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(OutputMode::Incremental),
            "full" => Ok(OutputMode::Full),
            other => Err(ModloreError::UnsupportedOutputMode { mode: other.to_string() }),
        }
    }
}

// --- Compiled form ------------------------------------------------------------

/// Module identifier (index into `CompiledConfig::modules`).
pub(crate) type ModuleId = usize;

bitflags::bitflags! {
    /// Per-variable role flags, precomputed from the definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct VarFlags: u8 {
        const IDENTIFIER        = 1 << 0;
        const BACKUP_IDENTIFIER = 1 << 1;
        const HIDE_CONDITION    = 1 << 2;
        /// Canonical name contains "time" (case-insensitive); participates in
        /// time-key detection and cross-entry completion.
        const TIMEISH           = 1 << 3;
    }
}

/// Compiled view of one enabled module definition.
#[derive(Debug)]
pub(crate) struct CompiledModule {
    /// Index back into the definitions slice handed to `CompiledConfig::new`.
    pub def_index: usize,
    /// Enabled canonical variable names, in declared order.
    pub var_order: Vec<String>,
    /// Alias (and canonical) variable name -> canonical name.
    pub var_aliases: HashMap<String, String>,
    pub var_flags: HashMap<String, VarFlags>,
}

/// Pre-compiled configuration snapshot for one processing run.
///
/// Borrow-only: the definitions themselves stay owned by the caller (they come
/// from the host's settings store) and must not change mid-run.
#[derive(Debug)]
pub struct CompiledConfig<'a> {
    pub defs: &'a [ModuleDefinition],
    pub(crate) modules: Vec<CompiledModule>,
    /// Module name or alias -> `ModuleId`. Exact names win over aliases.
    name_lookup: HashMap<&'a str, ModuleId>,
}

impl<'a> CompiledConfig<'a> {
    pub fn new(defs: &'a [ModuleDefinition]) -> Self {
        let mut modules = Vec::new();
        let mut name_lookup: HashMap<&str, ModuleId> = HashMap::new();
        let mut alias_lookup: HashMap<&str, ModuleId> = HashMap::new();

        for (def_index, def) in defs.iter().enumerate() {
            if !def.enabled || def.name.is_empty() {
                continue;
            }
            let id = modules.len();

            let mut var_order = Vec::new();
            let mut var_aliases = HashMap::new();
            let mut var_flags = HashMap::new();
            for var in def.variables.iter().filter(|v| v.enabled && !v.name.is_empty()) {
                var_order.push(var.name.clone());
                var_aliases.insert(var.name.clone(), var.name.clone());
                for alias in &var.compatible_variable_names {
                    if !alias.is_empty() {
                        var_aliases.entry(alias.clone()).or_insert_with(|| var.name.clone());
                    }
                }

                let mut flags = VarFlags::empty();
                if var.is_identifier {
                    flags |= VarFlags::IDENTIFIER;
                }
                if var.is_backup_identifier {
                    flags |= VarFlags::BACKUP_IDENTIFIER;
                }
                if var.is_hide_condition {
                    flags |= VarFlags::HIDE_CONDITION;
                }
                if var.name.to_lowercase().contains("time") {
                    flags |= VarFlags::TIMEISH;
                }
                var_flags.insert(var.name.clone(), flags);
            }

            modules.push(CompiledModule { def_index, var_order, var_aliases, var_flags });
            name_lookup.insert(def.name.as_str(), id);
            for alias in &def.compatible_module_names {
                if !alias.is_empty() {
                    alias_lookup.entry(alias.as_str()).or_insert(id);
                }
            }
        }

        // Aliases never shadow a canonical name: resolving an
        // already-canonical name must return itself.
        for (alias, id) in alias_lookup {
            name_lookup.entry(alias).or_insert(id);
        }

        CompiledConfig { defs, modules, name_lookup }
    }

    /// Resolve a module name as written in text to a compiled module, by
    /// exact name match else alias membership.
    pub(crate) fn resolve_module(&self, name: &str) -> Option<ModuleId> {
        self.name_lookup.get(name).copied()
    }

    pub(crate) fn module(&self, id: ModuleId) -> &CompiledModule {
        &self.modules[id]
    }

    pub(crate) fn definition(&self, id: ModuleId) -> &ModuleDefinition {
        &self.defs[self.modules[id].def_index]
    }

    /// Canonical name of the definition backing `id`.
    pub(crate) fn canonical_name(&self, id: ModuleId) -> &str {
        &self.definition(id).name
    }

    pub(crate) fn flags(&self, id: ModuleId, var: &str) -> VarFlags {
        self.modules[id].var_flags.get(var).copied().unwrap_or(VarFlags::empty())
    }

    pub(crate) fn variable_definition(&self, id: ModuleId, var: &str) -> Option<&VariableDefinition> {
        self.definition(id).variables.iter().find(|v| v.name == var)
    }
}
