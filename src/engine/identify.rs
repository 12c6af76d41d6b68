//! Identifier key resolution.
//!
//! Instances of one module are grouped and sorted by a canonical key derived
//! from the variables the schema flags as identifiers. Resolution is tiered:
//!
//! 1. All primary identifier variables have non-empty values -> join them.
//! 2. Else, same with backup identifier variables.
//! 3. Else, concatenate every resolved value (or the literal `default`) so a
//!    module with no usable identifier still collapses into one bucket.
//!
//! A single identifier value may itself be multi-valued (`"a,b"`). For
//! matching, the value is canonicalized order-independently: split on the
//! separator set, trimmed, sorted, rejoined, so `"a,b"` and `"b、a"` produce
//! the same key. Time-flagged identifiers are exempt from the split: `/` is
//! also a date separator, and shredding `2024/01/02 10:00` into value parts
//! would destroy the key the temporal sort tier parses.

use crate::config::{CompiledConfig, VarFlags};
use crate::NormalizedModule;

/// Canonical grouping/sort key for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupKey {
    pub key: String,
    /// A contributing variable's canonical name contains "time".
    pub is_time: bool,
    /// Produced by tier 1 or 2 (a real identifier, not the fallback bucket).
    pub from_identifier: bool,
}

/// Order-independent canonical form of one (possibly multi-valued) value:
/// split on `,` `;` `、` `/`, trim, drop empties, sort, rejoin with `|`.
pub(crate) fn canonical_value(value: &str) -> String {
    let mut parts: Vec<&str> =
        value.split([',', ';', '、', '/']).map(str::trim).filter(|p| !p.is_empty()).collect();
    parts.sort_unstable();
    parts.join("|")
}

/// Resolve the grouping key for `inst` per the tier order above.
pub(crate) fn resolve_key(inst: &NormalizedModule, compiled: &CompiledConfig) -> GroupKey {
    if let Some(id) = inst.config {
        if let Some(key) = key_from_flag(inst, compiled, id, VarFlags::IDENTIFIER) {
            return key;
        }
        if let Some(key) = key_from_flag(inst, compiled, id, VarFlags::BACKUP_IDENTIFIER) {
            return key;
        }
    }
    fallback_key(inst)
}

/// Tier 1/2: every variable carrying `flag` must have a non-empty value.
fn key_from_flag(inst: &NormalizedModule, compiled: &CompiledConfig, id: usize, flag: VarFlags) -> Option<GroupKey> {
    let module = compiled.module(id);
    let flagged: Vec<&str> =
        module.var_order.iter().filter(|name| compiled.flags(id, name).contains(flag)).map(String::as_str).collect();
    if flagged.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(flagged.len());
    let mut is_time = false;
    for name in &flagged {
        let value = inst.get(name).unwrap_or("");
        if value.trim().is_empty() {
            return None;
        }
        // Time values keep their raw shape: `/` doubles as a date separator.
        if compiled.flags(id, name).contains(VarFlags::TIMEISH) {
            parts.push(value.trim().to_string());
            is_time = true;
        } else {
            parts.push(canonical_value(value));
        }
    }
    Some(GroupKey { key: parts.join("__"), is_time, from_identifier: true })
}

/// Tier 3: one shared bucket per module built from all values.
fn fallback_key(inst: &NormalizedModule) -> GroupKey {
    let joined: String =
        inst.variables.iter().map(|(_, v)| v.trim()).filter(|v| !v.is_empty()).collect::<Vec<_>>().join("");
    let key = if joined.is_empty() { "default".to_string() } else { joined };
    GroupKey { key, is_time: false, from_identifier: false }
}
