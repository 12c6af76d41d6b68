//! Variable segment parsing.
//!
//! Given the text between a module header's first `|` and the closing `]`,
//! split it into `name:value` pairs. Splitting happens only at nesting depth
//! 0: pipes and colons inside a nested `[...]` belong to the nested module,
//! not to the enclosing segment.
//!
//! ```text
//! "hp:100|loc:Forest"              -> hp=100, loc=Forest
//! "flagged|hp:100"                 -> flagged="", hp=100
//! "actor:[Char|name:Ada]|mood:ok"  -> actor=[Char|name:Ada], mood=ok
//! ```

/// One parsed `name:value` pair (value may be empty for bare names).
#[derive(Debug, Clone)]
pub(crate) struct RawVariable {
    pub name: String,
    pub value: String,
    /// The value embeds a balanced `[...]` whose interior has a top-level `|`
    /// (i.e. a nested module, not just bracketed prose).
    pub contains_nested_module: bool,
}

/// Parse a variable segment into pairs. Never fails: a malformed segment
/// simply yields fewer (or zero) pairs.
pub(crate) fn parse_variables(segment: &str) -> Vec<RawVariable> {
    split_top_level(segment, b'|')
        .into_iter()
        .filter_map(|part| {
            let (name, value) = match top_level_byte(part, b':') {
                Some(colon) => (part[..colon].trim(), part[colon + 1..].trim()),
                None => (part.trim(), ""),
            };
            if name.is_empty() {
                return None;
            }
            Some(RawVariable {
                name: name.to_string(),
                value: value.to_string(),
                contains_nested_module: value_contains_module(value),
            })
        })
        .collect()
}

/// Split `segment` on `sep`, ignoring separators inside nested brackets.
pub(crate) fn split_top_level(segment: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut last = 0;
    for (i, b) in segment.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b if b == sep && depth == 0 => {
                parts.push(&segment[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&segment[last..]);
    parts
}

/// Byte offset of the first occurrence of `needle` at depth 0, if any.
fn top_level_byte(segment: &str, needle: u8) -> Option<usize> {
    let mut depth: i32 = 0;
    for (i, b) in segment.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b if b == needle && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Whether `value` contains a balanced `[...]` pair whose interior carries a
/// `|` at its own top level.
fn value_contains_module(value: &str) -> bool {
    let mut stack: Vec<usize> = Vec::new();
    for (i, b) in value.bytes().enumerate() {
        match b {
            b'[' => stack.push(i),
            b']' => {
                if let Some(open) = stack.pop() {
                    let interior = &value[open + 1..i];
                    let mut depth: i32 = 0;
                    for ib in interior.bytes() {
                        match ib {
                            b'[' => depth += 1,
                            b']' => depth -= 1,
                            b'|' if depth == 0 => return true,
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }
    false
}
