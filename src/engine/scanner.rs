//! Bracket scanner.
//!
//! Single left-to-right pass over a text buffer that finds well-formed
//! `[Name|...]` spans. An explicit stack of opening-bracket byte offsets
//! tracks nesting (no language recursion, so adversarial inputs with deep or
//! unbalanced nesting cannot blow the call stack).
//!
//! A matched bracket pair is a **module** iff its interior contains at least
//! one `|` at nesting level 0 relative to itself, and the text before that
//! first `|` (the candidate name) contains no `:`. Everything else is plain
//! bracketed prose and is skipped silently, never reported as an error:
//!
//! ```text
//! [Status|hp:100]     module "Status"
//! [just a note]       not a module (no pipe)
//! [a:b|c:d]           not a module (colon in the name position)
//! [|hp:100]           not a module (empty name)
//! [Item|name:Sword    not a module (never closed)
//! ```
//!
//! Parent/child relationships are attached in a second pass over the spans
//! sorted by start offset, using a stack of still-open modules.

use super::variables;
use crate::RawModule;

/// Scan `text` and return every well-formed module span, sorted by start
/// offset, with parent/child links attached.
pub(crate) fn scan(text: &str) -> Vec<RawModule> {
    let mut open_stack: Vec<usize> = Vec::new();
    let mut found: Vec<RawModule> = Vec::new();

    for (i, b) in text.bytes().enumerate() {
        match b {
            b'[' => open_stack.push(i),
            b']' => {
                // An unmatched `]` with an empty stack is plain text.
                let Some(open) = open_stack.pop() else { continue };
                let level = open_stack.len();
                let interior = &text[open + 1..i];
                if let Some((module_name, var_segment)) = split_module_header(interior) {
                    let parsed = variables::parse_variables(&var_segment);
                    let nested_variables: Vec<String> = parsed
                        .iter()
                        .filter(|v| v.contains_nested_module)
                        .map(|v| v.name.clone())
                        .collect();
                    found.push(RawModule {
                        raw: text[open..i + 1].to_string(),
                        start: open,
                        end: i + 1,
                        level,
                        module_name,
                        var_segment,
                        parent: None,
                        children: Vec::new(),
                        is_container: false,
                        nested_variables,
                    });
                }
            }
            _ => {}
        }
    }

    attach_children(&mut found);
    found
}

/// Split a bracket interior into `(name, variable segment)` if it qualifies
/// as a module header.
fn split_module_header(interior: &str) -> Option<(String, String)> {
    let pipe = top_level_pipe(interior)?;
    let name = interior[..pipe].trim();
    if name.is_empty() || name.contains(':') {
        return None;
    }
    Some((name.to_string(), interior[pipe + 1..].to_string()))
}

/// Byte offset of the first `|` at nesting depth 0 relative to `interior`.
fn top_level_pipe(interior: &str) -> Option<usize> {
    let mut depth: i32 = 0;
    for (i, b) in interior.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b'|' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Attach each module to the innermost enclosing module, if any.
///
/// Spans are properly nested by construction (they come from matched bracket
/// pairs), so a stack of "still open" modules is enough: pop every module
/// that ends before the current one starts, then the stack top encloses it.
fn attach_children(modules: &mut [RawModule]) {
    modules.sort_by_key(|m| m.start);

    let mut open: Vec<usize> = Vec::new();
    for idx in 0..modules.len() {
        let start = modules[idx].start;
        while let Some(&top) = open.last() {
            if modules[top].end <= start {
                open.pop();
            } else {
                break;
            }
        }
        if let Some(&parent) = open.last() {
            modules[idx].parent = Some(parent);
            modules[parent].children.push(idx);
            modules[parent].is_container = true;
        }
        open.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_module() {
        let found = scan("Hello [Status|hp:100|loc:Forest] world");
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!(m.module_name, "Status");
        assert_eq!(m.var_segment, "hp:100|loc:Forest");
        assert_eq!(m.raw, "[Status|hp:100|loc:Forest]");
        assert_eq!(m.level, 0);
        assert_eq!(&"Hello [Status|hp:100|loc:Forest] world"[m.start..m.end], m.raw);
    }

    #[test]
    fn raw_substring_round_trips() {
        let found = scan("x [Char|name:Ada|mood:calm] y");
        let again = scan(&found[0].raw);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].module_name, found[0].module_name);
        assert_eq!(again[0].var_segment, found[0].var_segment);
    }

    #[test]
    fn unbalanced_open_yields_nothing() {
        assert!(scan("[Item|name:Sword").is_empty());
    }

    #[test]
    fn stray_close_is_ignored() {
        let found = scan("oops] then [A|x:1] done");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].module_name, "A");
    }

    #[test]
    fn colon_in_name_is_not_a_module() {
        assert!(scan("[a:b|c:d]").is_empty());
    }

    #[test]
    fn empty_name_is_not_a_module() {
        assert!(scan("[|a:b]").is_empty());
    }

    #[test]
    fn pipeless_bracket_is_plain_text() {
        assert!(scan("[just a note] and [another]").is_empty());
    }

    #[test]
    fn nested_module_inside_value() {
        let text = "[Scene|place:dock|actor:[Char|name:Ada|hp:90]]";
        let found = scan(text);
        assert_eq!(found.len(), 2);

        let scene = found.iter().position(|m| m.module_name == "Scene").unwrap();
        let ada = found.iter().position(|m| m.module_name == "Char").unwrap();

        assert_eq!(found[ada].parent, Some(scene));
        assert_eq!(found[scene].children, vec![ada]);
        assert!(found[scene].is_container);
        assert_eq!(found[scene].level, 0);
        assert_eq!(found[ada].level, 1);
        assert_eq!(found[scene].nested_variables, vec!["actor".to_string()]);

        // Nesting invariant: parent strictly encloses the child.
        assert!(found[scene].start < found[ada].start);
        assert!(found[ada].end < found[scene].end);
    }

    #[test]
    fn siblings_under_one_parent() {
        let text = "[Party|a:[Char|name:Ada]|b:[Char|name:Bo]]";
        let found = scan(text);
        assert_eq!(found.len(), 3);
        let party = found.iter().position(|m| m.module_name == "Party").unwrap();
        assert_eq!(found[party].children.len(), 2);
        assert_eq!(found[party].nested_variables, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn non_module_brackets_do_not_become_parents() {
        // The outer pair has no pipe, so the inner module is a root.
        let found = scan("[note [A|x:1] end]");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].module_name, "A");
        assert_eq!(found[0].parent, None);
        // Depth still counts the non-module bracket.
        assert_eq!(found[0].level, 1);
    }

    #[test]
    fn cjk_text_offsets_are_bytes() {
        let text = "时间线：[日记|时间:2023年9月30日 21:30|内容:出发]";
        let found = scan(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].module_name, "日记");
        assert_eq!(&text[found[0].start..found[0].end], found[0].raw);
    }

    #[test]
    fn adversarial_deep_nesting_stays_flat() {
        let mut text = String::new();
        for _ in 0..5000 {
            text.push('[');
        }
        text.push_str("A|x:1");
        for _ in 0..5000 {
            text.push(']');
        }
        let found = scan(&text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].level, 4999);
    }
}
