//! Module extraction over a transcript slice.
//!
//! Drives the bracket scanner across a bounded message-index range plus a
//! list of auxiliary lore entries, tagging every discovered module with its
//! provenance (message index, speaker, source). Before scanning, each message
//! body goes through content-tag trimming: given an ordered tag list, the
//! text after the *latest* `<tag>` marker occurrence wins, which strips the
//! narrative body and leaves only the structured tail the host renders.
//!
//! Raw-name module filters (name or configured alias) apply here, before
//! normalization, so a caller can extract a single module cheaply.

use chrono::Local;

use crate::config::ModuleDefinition;
use crate::transcript::{ChatMessage, LoreEntry};
use crate::{ExtractedModule, Source, trace_enabled};

use super::scanner;

/// Extract modules from `messages[start..=end]` (clamped to valid indices).
pub(crate) fn extract_from_messages(
    messages: &[ChatMessage],
    start: i64,
    end: i64,
    filters: Option<&[ModuleDefinition]>,
    content_tags: &[String],
) -> Vec<ExtractedModule> {
    let mut out = Vec::new();
    if messages.is_empty() {
        return out;
    }

    let first = start.max(0) as usize;
    let last = end.min(messages.len() as i64 - 1);
    if last < first as i64 {
        return out;
    }

    let now = Local::now().naive_local();
    for index in first..=last as usize {
        let message = &messages[index];
        let body = trim_content_tags(&message.text, content_tags);
        for raw in scanner::scan(body) {
            if !passes_filter(&raw.module_name, filters) {
                continue;
            }
            out.push(ExtractedModule {
                raw,
                message_index: index as i64,
                is_user: message.is_user,
                speaker: message.speaker.clone(),
                source: Source::Chat,
                extracted_at: now,
            });
        }
    }

    if trace_enabled() {
        eprintln!("[extract] messages {first}..={last} -> {} modules", out.len());
    }
    out
}

/// Extract modules from lore entries. No message-index context exists here:
/// every instance gets index -1 and the `worldbook` provenance.
pub(crate) fn extract_from_lore(entries: &[LoreEntry], filters: Option<&[ModuleDefinition]>) -> Vec<ExtractedModule> {
    let now = Local::now().naive_local();
    let mut out = Vec::new();
    for entry in entries {
        for raw in scanner::scan(&entry.content) {
            if !passes_filter(&raw.module_name, filters) {
                continue;
            }
            out.push(ExtractedModule {
                raw,
                message_index: -1,
                is_user: false,
                speaker: "worldbook".to_string(),
                source: Source::Worldbook,
                extracted_at: now,
            });
        }
    }
    if trace_enabled() {
        eprintln!("[extract] {} lore entries -> {} modules", entries.len(), out.len());
    }
    out
}

/// Keep only the text after whichever configured `<tag>` marker occurs latest
/// in `body`. For each tag only its *last* occurrence counts. With no match
/// the body passes through unchanged.
fn trim_content_tags<'a>(body: &'a str, tags: &[String]) -> &'a str {
    let mut cut: Option<usize> = None;
    for tag in tags {
        if tag.is_empty() {
            continue;
        }
        let marker = format!("<{tag}>");
        if let Some(pos) = body.rfind(&marker) {
            let after = pos + marker.len();
            if cut.is_none_or(|c| after > c) {
                cut = Some(after);
            }
        }
    }
    match cut {
        Some(c) => &body[c..],
        None => body,
    }
}

/// Raw-name filter: the name as written must equal a filter's canonical name
/// or appear in its alias list.
fn passes_filter(name: &str, filters: Option<&[ModuleDefinition]>) -> bool {
    let Some(filters) = filters else { return true };
    filters.iter().any(|f| f.name == name || f.compatible_module_names.iter().any(|a| a == name))
}
