use crate::config::{CompiledConfig, ModuleDefinition};
use crate::engine::{extract as extraction, merge, normalize, scanner};
use crate::error::ModloreError;
use crate::transcript::{self, ChatMessage, LoreEntry};
use crate::{ExtractedModule, trace_enabled};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Processing context.
///
/// Holds the environment needed to resolve partial times and drive
/// extraction; everything the host would normally read from its global
/// settings arrives here explicitly, so a run is a pure function of its
/// arguments.
#[derive(Debug, Clone)]
pub struct Context {
    /// Reference datetime used to resolve bare `HH:MM` values ("today").
    pub reference_time: NaiveDateTime,
    /// Ordered content-tag names; message bodies are trimmed to the text
    /// after the latest `<tag>` marker before scanning.
    pub content_tags: Vec<String>,
    /// Retention window applied to full-output modules whose definition
    /// leaves `retain_layers` unset.
    pub default_retain_layers: i32,
}

impl Default for Context {
    fn default() -> Self {
        let reference_time = if cfg!(test) {
            let date = NaiveDate::from_ymd_opt(2023, 10, 1).unwrap();
            let time = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
            NaiveDateTime::new(date, time)
        } else {
            Local::now().naive_local()
        };
        Self { reference_time, content_tags: Vec::new(), default_retain_layers: -1 }
    }
}

/// Options that affect processing behavior.
///
/// Intentionally minimal today; grows as more host-side switches are ported.
#[derive(Debug, Clone, Default)]
pub struct Options {}

/// Structured result handed back to the UI layer.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub success: bool,
    /// Serialized module records, newline-joined.
    pub content: String,
    /// Display names of the emitted modules, joined for the panel header.
    pub display_title: String,
    /// Number of emitted records.
    pub module_count: usize,
    pub has_content: bool,
}

/// A compact per-stage trace entry.
#[derive(Debug, Clone)]
pub struct StageSummary {
    pub stage: &'static str,
    pub duration: Duration,
    pub produced: usize,
}

/// A compact candidate summary used in verbose traces.
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub module_name: String,
    pub message_index: i64,
    pub speaker: String,
    pub preview: String,
}

/// Additional details returned by [`process_verbose_with`].
///
/// Meant for debugging and performance inspection without dumping the whole
/// internal state.
#[derive(Debug, Clone)]
pub struct ProcessDetails {
    pub total: Duration,
    pub stages: Vec<StageSummary>,
    /// Every extracted candidate before normalization and merging.
    pub candidates: Vec<CandidateSummary>,
}

/// Result from [`process_verbose_with`].
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub outcome: ProcessOutcome,
    pub details: ProcessDetails,
}

/// Extract modules from a duck-typed host transcript plus lore entries.
///
/// An absent or malformed message collection yields an empty result (traced,
/// never a panic): an empty extraction is a valid, if uninteresting, outcome.
pub fn extract(
    chat: &Value,
    lore: &[LoreEntry],
    start: i64,
    end: i64,
    filters: Option<&[ModuleDefinition]>,
    ctx: &Context,
) -> Vec<ExtractedModule> {
    match transcript::adapt_messages(chat) {
        Some(messages) => extract_messages(&messages, lore, start, end, filters, ctx),
        None => {
            if trace_enabled() {
                eprintln!("[extract] chat collection absent or not an array; returning empty");
            }
            extraction::extract_from_lore(lore, filters)
        }
    }
}

/// Typed-variant of [`extract`] for native callers.
pub fn extract_messages(
    messages: &[ChatMessage],
    lore: &[LoreEntry],
    start: i64,
    end: i64,
    filters: Option<&[ModuleDefinition]>,
    ctx: &Context,
) -> Vec<ExtractedModule> {
    let mut out = extraction::extract_from_messages(messages, start, end, filters, &ctx.content_tags);
    out.extend(extraction::extract_from_lore(lore, filters));
    out
}

/// Run the full pipeline over a duck-typed host transcript.
///
/// # Example
/// ```
/// use modlore::{Context, Options, process};
/// use serde_json::json;
///
/// let chat = json!([{ "mes": "onward [Status|hp:100|loc:Forest]", "is_user": false }]);
/// let out = process(&chat, &[], 0, 0, &[], &Context::default(), &Options::default()).unwrap();
/// assert!(out.has_content);
/// ```
pub fn process(
    chat: &Value,
    lore: &[LoreEntry],
    start: i64,
    end: i64,
    defs: &[ModuleDefinition],
    ctx: &Context,
    options: &Options,
) -> Result<ProcessOutcome, ModloreError> {
    let extracted = extract(chat, lore, start, end, None, ctx);
    run_pipeline(extracted, defs, ctx, options).map(|r| r.outcome)
}

/// Typed-variant of [`process`] for native callers.
pub fn process_messages(
    messages: &[ChatMessage],
    lore: &[LoreEntry],
    start: i64,
    end: i64,
    defs: &[ModuleDefinition],
    ctx: &Context,
    options: &Options,
) -> Result<ProcessOutcome, ModloreError> {
    let extracted = extract_messages(messages, lore, start, end, None, ctx);
    run_pipeline(extracted, defs, ctx, options).map(|r| r.outcome)
}

/// Run the full pipeline and return extra (compact) debug details.
///
/// Useful for profiling and configuration debugging; the plain [`process`]
/// path does not allocate these traces.
pub fn process_verbose_with(
    chat: &Value,
    lore: &[LoreEntry],
    start: i64,
    end: i64,
    defs: &[ModuleDefinition],
    ctx: &Context,
    options: &Options,
) -> Result<ProcessResult, ModloreError> {
    let extract_start = Instant::now();
    let extracted = extract(chat, lore, start, end, None, ctx);
    let extract_duration = extract_start.elapsed();
    let extracted_count = extracted.len();

    let candidates: Vec<CandidateSummary> = extracted
        .iter()
        .map(|e| CandidateSummary {
            module_name: e.raw.module_name.clone(),
            message_index: e.message_index,
            speaker: e.speaker.clone(),
            preview: e.raw.raw.chars().take(80).collect(),
        })
        .collect();

    let mut result = run_pipeline(extracted, defs, ctx, options)?;
    result.details.stages.insert(
        0,
        StageSummary { stage: "extract", duration: extract_duration, produced: extracted_count },
    );
    result.details.total += extract_duration;
    result.details.candidates = candidates;
    Ok(result)
}

fn run_pipeline(
    extracted: Vec<ExtractedModule>,
    defs: &[ModuleDefinition],
    ctx: &Context,
    _options: &Options,
) -> Result<ProcessResult, ModloreError> {
    let compiled = CompiledConfig::new(defs);

    let normalize_start = Instant::now();
    let normalized = normalize::normalize(extracted, &compiled, ctx.reference_time);
    let normalize_duration = normalize_start.elapsed();
    let normalized_count = normalized.len();

    let merge_start = Instant::now();
    let merged = merge::merge(&normalized, &compiled, ctx.default_retain_layers)?;
    let merge_duration = merge_start.elapsed();

    let outcome = ProcessOutcome {
        success: true,
        has_content: !merged.content.is_empty(),
        display_title: merged.titles.join(", "),
        module_count: merged.module_count,
        content: merged.content,
    };

    Ok(ProcessResult {
        outcome,
        details: ProcessDetails {
            total: normalize_duration + merge_duration,
            stages: vec![
                StageSummary { stage: "normalize", duration: normalize_duration, produced: normalized_count },
                StageSummary { stage: "merge", duration: merge_duration, produced: merged.module_count },
            ],
            candidates: Vec::new(),
        },
    })
}

/// Scan a standalone piece of text for module spans, without provenance.
///
/// Exposed for tooling (the debug binary uses it); the processing entry
/// points above are the real pipeline.
pub fn scan_text(text: &str) -> Vec<crate::RawModule> {
    scanner::scan(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariableDefinition;
    use serde_json::json;

    fn status_defs() -> Vec<ModuleDefinition> {
        vec![ModuleDefinition {
            name: "Status".to_string(),
            variables: vec![
                VariableDefinition { name: "hp".to_string(), is_identifier: true, ..Default::default() },
                VariableDefinition { name: "loc".to_string(), ..Default::default() },
            ],
            ..Default::default()
        }]
    }

    #[test]
    fn scenario_numeric_identifier_orders_output() {
        let chat = json!([{ "mes": "Hello [Status|hp:100|loc:Forest] world [Status|hp:90]", "is_user": false }]);
        let defs = status_defs();
        let out = process(&chat, &[], 0, 0, &defs, &Context::default(), &Options::default()).unwrap();

        assert!(out.success);
        assert_eq!(out.module_count, 2);
        assert_eq!(out.content, "[Status|hp:90]\n[Status|hp:100|loc:Forest]");
        assert_eq!(out.display_title, "Status");
        assert!(out.has_content);
    }

    #[test]
    fn round_trip_preserves_pairs() {
        let source = "[Status|hp:100|loc:Forest]";
        let chat = json!([{ "mes": source, "is_user": false }]);
        let defs = status_defs();
        let out = process(&chat, &[], 0, 0, &defs, &Context::default(), &Options::default()).unwrap();

        let rescanned = scan_text(&out.content);
        assert_eq!(rescanned.len(), 1);
        let mut original: Vec<_> = crate::engine::variables::parse_variables("hp:100|loc:Forest")
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect();
        let mut emitted: Vec<_> = crate::engine::variables::parse_variables(&rescanned[0].var_segment)
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect();
        original.sort();
        emitted.sort();
        assert_eq!(original, emitted);
    }

    #[test]
    fn malformed_chat_collection_is_an_empty_success() {
        let defs = status_defs();
        let out =
            process(&json!("not a transcript"), &[], 0, 10, &defs, &Context::default(), &Options::default()).unwrap();
        assert!(out.success);
        assert!(!out.has_content);
        assert_eq!(out.module_count, 0);
    }

    #[test]
    fn lore_entries_contribute_even_without_chat() {
        let lore = vec![LoreEntry::new("[Status|hp:42]", "bestiary")];
        let defs = status_defs();
        let out = process(&json!(null), &lore, 0, 0, &defs, &Context::default(), &Options::default()).unwrap();
        assert_eq!(out.content, "[Status|hp:42]");
    }

    #[test]
    fn unsupported_output_mode_surfaces_as_error() {
        let mut defs = status_defs();
        defs[0].output_mode = "archival".to_string();
        let chat = json!([{ "mes": "[Status|hp:1]", "is_user": false }]);
        let err = process(&chat, &[], 0, 0, &defs, &Context::default(), &Options::default()).unwrap_err();
        assert!(matches!(err, ModloreError::UnsupportedOutputMode { .. }));
    }

    #[test]
    fn verbose_includes_stages_and_candidates() {
        let chat = json!([{ "mes": "[Status|hp:90] [Status|hp:100]", "is_user": false }]);
        let defs = status_defs();
        let res =
            process_verbose_with(&chat, &[], 0, 0, &defs, &Context::default(), &Options::default()).unwrap();

        assert_eq!(res.details.candidates.len(), 2);
        assert_eq!(res.details.stages.len(), 3);
        assert_eq!(res.details.stages[0].stage, "extract");
        assert!(res.details.total >= res.details.stages[0].duration);
        assert_eq!(res.outcome.module_count, 2);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let chat = json!([
            { "mes": "[Status|hp:100|loc:Forest]", "is_user": false },
            { "mes": "[Status|hp:90]", "is_user": true }
        ]);
        let defs = status_defs();
        let ctx = Context::default();
        let a = process(&chat, &[], 0, 1, &defs, &ctx, &Options::default()).unwrap();
        let b = process(&chat, &[], 0, 1, &defs, &ctx, &Options::default()).unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.module_count, b.module_count);
    }
}
