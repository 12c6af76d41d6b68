extern crate self as modlore;

use chrono::NaiveDateTime;

#[macro_use]
mod macros;
mod api;
mod config;
mod engine;
mod error;
mod timetext;
mod transcript;

pub use api::{
    CandidateSummary, Context, Options, ProcessDetails, ProcessOutcome, ProcessResult, StageSummary, extract,
    extract_messages, process, process_messages, process_verbose_with, scan_text,
};
pub use config::{CompiledConfig, ModuleDefinition, OutputMode, VariableDefinition};
pub use error::ModloreError;
pub use transcript::{ChatMessage, LoreEntry};

// --- Internal types ---------------------------------------------------------

/// Where an extracted module instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Chat,
    Worldbook,
}

/// A well-formed `[Name|...]` span discovered by the bracket scanner.
///
/// `start`/`end` are byte offsets into the scanned text (`end` exclusive).
/// `parent`/`children` index into the `Vec` returned by a single scan; the
/// tree is scanner-internal and not persisted anywhere.
#[derive(Debug, Clone)]
pub struct RawModule {
    /// Exact source substring including the brackets.
    pub raw: String,
    pub start: usize,
    pub end: usize,
    /// Bracket nesting depth at the opening `[` (0 = top level).
    pub level: usize,
    /// Module name exactly as written in the text (unresolved).
    pub module_name: String,
    /// Text between the first top-level `|` and the closing `]`.
    pub var_segment: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub is_container: bool,
    /// Names of variables whose value itself embeds a nested module.
    pub nested_variables: Vec<String>,
}

/// A `RawModule` plus provenance from the transcript it was found in.
#[derive(Debug, Clone)]
pub struct ExtractedModule {
    pub raw: RawModule,
    /// Originating message index, or -1 for lore-entry origin.
    pub message_index: i64,
    pub is_user: bool,
    pub speaker: String,
    pub source: Source,
    /// Wall-clock extraction time (not domain time).
    pub extracted_at: NaiveDateTime,
}

/// An extracted instance resolved against the module configuration.
///
/// `variables` holds every configured variable (empty string when absent from
/// the text) in the definition's declared order; unmatched modules keep the
/// raw pairs verbatim with `config == None`.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedModule {
    pub raw: String,
    pub message_index: i64,
    #[allow(dead_code)]
    pub is_user: bool,
    pub speaker: String,
    pub source: Source,
    pub original_module_name: String,
    pub module_name: String,
    pub variables: Vec<(String, String)>,
    /// Index into `CompiledConfig::modules`, or `None` if unmatched.
    pub config: Option<usize>,
}

impl NormalizedModule {
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.variables.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub(crate) fn set(&mut self, name: &str, value: String) {
        if let Some(slot) = self.variables.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        }
    }
}

/// Sort-key kind resolved from an instance's identifier value.
///
/// The sorter dispatches on this tag instead of re-deriving "is this
/// numeric/time-like" in multiple places.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortKey {
    Numeric(f64),
    Temporal(i64),
    Lexical(String),
    None,
}

pub(crate) fn trace_enabled() -> bool {
    std::env::var_os("MODLORE_DEBUG").is_some()
}
