use thiserror::Error;

/// Errors that propagate out of the processing pipeline.
///
/// Almost everything in this crate degrades gracefully (malformed brackets are
/// skipped, unknown names are kept as raw data, unparseable times sort as
/// "unknown"). The only failure a caller has to handle is a misconfigured
/// output policy, which is a configuration bug rather than bad input text.
#[derive(Debug, Error)]
pub enum ModloreError {
    #[error("unsupported output mode '{mode}' (expected 'full' or 'incremental')")]
    UnsupportedOutputMode { mode: String },
}
