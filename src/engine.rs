//! Extraction and merge engine.
//!
//! This module is the *operational core* of the crate: everything between
//! raw transcript text and serialized prompt output lives in the submodules
//! under `src/engine/`.
//!
//! ## How the parts work together
//!
//! Processing a transcript slice is a pipeline:
//!
//! ```text
//! messages ── extract (extract.rs) ──┐
//!   - clamp index range              │
//!   - content-tag trimming          │
//!   - scanner.rs over each body     │
//!   - raw-name filters              │
//! lore entries ─────────────────────┤
//!                                   v
//!                       normalize (normalize.rs)
//!                         - module/variable alias resolution
//!                         - time completion (timetext.rs)
//!                         - sort (sort.rs, keys from identify.rs)
//!                                   │
//!                                   v
//!                          merge (merge.rs)
//!                            - incremental overlay / full floor window
//!                            - hide-condition suppression
//!                            - wire serialization
//! ```
//!
//! ## Responsibilities by module
//!
//! - `scanner.rs`: stack-based bracket matching; decides what is a module.
//! - `variables.rs`: depth-aware `name:value` splitting of a segment.
//! - `extract.rs`: drives the scanner across messages and lore, attaching
//!   provenance.
//! - `identify.rs`: canonical grouping/sort keys from identifier variables.
//! - `normalize.rs`: raw instance -> configured canonical instance.
//! - `sort.rs`: the tiered comparator over resolved keys.
//! - `merge.rs`: output policies, hide conditions, and serialization.
//!
//! The whole pipeline is synchronous and pure: it reads its inputs, returns
//! newly allocated structures, and never blocks on I/O. Re-running it with
//! identical inputs yields identical output, so callers are free to debounce
//! or memoize around it.
//!
//! ## Debugging
//!
//! Set `MODLORE_DEBUG=1` to print extraction, normalization, and merge
//! decision traces.

#[path = "engine/extract.rs"]
pub(crate) mod extract;
#[path = "engine/identify.rs"]
pub(crate) mod identify;
#[path = "engine/merge.rs"]
pub(crate) mod merge;
#[path = "engine/normalize.rs"]
pub(crate) mod normalize;
#[path = "engine/scanner.rs"]
pub(crate) mod scanner;
#[path = "engine/sort.rs"]
pub(crate) mod sort;
#[path = "engine/variables.rs"]
pub(crate) mod variables;
