//! Lazy-loading, cached, descending-ordered index over an on-disk history
//! of run records, one directory per run.
//!
//! A CI job accumulates thousands of runs; loading them all at startup does
//! not scale. [`RunArchive`] looks and feels like a sorted map keyed by run
//! number, but materializes records on demand: cheap numeric-alias
//! directories answer point lookups, the canonical id-named directories are
//! listed once when a full key set is needed, and payloads are cached behind
//! references that can be reclaimed without losing the key.

pub mod archive;
pub mod error;
pub mod marker;
pub mod reference;
pub mod sorted;
pub mod types;

pub use archive::{Entries, RunArchive, RunEntry, RunSource};
pub use error::ArchiveError;
pub use marker::{MARKER_FILE, Marker};
pub use reference::{RefStrength, RunRef};
pub use sorted::{SortedIntList, SortedList};
pub use types::{Direction, RunId, RunNumber};
