mod archive;
mod entries;

pub use archive::{RunArchive, RunSource};
pub use entries::{Entries, RunEntry};
