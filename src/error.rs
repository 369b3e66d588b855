// ─── Error ──────────────────────────────────────────────────────────────────
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::RunNumber;

/// Errors surfaced by the archive.
///
/// Per-entry problems (missing markers, corrupt payloads, lying aliases) are
/// absorbed by the lookup paths and reported as absence; only conditions the
/// caller must act on live here.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive directory {path} is not accessible")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive has no runs")]
    NoRuns,
    #[error("cannot read marker in {path}")]
    MarkerRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("marker in {path} is malformed")]
    MarkerFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot write marker to {path}")]
    MarkerWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to load run data from {path}")]
    Retrieve {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("run #{proposed} is not above the current maximum #{max}")]
    NumberInUse { proposed: RunNumber, max: RunNumber },
}

impl ArchiveError {
    /// Wrap an arbitrary deserialization failure from a `RunSource`.
    pub fn retrieve(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Retrieve {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
