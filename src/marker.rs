use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::types::{RunId, RunNumber};

/// Name of the sidecar metadata file present in every run directory.
pub const MARKER_FILE: &str = "marker.json";

/// Lightweight per-directory metadata: the run's number and id.
///
/// Both canonical directories and numeric alias directories carry a marker,
/// so either can answer "which run is this?" without deserializing the
/// payload. An alias marker is a claim; the canonical directory's own marker
/// is the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub number: RunNumber,
    pub id: RunId,
}

impl Marker {
    pub fn new(number: RunNumber, id: RunId) -> Self {
        Self { number, id }
    }

    /// Read the marker of `dir`, without touching the payload.
    pub fn read(dir: &Path) -> Result<Self, ArchiveError> {
        let path = dir.join(MARKER_FILE);
        let raw = fs::read(&path).map_err(|source| ArchiveError::MarkerRead {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&raw)
            .map_err(|source| ArchiveError::MarkerFormat { path, source })
    }

    /// Write the marker into `dir`. Used by owners (and fixtures) that
    /// create run directories; the archive itself never writes markers.
    pub fn write(&self, dir: &Path) -> Result<(), ArchiveError> {
        let path = dir.join(MARKER_FILE);
        let raw = serde_json::to_vec(self).map_err(|source| ArchiveError::MarkerFormat {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, raw).map_err(|source| ArchiveError::MarkerWrite { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_roundtrip() {
        let dir = TempDir::new().unwrap();
        let marker = Marker::new(42, RunId::new("2024-03-01_10-15-30"));
        marker.write(dir.path()).unwrap();

        let back = Marker::read(dir.path()).unwrap();
        assert_eq!(back, marker);
    }

    #[test]
    fn test_missing_marker() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Marker::read(dir.path()),
            Err(ArchiveError::MarkerRead { .. })
        ));
    }

    #[test]
    fn test_malformed_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MARKER_FILE), b"{not json").unwrap();
        assert!(matches!(
            Marker::read(dir.path()),
            Err(ArchiveError::MarkerFormat { .. })
        ));
    }
}
