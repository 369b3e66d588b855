use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Run number: the integer key of one historical run.
///
/// Assigned when the run is created. Numbers on disk are not guaranteed to
/// appear in insertion order.
pub type RunNumber = u32;

// ─── RunId ──────────────────────────────────────────────────────────────────

/// Stable, opaque name of a run's canonical directory.
///
/// Independent of the run number and immutable once the directory exists.
/// Pure-decimal names are reserved for numeric alias directories, so a
/// `RunId` is never all digits by convention.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(SmolStr);

impl RunId {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(SmolStr::new(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// SmolStr hashes like str, so map lookups by &str stay consistent.
impl Borrow<str> for RunId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

// ─── Direction ──────────────────────────────────────────────────────────────

/// What "nearby" means when searching for a run by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Closest run number that is >= the probe.
    Asc,
    /// Closest run number that is <= the probe.
    Desc,
    /// The probe number itself, or nothing.
    Exact,
}
