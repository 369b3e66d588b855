use std::sync::{Arc, Weak};

use crate::types::RunId;

/// How firmly a cache slot holds its materialized run.
///
/// Chosen once per archive at construction. `Strong` never lets go of a
/// loaded payload until `purge_cache`, which keeps tests deterministic;
/// `Reclaimable` keeps the payload only while some caller still holds the
/// `Arc` handed out by a lookup, so memory pressure resolves itself as
/// callers drop their handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefStrength {
    Strong,
    #[default]
    Reclaimable,
}

// ─── RunRef ─────────────────────────────────────────────────────────────────

/// A cache slot's handle on one materialized run.
///
/// The id stays readable even after the payload has been reclaimed; the
/// run number -> slot association is owned by the index and is never dropped
/// here.
#[derive(Debug)]
pub struct RunRef<R> {
    id: RunId,
    hold: Hold<R>,
}

#[derive(Debug)]
enum Hold<R> {
    Strong(Arc<R>),
    Weak(Weak<R>),
}

impl<R> RunRef<R> {
    /// Capture `run` at the strength configured for the owning archive.
    pub fn new(id: RunId, run: &Arc<R>, strength: RefStrength) -> Self {
        let hold = match strength {
            RefStrength::Strong => Hold::Strong(Arc::clone(run)),
            RefStrength::Reclaimable => Hold::Weak(Arc::downgrade(run)),
        };
        Self { id, hold }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// The payload, or `None` once it has been reclaimed. A reclaimed slot
    /// must be re-materialized by its owner; the wrapper itself stays put.
    pub fn get(&self) -> Option<Arc<R>> {
        match &self.hold {
            Hold::Strong(run) => Some(Arc::clone(run)),
            Hold::Weak(run) => run.upgrade(),
        }
    }
}
