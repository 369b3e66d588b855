use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::entries::Entries;
use crate::error::ArchiveError;
use crate::marker::Marker;
use crate::reference::{RefStrength, RunRef};
use crate::sorted::{SortedIntList, SortedList};
use crate::types::{Direction, RunId, RunNumber};

// ─── RunSource ──────────────────────────────────────────────────────────────

/// Owner-supplied capabilities the archive is parameterized over: how to
/// recognize a canonical run directory, how to fully deserialize one, and
/// how to project a run's number and id back out of the deserialized value.
pub trait RunSource {
    type Record;

    /// Whether a child of the base directory is a canonical-run candidate.
    /// Pure-decimal names are reserved for numeric aliases and excluded by
    /// the default.
    fn is_record_dir(&self, name: &str) -> bool {
        !name.is_empty() && !name.bytes().all(|b| b.is_ascii_digit())
    }

    fn number_of(&self, run: &Self::Record) -> RunNumber;

    fn id_of(&self, run: &Self::Record) -> RunId;

    /// Fully deserialize one canonical directory. Failures make the run
    /// unloadable for this lookup; they are never fatal to the archive.
    fn retrieve(&self, dir: &Path) -> Result<Self::Record, ArchiveError>;
}

// ─── Internal state ─────────────────────────────────────────────────────────

/// How a number -> directory binding entered the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Through a numeric alias whose canonical marker agreed.
    Alias,
    /// Through the canonical-directory listing.
    Scan,
    /// Through the creation hook.
    Created,
}

/// One indexed run: the verified id binding plus the cache slot. The slot
/// cycles between empty, held, and reclaimed; the binding never leaves the
/// index once observed.
struct Slot<R> {
    id: RunId,
    via: Resolution,
    cached: Option<RunRef<R>>,
}

struct State<R> {
    /// Canonical directory names, ascending. Filled by the one-time listing.
    ids_on_disk: SortedList<RunId>,
    listed: bool,
    /// Numeric alias directory names. Filled by the one-time alias scan.
    numbers_on_disk: SortedIntList,
    scanned_aliases: bool,
    /// Every verified number -> id binding. Iterated in reverse for the
    /// descending view.
    index: BTreeMap<RunNumber, Slot<R>>,
    by_id: FxHashMap<RunId, RunNumber>,
    /// Set once every listed canonical marker has been folded into `index`.
    complete: bool,
}

impl<R> State<R> {
    fn new() -> Self {
        Self {
            ids_on_disk: SortedList::new(),
            listed: false,
            numbers_on_disk: SortedIntList::new(),
            scanned_aliases: false,
            index: BTreeMap::new(),
            by_id: FxHashMap::default(),
            complete: false,
        }
    }

    /// Record a verified binding, overwriting any previous one for the same
    /// number. Returns the displaced slot.
    fn bind(
        &mut self,
        number: RunNumber,
        id: RunId,
        via: Resolution,
        cached: Option<RunRef<R>>,
    ) -> Option<Slot<R>> {
        let prev = self.index.insert(
            number,
            Slot {
                id: id.clone(),
                via,
                cached,
            },
        );
        if let Some(prev) = &prev {
            if prev.id != id {
                self.by_id.remove(&prev.id);
            }
        }
        self.by_id.insert(id, number);
        prev
    }
}

// ─── RunArchive ─────────────────────────────────────────────────────────────

/// Lazy, descending-ordered map from run number to run record, backed by
/// one directory per run.
///
/// Nothing is read at construction. A lookup consults the in-memory index
/// first, then the cheap numeric-alias directory, and only lists the
/// canonical directories once, on the first operation that needs the full
/// key set. Payloads are deserialized per entry on demand and cached behind
/// a [`RunRef`] of the configured strength.
pub struct RunArchive<S: RunSource> {
    dir: PathBuf,
    source: S,
    strength: RefStrength,
    state: RwLock<State<S::Record>>,
    /// Serializes index growth and `retrieve` calls. Lookups that miss the
    /// cache queue here, so each run is loaded once even under concurrent
    /// demand.
    load_lock: Mutex<()>,
}

impl<S: RunSource> RunArchive<S> {
    /// Bind an archive to its base directory. Fails only when the directory
    /// itself cannot be read; its contents are examined lazily later.
    pub fn open(
        dir: impl Into<PathBuf>,
        source: S,
        strength: RefStrength,
    ) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::read_dir(&dir).map_err(|e| ArchiveError::BaseDir {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self {
            dir,
            source,
            strength,
            state: RwLock::new(State::new()),
            load_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn strength(&self) -> RefStrength {
        self.strength
    }

    // ─── Lookup ─────────────────────────────────────────────────────────

    pub fn get(&self, number: RunNumber) -> Option<Arc<S::Record>> {
        self.get_by_number(number)
    }

    pub fn get_by_number(&self, number: RunNumber) -> Option<Arc<S::Record>> {
        if let Some(run) = self.cached(number) {
            return Some(run);
        }
        let _guard = self.load_lock.lock();
        self.resolve_number_locked(number)
    }

    /// Look a run up by its stable id. Pure-decimal ids name aliases, not
    /// runs, and are routed through the number path.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<S::Record>> {
        let known = self.state.read().by_id.get(id).copied();
        if let Some(number) = known {
            return self.get_by_number(number);
        }
        if !self.source.is_record_dir(id) {
            return id.parse().ok().and_then(|n| self.get_by_number(n));
        }

        let _guard = self.load_lock.lock();
        let known = self.state.read().by_id.get(id).copied();
        if let Some(number) = known {
            return self.load_indexed_locked(number);
        }
        let dir = self.dir.join(id);
        match Marker::read(&dir) {
            Ok(marker) if marker.id.as_str() == id => {
                let number = marker.number;
                self.bind_locked(number, marker.id, Resolution::Scan);
                self.load_indexed_locked(number)
            }
            Ok(marker) => {
                warn!(id, claimed = %marker.id, "directory marker names a different id; ignoring it");
                None
            }
            Err(err) => {
                debug!(id, %err, "no usable run directory for id");
                None
            }
        }
    }

    /// Find the run whose number is nearest `number` in the given direction,
    /// skipping runs that fail to load.
    pub fn search(&self, number: RunNumber, direction: Direction) -> Option<Arc<S::Record>> {
        if let Some(run) = self.get_by_number(number) {
            return Some(run);
        }
        if direction == Direction::Exact {
            return None;
        }

        // The alias cache alone cannot prove that no closer key exists, so
        // widen all the way: fold every canonical marker into the index,
        // then walk outward from the probe.
        let _guard = self.load_lock.lock();
        self.complete_index_locked();
        let candidates: Vec<RunNumber> = {
            let state = self.state.read();
            match direction {
                Direction::Asc => state
                    .index
                    .range((Excluded(number), Unbounded))
                    .map(|(n, _)| *n)
                    .collect(),
                Direction::Desc => state
                    .index
                    .range((Unbounded, Excluded(number)))
                    .rev()
                    .map(|(n, _)| *n)
                    .collect(),
                Direction::Exact => unreachable!(),
            }
        };
        for candidate in candidates {
            if let Some(run) = self.resolve_number_locked(candidate) {
                return Some(run);
            }
            // unloadable; keep widening
        }
        None
    }

    pub fn newest(&self) -> Option<Arc<S::Record>> {
        self.search(RunNumber::MAX, Direction::Desc)
    }

    pub fn oldest(&self) -> Option<Arc<S::Record>> {
        self.search(0, Direction::Asc)
    }

    /// Highest known run number. Fails on an empty archive instead of
    /// inventing a sentinel.
    pub fn first_key(&self) -> Result<RunNumber, ArchiveError> {
        self.newest()
            .map(|run| self.source.number_of(&run))
            .ok_or(ArchiveError::NoRuns)
    }

    /// Lowest known run number. Fails on an empty archive.
    pub fn last_key(&self) -> Result<RunNumber, ArchiveError> {
        self.oldest()
            .map(|run| self.source.number_of(&run))
            .ok_or(ArchiveError::NoRuns)
    }

    pub fn is_empty(&self) -> bool {
        self.newest().is_none()
    }

    /// Whether `number` is in the index. Does not touch disk and does not
    /// prove the run would load.
    pub fn contains_number(&self, number: RunNumber) -> bool {
        self.state.read().index.contains_key(&number)
    }

    // ─── Views ──────────────────────────────────────────────────────────

    /// All runs, newest first. Completes the index (listing plus marker
    /// reads) up front; payloads are still loaded entry by entry as the
    /// view is dereferenced.
    pub fn entries(&self) -> Entries<'_, S> {
        self.entries_between(Unbounded, Unbounded)
    }

    /// All known run numbers, newest first. Completes the index like
    /// [`Self::entries`].
    pub fn keys(&self) -> Vec<RunNumber> {
        self.entries().map(|entry| entry.number()).collect()
    }

    /// Runs with `to < number <= from`, newest first.
    pub fn sub_map(&self, from: RunNumber, to: RunNumber) -> Entries<'_, S> {
        if from <= to {
            return Entries::new(self, Vec::new());
        }
        self.entries_between(Excluded(to), Included(from))
    }

    /// Runs numbered above `to`, newest first.
    pub fn head_map(&self, to: RunNumber) -> Entries<'_, S> {
        self.entries_between(Excluded(to), Unbounded)
    }

    /// Runs numbered at or below `from`, newest first.
    pub fn tail_map(&self, from: RunNumber) -> Entries<'_, S> {
        self.entries_between(Unbounded, Included(from))
    }

    fn entries_between(&self, lo: Bound<RunNumber>, hi: Bound<RunNumber>) -> Entries<'_, S> {
        {
            let _guard = self.load_lock.lock();
            self.complete_index_locked();
        }
        let numbers: Vec<RunNumber> = {
            let state = self.state.read();
            state.index.range((lo, hi)).rev().map(|(n, _)| *n).collect()
        };
        Entries::new(self, numbers)
    }

    /// The currently materialized runs, newest first.
    pub fn loaded(&self) -> Vec<(RunNumber, Arc<S::Record>)> {
        let state = self.state.read();
        state
            .index
            .iter()
            .rev()
            .filter_map(|(number, slot)| Some((*number, slot.cached.as_ref()?.get()?)))
            .collect()
    }

    // ─── Mutation ───────────────────────────────────────────────────────

    /// Creation hook: make a freshly persisted run visible immediately,
    /// without waiting for a future lookup to discover its directory.
    ///
    /// Overwrites any previous binding for the same number. The returned
    /// handle is the caller's grip on the payload; with
    /// [`RefStrength::Reclaimable`] the cache keeps the run only while such
    /// handles exist.
    pub fn insert(&self, run: S::Record) -> Arc<S::Record> {
        let number = self.source.number_of(&run);
        let id = self.source.id_of(&run);
        let run = Arc::new(run);
        let _guard = self.load_lock.lock();
        let mut state = self.state.write();
        if state.listed && state.ids_on_disk.find(&id).is_none() {
            state.ids_on_disk.insert(id.clone());
        }
        let slot = RunRef::new(id.clone(), &run, self.strength);
        state.bind(number, id, Resolution::Created, Some(slot));
        run
    }

    /// Forget a run entirely: key, id binding, and cached payload.
    pub fn remove(&self, run: &S::Record) -> bool {
        let number = self.source.number_of(run);
        let _guard = self.load_lock.lock();
        let mut state = self.state.write();
        match state.index.remove(&number) {
            Some(slot) => {
                state.by_id.remove(&slot.id);
                state.ids_on_disk.remove_value(&slot.id);
                true
            }
            None => false,
        }
    }

    /// Drop every materialized payload. The index keeps all of its keys;
    /// subsequent lookups re-deserialize from disk.
    pub fn purge_cache(&self) {
        let mut state = self.state.write();
        for slot in state.index.values_mut() {
            slot.cached = None;
        }
    }

    // ─── Number allocation ──────────────────────────────────────────────

    /// Highest run number present on disk, aliases included; 0 when there
    /// are none.
    pub fn max_number(&self) -> RunNumber {
        let _guard = self.load_lock.lock();
        self.scan_aliases_locked();
        self.complete_index_locked();
        let state = self.state.read();
        let indexed = state.index.keys().next_back().copied().unwrap_or(0);
        indexed.max(state.numbers_on_disk.max())
    }

    /// Guard for the owner's number allocation: a new run must be numbered
    /// above everything already on disk.
    pub fn propose_new_number(&self, number: RunNumber) -> Result<(), ArchiveError> {
        let max = self.max_number();
        if number <= max {
            return Err(ArchiveError::NumberInUse {
                proposed: number,
                max,
            });
        }
        Ok(())
    }

    // ─── Resolution internals (all callers hold the load lock) ──────────

    fn cached(&self, number: RunNumber) -> Option<Arc<S::Record>> {
        let state = self.state.read();
        state.index.get(&number)?.cached.as_ref()?.get()
    }

    /// Resolve one number: cache, indexed binding, verified alias, then the
    /// one-time canonical scan. Every per-entry failure degrades to `None`.
    fn resolve_number_locked(&self, number: RunNumber) -> Option<Arc<S::Record>> {
        // another thread may have finished the same load while we queued
        if let Some(run) = self.cached(number) {
            return Some(run);
        }
        if self.state.read().index.contains_key(&number) {
            if let Some(run) = self.load_indexed_locked(number) {
                return Some(run);
            }
            // stale binding: the directory may have been rebuilt under a
            // new id, so fall through and probe again
        }
        if let Some(id) = self.probe_alias(number) {
            self.bind_locked(number, id, Resolution::Alias);
            return self.load_indexed_locked(number);
        }
        if !self.state.read().complete {
            self.complete_index_locked();
            if self.state.read().index.contains_key(&number) {
                return self.load_indexed_locked(number);
            }
        }
        None
    }

    /// Materialize the run bound at `number` and cache it. `None` when the
    /// directory fails to load or disagrees with its binding.
    fn load_indexed_locked(&self, number: RunNumber) -> Option<Arc<S::Record>> {
        let (id, via) = {
            let state = self.state.read();
            let slot = state.index.get(&number)?;
            if let Some(run) = slot.cached.as_ref().and_then(RunRef::get) {
                return Some(run);
            }
            (slot.id.clone(), slot.via)
        };
        let dir = self.dir.join(id.as_str());
        let run = match self.source.retrieve(&dir) {
            Ok(run) => run,
            Err(err) => {
                warn!(number, %id, %err, "run directory failed to load; treating the run as absent");
                return None;
            }
        };
        if self.source.number_of(&run) != number || self.source.id_of(&run) != id {
            warn!(
                number,
                %id,
                loaded_number = self.source.number_of(&run),
                "loaded run disagrees with its binding; discarding it"
            );
            return None;
        }
        debug!(number, %id, ?via, "materialized run");
        let run = Arc::new(run);
        let mut state = self.state.write();
        if let Some(slot) = state.index.get_mut(&number) {
            slot.cached = Some(RunRef::new(id, &run, self.strength));
        }
        Some(run)
    }

    /// Check the numeric alias directory for `number`. Trusted only when
    /// the alias marker claims this number AND the canonical directory's
    /// own marker agrees; aliases are shortcuts, not authority.
    fn probe_alias(&self, number: RunNumber) -> Option<RunId> {
        let alias_dir = self.dir.join(number.to_string());
        if !alias_dir.is_dir() {
            return None;
        }
        let claim = match Marker::read(&alias_dir) {
            Ok(marker) => marker,
            Err(err) => {
                debug!(number, %err, "alias directory without a readable marker");
                return None;
            }
        };
        if claim.number != number {
            warn!(
                number,
                claimed = claim.number,
                "alias disagrees with its own name; ignoring it"
            );
            return None;
        }
        let canonical = self.dir.join(claim.id.as_str());
        match Marker::read(&canonical) {
            Ok(own) if own.number == number && own.id == claim.id => Some(claim.id),
            Ok(own) => {
                warn!(
                    number,
                    alias_id = %claim.id,
                    canonical_number = own.number,
                    "alias target disagrees with the alias; ignoring it"
                );
                None
            }
            Err(err) => {
                debug!(number, id = %claim.id, %err, "alias target has no readable marker");
                None
            }
        }
    }

    fn bind_locked(&self, number: RunNumber, id: RunId, via: Resolution) {
        self.state.write().bind(number, id, via, None);
    }

    /// Fold every canonical directory's marker into the index. Marker reads
    /// only; no payload is deserialized. Runs at most once per archive.
    fn complete_index_locked(&self) {
        if self.state.read().complete {
            return;
        }
        self.list_canonical_locked();
        let pending: Vec<RunId> = {
            let state = self.state.read();
            state
                .ids_on_disk
                .iter()
                .filter(|id| !state.by_id.contains_key(id.as_str()))
                .cloned()
                .collect()
        };
        for id in pending {
            let dir = self.dir.join(id.as_str());
            match Marker::read(&dir) {
                Ok(marker) if marker.id == id => {
                    self.bind_locked(marker.number, id, Resolution::Scan);
                }
                Ok(marker) => {
                    warn!(%id, claimed = %marker.id, "canonical directory marker names a different id; skipping it");
                }
                Err(err) => {
                    debug!(%id, %err, "canonical directory without a readable marker; skipping it");
                }
            }
        }
        self.state.write().complete = true;
    }

    fn list_canonical_locked(&self) {
        if self.state.read().listed {
            return;
        }
        let names = self.list_names(|name| self.source.is_record_dir(name));
        let ids = SortedList::from_unsorted(names.into_iter().map(RunId::new).collect());
        debug!(count = ids.len(), "listed canonical run directories");
        let mut state = self.state.write();
        state.ids_on_disk = ids;
        state.listed = true;
    }

    fn scan_aliases_locked(&self) {
        if self.state.read().scanned_aliases {
            return;
        }
        let names = self.list_names(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
        let mut list = SortedIntList::with_capacity(names.len());
        for name in names {
            // a digit run too long for a run number is not an alias
            if let Ok(number) = name.parse::<RunNumber>() {
                list.add(number);
            }
        }
        let mut state = self.state.write();
        state.numbers_on_disk = list;
        state.scanned_aliases = true;
    }

    /// Immediate subdirectories of the base directory passing `keep`.
    fn list_names(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                // readable at open(); a base directory that vanished
                // mid-flight degrades to an empty listing
                warn!(dir = %self.dir.display(), %err, "cannot list archive directory");
                return Vec::new();
            }
        };
        let mut names = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if keep(name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

// Identity, not structure: an archive is only ever equal to itself, and two
// archives over different directories are never interchangeable.
impl<S: RunSource> PartialEq for RunArchive<S> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<S: RunSource> Eq for RunArchive<S> {}

impl<S: RunSource> Hash for RunArchive<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self as usize).hash(state);
    }
}

impl<S: RunSource> fmt::Debug for RunArchive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunArchive")
            .field("dir", &self.dir)
            .field("strength", &self.strength)
            .finish_non_exhaustive()
    }
}
