use std::sync::Arc;

use super::archive::{RunArchive, RunSource};
use crate::types::RunNumber;

/// Descending view over the archive's run numbers.
///
/// The key set is fixed when the view is created; values are materialized
/// one by one as `RunEntry::value` is called.
pub struct Entries<'a, S: RunSource> {
    archive: &'a RunArchive<S>,
    numbers: std::vec::IntoIter<RunNumber>,
}

impl<'a, S: RunSource> Entries<'a, S> {
    pub(crate) fn new(archive: &'a RunArchive<S>, numbers: Vec<RunNumber>) -> Self {
        Self {
            archive,
            numbers: numbers.into_iter(),
        }
    }
}

impl<'a, S: RunSource> Iterator for Entries<'a, S> {
    type Item = RunEntry<'a, S>;

    fn next(&mut self) -> Option<Self::Item> {
        let number = self.numbers.next()?;
        Some(RunEntry {
            archive: self.archive,
            number,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.numbers.size_hint()
    }
}

impl<S: RunSource> ExactSizeIterator for Entries<'_, S> {}

/// One key of a descending view.
pub struct RunEntry<'a, S: RunSource> {
    archive: &'a RunArchive<S>,
    number: RunNumber,
}

impl<S: RunSource> RunEntry<'_, S> {
    pub fn number(&self) -> RunNumber {
        self.number
    }

    /// Load the run behind this key. `None` if it became unloadable or was
    /// deleted since the view was created.
    pub fn value(&self) -> Option<Arc<S::Record>> {
        self.archive.get_by_number(self.number)
    }
}
