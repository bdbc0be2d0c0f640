use tracing::debug;

use crate::core::RowKey;

use super::iterator::CoIterator;
use super::storage::{SearchMode, TableStorage};

/// Merged ascending key list of several storages, used to align series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRegistry {
    keys: Vec<RowKey>,
    sync_mode: bool,
}

impl KeyRegistry {
    /// Merges the keys of `storages` into one de-duplicated ascending list.
    #[must_use]
    pub fn from_storages(storages: &[&TableStorage]) -> Self {
        let mut keys: Vec<RowKey> = storages.iter().flat_map(|storage| storage.keys()).collect();
        keys.sort_unstable();
        keys.dedup();
        let sync_mode = storages
            .iter()
            .all(|storage| storage.len() == keys.len() && storage.keys().eq(keys.iter().copied()));
        debug!(
            sources = storages.len(),
            keys = keys.len(),
            sync_mode,
            "merge key registry"
        );
        Self { keys, sync_mode }
    }

    /// Registry over an explicit key sequence, sorted and de-duplicated.
    #[must_use]
    pub fn from_keys(mut keys: Vec<RowKey>) -> Self {
        keys.sort_unstable();
        keys.dedup();
        Self {
            keys,
            sync_mode: true,
        }
    }

    /// Whether every source storage holds exactly the registry keys.
    #[must_use]
    pub fn is_in_sync_mode(&self) -> bool {
        self.sync_mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<RowKey> {
        self.keys.get(index).copied()
    }

    #[must_use]
    pub fn index_of_key(&self, key: RowKey, mode: SearchMode) -> Option<usize> {
        match self.keys.binary_search(&key) {
            Ok(index) => Some(index),
            Err(insertion) => {
                let prev = insertion.checked_sub(1);
                let next = (insertion < self.keys.len()).then_some(insertion);
                match mode {
                    SearchMode::Exact => None,
                    SearchMode::ExactOrPrev => prev,
                    SearchMode::ExactOrNext => next,
                    SearchMode::Nearest => match (prev, next) {
                        (Some(prev), Some(next)) => {
                            if key.abs_diff(self.keys[prev]) < self.keys[next].abs_diff(key) {
                                Some(prev)
                            } else {
                                Some(next)
                            }
                        }
                        (prev, next) => prev.or(next),
                    },
                }
            }
        }
    }

    /// Co-iterator over the keys at `first..=last`, clamped to the registry.
    #[must_use]
    pub fn iter(&self, first: usize, last: usize) -> RegistryIterator<'_> {
        let end = last.saturating_add(1).min(self.keys.len());
        RegistryIterator {
            keys: &self.keys,
            first: first.min(end),
            end,
            position: None,
        }
    }

    #[must_use]
    pub fn iter_all(&self) -> RegistryIterator<'_> {
        self.iter(0, self.keys.len().saturating_sub(1))
    }
}

/// [`CoIterator`] over a slice of registry keys. Indices are registry positions.
#[derive(Debug, Clone)]
pub struct RegistryIterator<'a> {
    keys: &'a [RowKey],
    first: usize,
    end: usize,
    position: Option<usize>,
}

impl RegistryIterator<'_> {
    #[must_use]
    pub fn rows_count(&self) -> usize {
        self.end - self.first
    }
}

impl CoIterator for RegistryIterator<'_> {
    fn advance(&mut self) -> bool {
        let next = self.position.map_or(self.first, |position| position + 1);
        if next < self.end {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.end);
            false
        }
    }

    fn current_key(&self) -> Option<RowKey> {
        self.position
            .filter(|position| *position < self.end)
            .and_then(|position| self.keys.get(position).copied())
    }

    fn current_index(&self) -> Option<usize> {
        self.position.filter(|position| *position < self.end)
    }

    fn reset(&mut self) {
        self.position = None;
    }
}
