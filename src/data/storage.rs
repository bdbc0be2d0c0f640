use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::{CycledQueue, RowKey};

use super::interval::Interval;
use super::row::{Column, TableRow};

const SEARCH_CACHE_SIZE: usize = 2;
const SELECTION_CACHE_SIZE: usize = 4;

/// How a key lookup resolves when the exact key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    Exact,
    ExactOrPrev,
    ExactOrNext,
    /// Closest row by key distance; ties go to the later row.
    Nearest,
}

/// Outcome of writing one row into a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowInsert {
    Inserted(usize),
    Updated(usize),
    /// Buffered by an open transaction.
    Deferred,
}

/// Contiguous row range of a storage, described by positions only.
///
/// The range is `first_index..end_index`; `pre_first` and `post_last` are the
/// neighbouring rows outside it, when they exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    start_key: RowKey,
    end_key: RowKey,
    first_index: usize,
    end_index: usize,
    pre_first: Option<usize>,
    post_last: Option<usize>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    computed_mins: Vec<f64>,
    computed_maxs: Vec<f64>,
}

impl Selection {
    #[must_use]
    pub fn start_key(&self) -> RowKey {
        self.start_key
    }

    #[must_use]
    pub fn end_key(&self) -> RowKey {
        self.end_key
    }

    #[must_use]
    pub fn rows_count(&self) -> usize {
        self.end_index - self.first_index
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows_count() == 0
    }

    /// Position of the first selected row, or of the post-last row when empty.
    #[must_use]
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Exclusive end of the selected positions.
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    #[must_use]
    pub fn first(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.first_index)
    }

    #[must_use]
    pub fn last(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end_index - 1)
    }

    #[must_use]
    pub fn pre_first(&self) -> Option<usize> {
        self.pre_first
    }

    #[must_use]
    pub fn post_last(&self) -> Option<usize> {
        self.post_last
    }

    /// Minimum of a column over `pre_first..=post_last`, `NaN` when no value exists.
    #[must_use]
    pub fn min(&self, column: Column) -> f64 {
        let values = match column {
            Column::Value(_) => &self.mins,
            Column::Computed(_) => &self.computed_mins,
        };
        stat_at(values, column)
    }

    /// Maximum of a column over `pre_first..=post_last`, `NaN` when no value exists.
    #[must_use]
    pub fn max(&self, column: Column) -> f64 {
        let values = match column {
            Column::Value(_) => &self.maxs,
            Column::Computed(_) => &self.computed_maxs,
        };
        stat_at(values, column)
    }
}

fn stat_at(values: &[f64], column: Column) -> f64 {
    let (Column::Value(index) | Column::Computed(index)) = column;
    values.get(index).copied().unwrap_or(f64::NAN)
}

/// Key-ordered row arena with cached lookups.
///
/// Rows are kept sorted by strictly increasing key; positional access and
/// sequential walks are plain slice operations.
#[derive(Debug)]
pub struct TableStorage {
    interval: Option<Interval>,
    rows: Vec<TableRow>,
    pub(crate) computed_stale: bool,
    search_cache: RefCell<CycledQueue<(RowKey, SearchMode, Option<usize>)>>,
    selection_cache: RefCell<CycledQueue<(RowKey, RowKey, Selection)>>,
}

impl Default for TableStorage {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TableStorage {
    #[must_use]
    pub fn new(interval: Option<Interval>) -> Self {
        Self {
            interval,
            rows: Vec::new(),
            computed_stale: false,
            search_cache: RefCell::new(CycledQueue::new(SEARCH_CACHE_SIZE)),
            selection_cache: RefCell::new(CycledQueue::new(SELECTION_CACHE_SIZE)),
        }
    }

    /// Grouping interval for aggregated storages, `None` for the main storage.
    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        self.interval.is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&TableRow> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn first_key(&self) -> Option<RowKey> {
        self.rows.first().map(|row| row.key)
    }

    #[must_use]
    pub fn last_key(&self) -> Option<RowKey> {
        self.rows.last().map(|row| row.key)
    }

    pub fn keys(&self) -> impl Iterator<Item = RowKey> + '_ {
        self.rows.iter().map(|row| row.key)
    }

    /// Binary search by key: `Ok(index)` on a hit, `Err(insertion point)` otherwise.
    pub fn position(&self, key: RowKey) -> Result<usize, usize> {
        self.rows.binary_search_by_key(&key, |row| row.key)
    }

    /// Resolves `key` to a row position following `mode`.
    #[must_use]
    pub fn search_index(&self, key: RowKey, mode: SearchMode) -> Option<usize> {
        if let Some(hit) = self
            .search_cache
            .borrow()
            .iter()
            .find(|(cached_key, cached_mode, _)| *cached_key == key && *cached_mode == mode)
            .map(|(_, _, index)| *index)
        {
            return hit;
        }

        let result = match self.position(key) {
            Ok(index) => Some(index),
            Err(insertion) => match mode {
                SearchMode::Exact => None,
                SearchMode::ExactOrPrev => insertion.checked_sub(1),
                SearchMode::ExactOrNext => (insertion < self.rows.len()).then_some(insertion),
                SearchMode::Nearest => self.nearest(key, insertion),
            },
        };
        self.search_cache.borrow_mut().enqueue((key, mode, result));
        result
    }

    fn nearest(&self, key: RowKey, insertion: usize) -> Option<usize> {
        let prev = insertion.checked_sub(1);
        let next = (insertion < self.rows.len()).then_some(insertion);
        match (prev, next) {
            (Some(prev), Some(next)) => {
                let to_prev = key.abs_diff(self.rows[prev].key);
                let to_next = self.rows[next].key.abs_diff(key);
                Some(if to_prev < to_next { prev } else { next })
            }
            (prev, next) => prev.or(next),
        }
    }

    /// Selects rows with keys in `from..=to`. `from > to` yields an empty selection.
    #[must_use]
    pub fn select(&self, from: RowKey, to: RowKey) -> Selection {
        if let Some(cached) = self
            .selection_cache
            .borrow()
            .iter()
            .find(|(start, end, _)| *start == from && *end == to)
            .map(|(_, _, selection)| selection.clone())
        {
            return cached;
        }

        let first_index = self.position(from).unwrap_or_else(|insertion| insertion);
        let end_index = if from > to {
            first_index
        } else {
            match self.position(to) {
                Ok(index) => index + 1,
                Err(insertion) => insertion,
            }
        };
        let selection = self.build_selection(from, to, first_index, end_index);
        trace!(
            from,
            to,
            rows_count = selection.rows_count(),
            "select storage range"
        );
        self.selection_cache
            .borrow_mut()
            .enqueue((from, to, selection.clone()));
        selection
    }

    #[must_use]
    pub fn select_all(&self) -> Selection {
        self.select(
            self.first_key().unwrap_or(RowKey::MIN),
            self.last_key().unwrap_or(RowKey::MIN),
        )
    }

    fn build_selection(
        &self,
        start_key: RowKey,
        end_key: RowKey,
        first_index: usize,
        end_index: usize,
    ) -> Selection {
        let pre_first = first_index.checked_sub(1);
        let post_last = (end_index < self.rows.len()).then_some(end_index);
        let span_start = pre_first.unwrap_or(first_index);
        let span_end = post_last.map_or(end_index, |index| index + 1);

        let mut selection = Selection {
            start_key,
            end_key,
            first_index,
            end_index,
            pre_first,
            post_last,
            mins: Vec::new(),
            maxs: Vec::new(),
            computed_mins: Vec::new(),
            computed_maxs: Vec::new(),
        };
        for row in &self.rows[span_start..span_end] {
            accumulate(&mut selection.mins, &mut selection.maxs, &row.values);
            if let Some(computed) = &row.computed_values {
                accumulate(
                    &mut selection.computed_mins,
                    &mut selection.computed_maxs,
                    computed,
                );
            }
        }
        selection
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [TableRow] {
        self.invalidate_caches();
        &mut self.rows
    }

    /// Inserts `row` keeping key order, overwriting values on a key collision.
    pub(crate) fn insert(&mut self, row: TableRow) -> RowInsert {
        self.invalidate_caches();
        if self.last_key().is_none_or(|last| last < row.key) {
            self.rows.push(row);
            return RowInsert::Inserted(self.rows.len() - 1);
        }
        match self.position(row.key) {
            Ok(index) => {
                self.rows[index].values = row.values;
                RowInsert::Updated(index)
            }
            Err(index) => {
                self.rows.insert(index, row);
                RowInsert::Inserted(index)
            }
        }
    }

    pub(crate) fn push(&mut self, row: TableRow) {
        self.invalidate_caches();
        self.rows.push(row);
    }

    /// Removes rows with keys in `from..=to`, returning how many were removed.
    pub(crate) fn remove_range(&mut self, from: Option<RowKey>, to: Option<RowKey>) -> usize {
        let start = from.map_or(0, |key| self.position(key).unwrap_or_else(|index| index));
        let end = to.map_or(self.rows.len(), |key| match self.position(key) {
            Ok(index) => index + 1,
            Err(index) => index,
        });
        if start >= end {
            return 0;
        }
        self.invalidate_caches();
        self.rows.drain(start..end).count()
    }

    pub(crate) fn remove_first(&mut self, count: usize) -> usize {
        let count = count.min(self.rows.len());
        if count > 0 {
            self.invalidate_caches();
            self.rows.drain(..count);
        }
        count
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.invalidate_caches();
        self.rows.truncate(len);
    }

    pub(crate) fn clear(&mut self) {
        self.invalidate_caches();
        self.rows.clear();
    }

    pub(crate) fn invalidate_caches(&self) {
        self.search_cache.borrow_mut().clear();
        self.selection_cache.borrow_mut().clear();
    }
}

fn accumulate(mins: &mut Vec<f64>, maxs: &mut Vec<f64>, values: &[f64]) {
    if mins.len() < values.len() {
        mins.resize(values.len(), f64::NAN);
        maxs.resize(values.len(), f64::NAN);
    }
    for (index, value) in values.iter().copied().enumerate() {
        if value.is_nan() {
            continue;
        }
        if mins[index].is_nan() || value < mins[index] {
            mins[index] = value;
        }
        if maxs[index].is_nan() || value > maxs[index] {
            maxs[index] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(keys: &[RowKey]) -> TableStorage {
        let mut storage = TableStorage::default();
        for key in keys {
            storage.insert(TableRow::new(*key, vec![*key as f64]));
        }
        storage
    }

    #[test]
    fn nearest_prefers_later_row_on_tie() {
        let storage = storage(&[10, 20]);
        assert_eq!(storage.search_index(15, SearchMode::Nearest), Some(1));
        assert_eq!(storage.search_index(14, SearchMode::Nearest), Some(0));
        assert_eq!(storage.search_index(5, SearchMode::Nearest), Some(0));
        assert_eq!(storage.search_index(25, SearchMode::Nearest), Some(1));
    }

    #[test]
    fn cached_search_is_dropped_on_mutation() {
        let mut storage = storage(&[10, 30]);
        assert_eq!(storage.search_index(20, SearchMode::Exact), None);
        storage.insert(TableRow::new(20, vec![20.0]));
        assert_eq!(storage.search_index(20, SearchMode::Exact), Some(1));
    }

    #[test]
    fn selection_stats_include_neighbours() {
        let storage = storage(&[1, 2, 3, 4, 5]);
        let selection = storage.select(2, 3);
        assert_eq!(selection.pre_first(), Some(0));
        assert_eq!(selection.post_last(), Some(3));
        assert_eq!(selection.min(Column::Value(0)), 1.0);
        assert_eq!(selection.max(Column::Value(0)), 4.0);
        assert!(selection.min(Column::Computed(0)).is_nan());
    }
}
