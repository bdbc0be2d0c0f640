use tracing::debug;

use crate::core::RowKey;

use super::aggregation::Aggregator;
use super::interval::{Interval, IntervalGenerator};
use super::row::TableRow;
use super::storage::TableStorage;

/// Pending invalidation of an aggregated storage, as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct DirtyState(u8);

impl DirtyState {
    pub const ALL_OK: Self = Self(0);
    /// Rows were only appended after the last source key.
    pub const RIGHT_APPENDS: Self = Self(1);
    /// Rows were only removed from the front.
    pub const LEFT_REMOVES: Self = Self(2);
    /// New aggregate columns were registered.
    pub const COLUMNS_COUNT: Self = Self(4);
    pub const TOTAL_MESS: Self = Self(8);

    pub fn mark(&mut self, state: Self) {
        self.0 |= state.0;
    }

    #[must_use]
    pub fn contains(self, state: Self) -> bool {
        self.0 & state.0 != 0
    }

    #[must_use]
    pub fn is_clean(self) -> bool {
        self.0 == 0
    }
}

/// Storage of rows grouped by an [`Interval`], rebuilt lazily from the main storage.
#[derive(Debug)]
pub(crate) struct AggregatedStorage {
    pub storage: TableStorage,
    generator: IntervalGenerator,
    dirty: DirtyState,
    built_columns: usize,
}

impl AggregatedStorage {
    pub fn new(interval: Interval) -> Self {
        Self {
            storage: TableStorage::new(Some(interval)),
            generator: IntervalGenerator::new(interval),
            dirty: DirtyState::TOTAL_MESS,
            built_columns: 0,
        }
    }

    pub fn mark(&mut self, state: DirtyState) {
        self.dirty.mark(state);
    }

    /// Brings the grouped rows in line with `source`. Returns whether rows changed.
    pub fn refresh(&mut self, source: &TableStorage, aggregators: &mut [Aggregator]) -> bool {
        let dirty = self.dirty;
        if dirty.is_clean() {
            return false;
        }
        self.dirty = DirtyState::ALL_OK;

        if dirty.contains(DirtyState::TOTAL_MESS) || dirty.contains(DirtyState::LEFT_REMOVES) {
            self.rebuild_from(source, aggregators, 0);
        } else {
            if dirty.contains(DirtyState::COLUMNS_COUNT) {
                self.build_new_columns(source, aggregators);
            }
            if dirty.contains(DirtyState::RIGHT_APPENDS) {
                self.rebuild_tail(source, aggregators);
            }
        }
        self.built_columns = aggregators.len();
        self.storage.computed_stale = true;
        debug!(
            interval = ?self.generator.interval(),
            rows_count = self.storage.len(),
            columns = self.built_columns,
            "refresh aggregated storage"
        );
        true
    }

    fn rebuild_tail(&mut self, source: &TableStorage, aggregators: &mut [Aggregator]) {
        let Some(last_bucket) = self.storage.last_key() else {
            self.rebuild_from(source, aggregators, 0);
            return;
        };
        self.storage.truncate(self.storage.len() - 1);
        let start = source
            .position(last_bucket)
            .unwrap_or_else(|insertion| insertion);
        self.rebuild_from(source, aggregators, start);
    }

    /// Regroups `source` rows from position `start`, replacing buckets past it.
    fn rebuild_from(&mut self, source: &TableStorage, aggregators: &mut [Aggregator], start: usize) {
        if start == 0 {
            self.storage.clear();
        }
        for aggregator in aggregators.iter_mut() {
            aggregator.take();
        }

        let mut bucket: Option<RowKey> = None;
        let mut bucket_end = RowKey::MIN;
        for row in &source.rows()[start..] {
            if bucket.is_none() || row.key >= bucket_end {
                if let Some(key) = bucket {
                    self.storage.push(flush(key, aggregators));
                }
                let key = self.generator.set_start(row.key);
                bucket = Some(key);
                bucket_end = self.generator.advance();
            }
            for aggregator in aggregators.iter_mut() {
                aggregator.process(row);
            }
        }
        if let Some(key) = bucket {
            self.storage.push(flush(key, aggregators));
        }
    }

    /// Computes only the aggregate columns registered since the last build.
    fn build_new_columns(&mut self, source: &TableStorage, aggregators: &mut [Aggregator]) {
        let first_new = self.built_columns;
        if first_new >= aggregators.len() {
            return;
        }
        let width = aggregators.len();
        let new_aggregators = &mut aggregators[first_new..];
        for aggregator in new_aggregators.iter_mut() {
            aggregator.take();
        }

        let rows = self.storage.rows_mut();
        let mut target = 0usize;
        let mut bucket_end = RowKey::MIN;
        let mut open = false;
        for row in source.rows() {
            if !open || row.key >= bucket_end {
                if open {
                    write_columns(&mut rows[target], first_new, width, new_aggregators);
                    target += 1;
                }
                if target >= rows.len() {
                    open = false;
                    break;
                }
                let key = self.generator.set_start(row.key);
                // Buckets past the built range are regrouped by the tail rebuild.
                if key != rows[target].key {
                    open = false;
                    break;
                }
                bucket_end = self.generator.advance();
                open = true;
            }
            for aggregator in new_aggregators.iter_mut() {
                aggregator.process(row);
            }
        }
        if open && target < rows.len() {
            write_columns(&mut rows[target], first_new, width, new_aggregators);
        }
    }
}

fn flush(key: RowKey, aggregators: &mut [Aggregator]) -> TableRow {
    TableRow::new(key, aggregators.iter_mut().map(Aggregator::take).collect())
}

fn write_columns(row: &mut TableRow, first: usize, width: usize, aggregators: &mut [Aggregator]) {
    row.pad_values(width);
    for (offset, aggregator) in aggregators.iter_mut().enumerate() {
        row.values[first + offset] = aggregator.take();
    }
}
