use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::core::primitives::{parse_key_cell, parse_value_cell};
use crate::core::{RowKey, datetime_to_key, decimal_to_f64, key_from_f64};
use crate::error::{ChartError, ChartResult};
use crate::indicators::{IndicatorKernel, IndicatorParams};

use super::aggregate::{AggregatedStorage, DirtyState};
use super::aggregation::{AggregationType, Aggregator, AggregatorKey};
use super::computer::{ComputerId, TableComputer};
use super::interval::Interval;
use super::mapping::TableMapping;
use super::row::{Column, TableRow};
use super::storage::{RowInsert, Selection, TableStorage};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MAPPING_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingId(u64);

impl MappingId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MAPPING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Bulk ingestion settings for [`Table::add_data`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Cell index holding the row key.
    pub key_column: usize,
    /// Skips a header row.
    pub ignore_first_row: bool,
    /// Shift applied to every parsed key.
    pub time_offset_hours: f64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            key_column: 0,
            ignore_first_row: false,
            time_offset_hours: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
enum PendingOp {
    Add(TableRow),
    Remove(Option<RowKey>, Option<RowKey>),
    RemoveFirst(usize),
}

/// Shape of a committed mutation, used to pick the cheapest regrouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    None,
    RightAppends,
    LeftRemoves,
    Mixed,
}

impl ChangeKind {
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, kind) | (kind, Self::None) => kind,
            (left, right) if left == right => left,
            _ => Self::Mixed,
        }
    }

    fn dirty_state(self) -> DirtyState {
        match self {
            Self::None => DirtyState::ALL_OK,
            Self::RightAppends => DirtyState::RIGHT_APPENDS,
            Self::LeftRemoves => DirtyState::LEFT_REMOVES,
            Self::Mixed => DirtyState::TOTAL_MESS,
        }
    }
}

/// Ordered time-series table.
///
/// Owns the main row storage, grouped storages per [`Interval`], the aggregate
/// and computed column registries, and the computers writing computed columns.
/// Writes are expected to be serialized by the caller; reads go through
/// [`TableStorage`] borrows.
#[derive(Debug)]
pub struct Table {
    id: TableId,
    main: TableStorage,
    column_count: usize,
    column_owners: Vec<Option<MappingId>>,
    pending: Vec<PendingOp>,
    in_transaction: bool,
    aggregators: Vec<Aggregator>,
    aggregator_columns: IndexMap<AggregatorKey, usize>,
    aggregates: IndexMap<Interval, AggregatedStorage>,
    computed_columns_count: usize,
    free_computed_columns: Vec<usize>,
    computed_aliases: IndexMap<String, usize>,
    mappings: IndexMap<MappingId, TableMapping>,
    computers: Vec<Option<TableComputer>>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed)),
            main: TableStorage::new(None),
            column_count: 0,
            column_owners: Vec::new(),
            pending: Vec::new(),
            in_transaction: false,
            aggregators: Vec::new(),
            aggregator_columns: IndexMap::new(),
            aggregates: IndexMap::new(),
            computed_columns_count: 0,
            free_computed_columns: Vec::new(),
            computed_aliases: IndexMap::new(),
            mappings: IndexMap::new(),
            computers: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.main.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// Width of the raw value schema.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    #[must_use]
    pub fn column_owner(&self, column: usize) -> Option<MappingId> {
        self.column_owners.get(column).copied().flatten()
    }

    #[must_use]
    pub fn computed_columns_count(&self) -> usize {
        self.computed_columns_count
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Inserts a row, or overwrites the values of the row at `key`.
    ///
    /// Rows wider than the current schema grow it; narrower rows are padded with `NaN`.
    pub fn add_row(&mut self, key: f64, values: Vec<f64>) -> ChartResult<RowInsert> {
        let key = key_from_f64(key)?;
        Ok(self.add_checked_row(TableRow::new(key, values)))
    }

    pub fn add_row_decimal(
        &mut self,
        time: DateTime<Utc>,
        values: &[Decimal],
    ) -> ChartResult<RowInsert> {
        let values = values
            .iter()
            .enumerate()
            .map(|(index, value)| decimal_to_f64(*value, &format!("column {index}")))
            .collect::<ChartResult<Vec<_>>>()?;
        Ok(self.add_checked_row(TableRow::new(datetime_to_key(time), values)))
    }

    /// Ingests raw JSON rows. Rows without a parseable key are skipped.
    ///
    /// Every cell, the key cell included, becomes a raw column. Returns the
    /// number of accepted rows.
    pub fn add_data(&mut self, rows: &[Value], settings: &IngestSettings) -> ChartResult<usize> {
        if !settings.time_offset_hours.is_finite() {
            return Err(ChartError::InvalidParameter {
                name: "time_offset_hours",
                value: settings.time_offset_hours.to_string(),
            });
        }
        let implicit = !self.in_transaction;
        if implicit {
            self.start_transaction();
        }

        let skip = usize::from(settings.ignore_first_row);
        let mut accepted = 0usize;
        let mut skipped = 0usize;
        for (position, raw) in rows.iter().enumerate().skip(skip) {
            let Some(cells) = raw.as_array() else {
                warn!(position, "skipping non-array data row");
                skipped += 1;
                continue;
            };
            let Some(key) = cells
                .get(settings.key_column)
                .and_then(|cell| parse_key_cell(cell, settings.time_offset_hours))
            else {
                warn!(position, "skipping data row without a valid key");
                skipped += 1;
                continue;
            };
            let values = cells.iter().map(parse_value_cell).collect();
            self.add_checked_row(TableRow::new(key, values));
            accepted += 1;
        }
        debug!(accepted, skipped, "add data rows");

        if implicit {
            self.commit();
        }
        Ok(accepted)
    }

    fn add_checked_row(&mut self, mut row: TableRow) -> RowInsert {
        if row.values.len() > self.column_count {
            self.grow_schema(row.values.len());
        }
        row.pad_values(self.column_count);
        if self.in_transaction {
            self.pending.push(PendingOp::Add(row));
            return RowInsert::Deferred;
        }
        let appended = self.main.last_key().is_none_or(|last| last < row.key);
        let result = self.main.insert(row);
        trace!(?result, rows_count = self.main.len(), "add row");
        self.finish_mutation(if appended {
            ChangeKind::RightAppends
        } else {
            ChangeKind::Mixed
        });
        result
    }

    /// Removes rows with keys in `from..=to`; open ends select to the storage edge.
    ///
    /// Returns the number of removed rows, `0` when buffered by a transaction.
    pub fn remove(&mut self, from: Option<RowKey>, to: Option<RowKey>) -> usize {
        if self.in_transaction {
            self.pending.push(PendingOp::Remove(from, to));
            return 0;
        }
        let kind = removal_kind(&self.main, from, to);
        let removed = self.main.remove_range(from, to);
        if removed > 0 {
            debug!(removed, ?from, ?to, "remove rows");
            self.finish_mutation(kind);
        }
        removed
    }

    /// Removes the first `count` rows. Returns `0` when buffered by a transaction.
    pub fn remove_first(&mut self, count: usize) -> usize {
        if self.in_transaction {
            self.pending.push(PendingOp::RemoveFirst(count));
            return 0;
        }
        let removed = self.main.remove_first(count);
        if removed > 0 {
            debug!(removed, "remove first rows");
            self.finish_mutation(ChangeKind::LeftRemoves);
        }
        removed
    }

    /// Buffers further mutations until [`Self::commit`] or [`Self::rollback`].
    pub fn start_transaction(&mut self) {
        self.in_transaction = true;
    }

    /// Applies buffered mutations in order. Returns the number of applied operations.
    pub fn commit(&mut self) -> usize {
        self.in_transaction = false;
        let pending = std::mem::take(&mut self.pending);
        let applied = pending.len();
        let mut kind = ChangeKind::None;
        for op in pending {
            let op_kind = match op {
                PendingOp::Add(row) => {
                    if self.main.last_key().is_none_or(|last| last < row.key) {
                        self.main.push(row);
                        ChangeKind::RightAppends
                    } else {
                        self.main.insert(row);
                        ChangeKind::Mixed
                    }
                }
                PendingOp::Remove(from, to) => {
                    let op_kind = removal_kind(&self.main, from, to);
                    if self.main.remove_range(from, to) > 0 {
                        op_kind
                    } else {
                        ChangeKind::None
                    }
                }
                PendingOp::RemoveFirst(count) => {
                    if self.main.remove_first(count) > 0 {
                        ChangeKind::LeftRemoves
                    } else {
                        ChangeKind::None
                    }
                }
            };
            kind = kind.merge(op_kind);
        }
        debug!(
            applied,
            rows_count = self.main.len(),
            change = ?kind,
            "commit table transaction"
        );
        self.finish_mutation(kind);
        applied
    }

    /// Discards buffered mutations. Returns how many were dropped.
    pub fn rollback(&mut self) -> usize {
        self.in_transaction = false;
        let dropped = self.pending.len();
        self.pending.clear();
        debug!(dropped, "rollback table transaction");
        dropped
    }

    fn finish_mutation(&mut self, kind: ChangeKind) {
        if kind == ChangeKind::None {
            return;
        }
        self.main.computed_stale = true;
        let state = kind.dirty_state();
        for aggregate in self.aggregates.values_mut() {
            aggregate.mark(state);
        }
    }

    /// Grows the raw schema by one column owned by `owner`; existing rows read `NaN` there.
    pub fn allocate_column(&mut self, owner: MappingId) -> usize {
        let column = self.column_count;
        self.grow_schema(column + 1);
        self.column_owners[column] = Some(owner);
        column
    }

    fn grow_schema(&mut self, width: usize) {
        debug!(from = self.column_count, to = width, "grow table schema");
        self.column_count = width;
        self.column_owners.resize(width, None);
        for row in self.main.rows_mut() {
            row.pad_values(width);
        }
        for op in &mut self.pending {
            if let PendingOp::Add(row) = op {
                row.pad_values(width);
            }
        }
    }

    /// Registers an aggregate column over raw `column`. Identical definitions share a column.
    pub fn register_field(
        &mut self,
        column: usize,
        aggregation: AggregationType,
        weights_column: Option<usize>,
    ) -> usize {
        let key = AggregatorKey {
            kind: aggregation,
            values_column: column,
            weights_column,
        };
        if let Some(index) = self.aggregator_columns.get(&key) {
            return *index;
        }
        let index = self.aggregators.len();
        self.aggregators.push(Aggregator::new(key));
        self.aggregator_columns.insert(key, index);
        for aggregate in self.aggregates.values_mut() {
            aggregate.mark(DirtyState::COLUMNS_COUNT);
        }
        trace!(column, ?aggregation, index, "register aggregate column");
        index
    }

    /// Reserves a computed column, reusing freed ones. `alias` must be unique per table.
    pub fn register_computed_field(&mut self, alias: Option<&str>) -> ChartResult<usize> {
        if let Some(alias) = alias.filter(|alias| self.computed_aliases.contains_key(*alias)) {
            return Err(ChartError::DuplicateComputedField {
                name: alias.to_owned(),
            });
        }
        let column = self.free_computed_columns.pop().unwrap_or_else(|| {
            self.computed_columns_count += 1;
            self.computed_columns_count - 1
        });
        if let Some(alias) = alias {
            self.computed_aliases.insert(alias.to_owned(), column);
        }
        Ok(column)
    }

    #[must_use]
    pub fn computed_column(&self, alias: &str) -> Option<Column> {
        self.computed_aliases.get(alias).copied().map(Column::Computed)
    }

    fn release_computed_field(&mut self, column: usize) {
        self.computed_aliases.retain(|_, index| *index != column);
        for storage in std::iter::once(&mut self.main)
            .chain(self.aggregates.values_mut().map(|aggregate| &mut aggregate.storage))
        {
            for row in storage.rows_mut() {
                if row.computed_values.is_some() {
                    row.set_computed(column, f64::NAN);
                }
            }
        }
        self.free_computed_columns.push(column);
    }

    /// Stores the current bindings of `mapping` for the computers bound to it.
    pub(crate) fn register_mapping(&mut self, mapping: &TableMapping) {
        let bound = self
            .computers
            .iter()
            .flatten()
            .any(|computer| computer.mapping_id() == mapping.id());
        self.mappings.insert(mapping.id(), mapping.clone());
        if bound {
            trace!(mapping = ?mapping.id(), "rebind computers to updated mapping");
            self.mark_computed_stale();
        }
    }

    /// Bindings of a mapping as last published to this table.
    #[must_use]
    pub fn mapping(&self, id: MappingId) -> Option<&TableMapping> {
        self.mappings.get(&id)
    }

    /// Binds `kernel` to `mapping` and allocates one computed column per kernel output.
    ///
    /// With `alias_prefix`, outputs are also registered as `{prefix}.{output}`.
    /// The computer runs lazily on the next storage access and resolves its
    /// inputs through the mapping's latest bindings, so fields added later are seen.
    pub fn create_computer(
        &mut self,
        mapping: &TableMapping,
        kernel: Box<dyn IndicatorKernel>,
        alias_prefix: Option<&str>,
    ) -> ChartResult<ComputerId> {
        mapping.ensure_table(self)?;
        let mut outputs = Vec::with_capacity(kernel.output_fields().len());
        for name in kernel.output_fields() {
            let alias = alias_prefix.map(|prefix| format!("{prefix}.{name}"));
            match self.register_computed_field(alias.as_deref()) {
                Ok(column) => outputs.push((*name, column)),
                Err(err) => {
                    for (_, column) in outputs {
                        self.release_computed_field(column);
                    }
                    return Err(err);
                }
            }
        }

        let id = ComputerId(self.computers.len());
        debug!(
            computer = id.0,
            indicator = kernel.name(),
            outputs = outputs.len(),
            "create table computer"
        );
        self.mappings.insert(mapping.id(), mapping.clone());
        self.computers.push(Some(TableComputer::new(
            id,
            mapping.id(),
            kernel,
            outputs.into_iter().collect(),
        )));
        self.mark_computed_stale();
        Ok(id)
    }

    #[must_use]
    pub fn computer(&self, id: ComputerId) -> Option<&TableComputer> {
        self.computers.get(id.0).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn computer_output(&self, id: ComputerId, name: &str) -> Option<Column> {
        self.computer(id)?.output_column(name)
    }

    /// Runs one computer over the main storage and every grouped storage.
    pub fn run_computer(&mut self, id: ComputerId) -> ChartResult<()> {
        self.refresh_aggregates();
        let computer = self
            .computers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ChartError::UnknownComputer { id: id.0 })?;
        let mapping = self
            .mappings
            .get(&computer.mapping_id())
            .ok_or(ChartError::MappingTableMismatch)?;
        computer.run_on(&mut self.main, mapping)?;
        for aggregate in self.aggregates.values_mut() {
            computer.run_on(&mut aggregate.storage, mapping)?;
        }
        Ok(())
    }

    /// Re-creates the computer's kernel context from `params` and reruns it.
    pub fn reinit_computer(&mut self, id: ComputerId, params: &IndicatorParams) -> ChartResult<()> {
        let computer = self
            .computers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ChartError::UnknownComputer { id: id.0 })?;
        computer.reinit(params)?;
        self.run_computer(id)
    }

    /// Detaches a computer and frees its computed columns for reuse.
    pub fn remove_computer(&mut self, id: ComputerId) -> ChartResult<()> {
        let computer = self
            .computers
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(ChartError::UnknownComputer { id: id.0 })?;
        for (_, column) in computer.output_columns() {
            if let Column::Computed(index) = column {
                self.release_computed_field(index);
            }
        }
        debug!(computer = id.0, "remove table computer");
        Ok(())
    }

    fn mark_computed_stale(&mut self) {
        self.main.computed_stale = true;
        for aggregate in self.aggregates.values_mut() {
            aggregate.storage.computed_stale = true;
        }
    }

    fn refresh_aggregates(&mut self) {
        for aggregate in self.aggregates.values_mut() {
            aggregate.refresh(&self.main, &mut self.aggregators);
        }
    }

    /// Returns the storage for `interval` (`None` for raw rows), regrouped and
    /// recomputed as needed. Computer failures are logged and kept for [`Self::update`].
    pub fn storage(&mut self, interval: Option<Interval>) -> &TableStorage {
        self.prepare(interval);
        match interval.and_then(|interval| self.aggregates.get(&interval)) {
            Some(aggregate) => &aggregate.storage,
            None => &self.main,
        }
    }

    /// Storage as it currently is, without regrouping or recomputing.
    #[must_use]
    pub fn storage_ref(&self, interval: Option<Interval>) -> Option<&TableStorage> {
        match interval {
            None => Some(&self.main),
            Some(interval) => self
                .aggregates
                .get(&interval)
                .map(|aggregate| &aggregate.storage),
        }
    }

    /// Selects `from..=to` on the storage for `interval`.
    pub fn select(&mut self, from: RowKey, to: RowKey, interval: Option<Interval>) -> Selection {
        self.storage(interval).select(from, to)
    }

    /// Regroups every materialised storage and reruns stale computers.
    ///
    /// Returns the failures of computers that ran; each is isolated to its computer.
    pub fn update(&mut self) -> Vec<ChartError> {
        let mut errors = self.prepare(None);
        let intervals: Vec<Interval> = self.aggregates.keys().copied().collect();
        for interval in intervals {
            errors.extend(self.prepare(Some(interval)));
        }
        errors
    }

    fn prepare(&mut self, interval: Option<Interval>) -> Vec<ChartError> {
        let storage = match interval {
            None => &mut self.main,
            Some(interval) => {
                let aggregate = self
                    .aggregates
                    .entry(interval)
                    .or_insert_with(|| AggregatedStorage::new(interval));
                aggregate.refresh(&self.main, &mut self.aggregators);
                &mut aggregate.storage
            }
        };
        if !storage.computed_stale {
            return Vec::new();
        }
        storage.computed_stale = false;

        let mut errors = Vec::new();
        for computer in self.computers.iter_mut().flatten() {
            let result = self
                .mappings
                .get(&computer.mapping_id())
                .ok_or(ChartError::MappingTableMismatch)
                .and_then(|mapping| computer.run_on(storage, mapping));
            if let Err(err) = result {
                warn!(
                    error = %err,
                    computer = computer.id().0,
                    "computer run failed; keeping partial results"
                );
                errors.push(err);
            }
        }
        errors
    }
}

fn removal_kind(storage: &TableStorage, from: Option<RowKey>, to: Option<RowKey>) -> ChangeKind {
    let reaches_front = match (from, storage.first_key()) {
        (None, _) | (_, None) => true,
        (Some(from), Some(first)) => from <= first,
    };
    let reaches_back = match (to, storage.last_key()) {
        (None, _) | (_, None) => true,
        (Some(to), Some(last)) => to >= last,
    };
    if reaches_front && !reaches_back {
        ChangeKind::LeftRemoves
    } else {
        ChangeKind::Mixed
    }
}
