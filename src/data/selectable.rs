use crate::core::RowKey;

use super::interval::Interval;
use super::iterator::{CoIterator, MetaStore, TableIterator};
use super::mapping::TableMapping;
use super::row::{Column, TableRow};
use super::storage::{SearchMode, Selection, TableStorage};
use super::table::Table;

/// Read-only view of one storage row through a mapping.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    row: &'a TableRow,
    index: usize,
    mapping: &'a TableMapping,
    aggregated: bool,
}

impl<'a> RowView<'a> {
    fn new(storage: &'a TableStorage, index: usize, mapping: &'a TableMapping) -> Option<Self> {
        storage.row(index).map(|row| Self {
            row,
            index,
            mapping,
            aggregated: storage.is_aggregated(),
        })
    }

    #[must_use]
    pub fn key(&self) -> RowKey {
        self.row.key
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn row(&self) -> &'a TableRow {
        self.row
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<f64> {
        let column = self.mapping.column(field, self.aggregated).ok()?;
        Some(self.row.column(column))
    }

    #[must_use]
    pub fn column(&self, column: Column) -> f64 {
        self.row.column(column)
    }
}

/// Mapping bound to a current storage and selection, as series consume it.
#[derive(Debug, Clone)]
pub struct TableSelectable {
    mapping: TableMapping,
    interval: Option<Interval>,
    selection: Option<Selection>,
    meta: MetaStore,
}

impl TableSelectable {
    #[must_use]
    pub fn new(mapping: TableMapping) -> Self {
        Self {
            mapping,
            interval: None,
            selection: None,
            meta: MetaStore::new(),
        }
    }

    #[must_use]
    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut TableMapping {
        &mut self.mapping
    }

    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Selects `from..=to` on the storage for `interval`. Clears meta values.
    pub fn select(
        &mut self,
        table: &mut Table,
        from: RowKey,
        to: RowKey,
        interval: Option<Interval>,
    ) -> &Selection {
        let selection = table.select(from, to, interval);
        self.set_selection(interval, selection)
    }

    pub fn select_all(&mut self, table: &mut Table, interval: Option<Interval>) -> &Selection {
        let selection = table.storage(interval).select_all();
        self.set_selection(interval, selection)
    }

    fn set_selection(&mut self, interval: Option<Interval>, selection: Selection) -> &Selection {
        self.interval = interval;
        self.meta.clear();
        self.selection.insert(selection)
    }

    /// Looks up a row of the current storage regardless of the selection.
    pub fn search<'a>(
        &'a self,
        table: &'a mut Table,
        key: RowKey,
        mode: SearchMode,
    ) -> Option<RowView<'a>> {
        let storage = table.storage(self.interval);
        let index = storage.search_index(key, mode)?;
        RowView::new(storage, index, &self.mapping)
    }

    pub fn first_visible_row<'a>(&'a self, table: &'a mut Table) -> Option<RowView<'a>> {
        self.view_at(table, Selection::first)
    }

    pub fn last_visible_row<'a>(&'a self, table: &'a mut Table) -> Option<RowView<'a>> {
        self.view_at(table, Selection::last)
    }

    pub fn pre_first_row<'a>(&'a self, table: &'a mut Table) -> Option<RowView<'a>> {
        self.view_at(table, Selection::pre_first)
    }

    pub fn post_last_row<'a>(&'a self, table: &'a mut Table) -> Option<RowView<'a>> {
        self.view_at(table, Selection::post_last)
    }

    fn view_at<'a>(
        &'a self,
        table: &'a mut Table,
        position: impl Fn(&Selection) -> Option<usize>,
    ) -> Option<RowView<'a>> {
        let index = position(self.selection.as_ref()?)?;
        RowView::new(table.storage(self.interval), index, &self.mapping)
    }

    /// Minimum of `field` over the selection and its neighbours.
    #[must_use]
    pub fn min(&self, field: &str) -> Option<f64> {
        let column = self.field_column(field)?;
        self.selection.as_ref().map(|selection| selection.min(column))
    }

    /// Maximum of `field` over the selection and its neighbours.
    #[must_use]
    pub fn max(&self, field: &str) -> Option<f64> {
        let column = self.field_column(field)?;
        self.selection.as_ref().map(|selection| selection.max(column))
    }

    fn field_column(&self, field: &str) -> Option<Column> {
        self.mapping
            .column(field, self.interval.is_some())
            .ok()
    }

    /// Iterator over the current selection, or over every row when nothing is selected.
    pub fn iterator<'a>(&'a mut self, table: &'a mut Table) -> TableIterator<'a> {
        let Self {
            mapping,
            interval,
            selection,
            meta,
        } = self;
        let storage = table.storage(*interval);
        let selection = selection.get_or_insert_with(|| storage.select_all());
        TableIterator::new(storage, selection, mapping).with_meta(meta)
    }

    /// Like [`Self::iterator`], following the keys of `co`.
    pub fn iterator_with<'a>(
        &'a mut self,
        table: &'a mut Table,
        co: Box<dyn CoIterator + 'a>,
    ) -> TableIterator<'a> {
        self.iterator(table).with_co_iterator(co)
    }
}
