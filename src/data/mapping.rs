use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

use super::aggregation::AggregationType;
use super::row::Column;
use super::table::{MappingId, Table, TableId};

/// Columns a named field reads on the main storage and on grouped storages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub source: Column,
    pub aggregate: Column,
    pub aggregation: Option<AggregationType>,
}

/// Named view over the columns of one [`Table`].
///
/// A mapping owns no rows. Bindings are resolved when a field is read, so a
/// mapping may name fields that are bound later. Every edit is published to
/// the table, and computers bound to the mapping read the latest bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMapping {
    id: MappingId,
    table_id: TableId,
    fields: IndexMap<String, FieldBinding>,
}

impl TableMapping {
    #[must_use]
    pub fn new(table: &Table) -> Self {
        Self {
            id: MappingId::next(),
            table_id: table.id(),
            fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> MappingId {
        self.id
    }

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Binds `name` to raw `column`, grouped with `aggregation`.
    ///
    /// `None` picks the reducer conventional for the field name (`open` → first,
    /// `high` → max, `low` → min, `volume` → sum, anything else → last).
    pub fn add_field(
        &mut self,
        table: &mut Table,
        name: &str,
        column: usize,
        aggregation: Option<AggregationType>,
    ) -> ChartResult<()> {
        self.add_field_weighted(table, name, column, aggregation, None)
    }

    /// Like [`Self::add_field`] with a weights column for weighted averages.
    pub fn add_field_weighted(
        &mut self,
        table: &mut Table,
        name: &str,
        column: usize,
        aggregation: Option<AggregationType>,
        weights_column: Option<usize>,
    ) -> ChartResult<()> {
        self.ensure_table(table)?;
        let aggregation = aggregation.unwrap_or_else(|| AggregationType::for_field_name(name));
        let aggregate = table.register_field(column, aggregation, weights_column);
        self.fields.insert(
            name.to_owned(),
            FieldBinding {
                source: Column::Value(column),
                aggregate: Column::Value(aggregate),
                aggregation: Some(aggregation),
            },
        );
        table.register_mapping(self);
        Ok(())
    }

    /// Allocates a fresh raw column owned by this mapping and binds `name` to it.
    pub fn allocate_field(
        &mut self,
        table: &mut Table,
        name: &str,
        aggregation: Option<AggregationType>,
    ) -> ChartResult<usize> {
        self.ensure_table(table)?;
        let column = table.allocate_column(self.id);
        self.add_field(table, name, column, aggregation)?;
        Ok(column)
    }

    /// Binds `name` to a computed column, shared by all storages.
    pub fn add_computed_field(
        &mut self,
        table: &mut Table,
        name: &str,
        column: usize,
    ) -> ChartResult<()> {
        self.ensure_table(table)?;
        self.fields.insert(
            name.to_owned(),
            FieldBinding {
                source: Column::Computed(column),
                aggregate: Column::Computed(column),
                aggregation: None,
            },
        );
        table.register_mapping(self);
        Ok(())
    }

    pub fn remove_field(
        &mut self,
        table: &mut Table,
        name: &str,
    ) -> ChartResult<Option<FieldBinding>> {
        self.ensure_table(table)?;
        let removed = self.fields.shift_remove(name);
        if removed.is_some() {
            table.register_mapping(self);
        }
        Ok(removed)
    }

    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    /// Column read for `name` on a main (`aggregated == false`) or grouped storage.
    pub fn column(&self, name: &str, aggregated: bool) -> ChartResult<Column> {
        self.fields
            .get(name)
            .map(|binding| {
                if aggregated {
                    binding.aggregate
                } else {
                    binding.source
                }
            })
            .ok_or_else(|| ChartError::MappingBinding {
                field: name.to_owned(),
            })
    }

    pub(crate) fn ensure_table(&self, table: &Table) -> ChartResult<()> {
        if self.table_id == table.id() {
            Ok(())
        } else {
            Err(ChartError::MappingTableMismatch)
        }
    }
}
