use serde::{Deserialize, Serialize};

use crate::core::RowKey;

/// Column address inside a table row.
///
/// `Value` columns index the raw (or aggregated) value array, `Computed`
/// columns index the lazily allocated computed-values extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Value(usize),
    Computed(usize),
}

/// One keyed row of a table storage.
///
/// Rows live in an ordered arena owned by their storage; the row following a
/// row is the next arena slot, so there is no explicit link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: RowKey,
    pub values: Vec<f64>,
    pub computed_values: Option<Vec<f64>>,
}

impl TableRow {
    #[must_use]
    pub fn new(key: RowKey, values: Vec<f64>) -> Self {
        Self {
            key,
            values,
            computed_values: None,
        }
    }

    /// Reads a column, `NaN` when the column was never written for this row.
    #[must_use]
    pub fn column(&self, column: Column) -> f64 {
        match column {
            Column::Value(index) => self.values.get(index).copied().unwrap_or(f64::NAN),
            Column::Computed(index) => self
                .computed_values
                .as_ref()
                .and_then(|computed| computed.get(index).copied())
                .unwrap_or(f64::NAN),
        }
    }

    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.column(Column::Value(index))
    }

    #[must_use]
    pub fn computed(&self, index: usize) -> f64 {
        self.column(Column::Computed(index))
    }

    /// Grows the computed extension to at least `count` slots.
    pub fn ensure_computed(&mut self, count: usize) {
        let computed = self.computed_values.get_or_insert_with(Vec::new);
        if computed.len() < count {
            computed.resize(count, f64::NAN);
        }
    }

    pub fn set_computed(&mut self, index: usize, value: f64) {
        self.ensure_computed(index + 1);
        if let Some(computed) = self.computed_values.as_mut() {
            computed[index] = value;
        }
    }

    /// Pads the raw values with `NaN` up to `width` columns.
    pub fn pad_values(&mut self, width: usize) {
        if self.values.len() < width {
            self.values.resize(width, f64::NAN);
        }
    }
}
