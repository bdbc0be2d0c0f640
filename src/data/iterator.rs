use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::core::RowKey;

use super::mapping::TableMapping;
use super::row::{Column, TableRow};
use super::storage::{Selection, TableStorage};

/// Per-index meta values, keyed by meta name.
pub type MetaStore = IndexMap<usize, IndexMap<String, Value>>;

/// Externally driven ascending key sequence that an iterator follows.
pub trait CoIterator {
    /// Moves to the next key. Returns `false` once exhausted.
    fn advance(&mut self) -> bool;
    fn current_key(&self) -> Option<RowKey>;
    fn current_index(&self) -> Option<usize>;
    fn reset(&mut self);
}

/// Owned copy of one iterator position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub index: usize,
    pub key: RowKey,
    /// Mapped field values, `None` for a position with no row.
    pub fields: Option<IndexMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    PreFirst,
    Positioned {
        row: Option<usize>,
        index: usize,
        key: RowKey,
    },
    Exhausted,
}

enum Cursor<'a> {
    Simple,
    CoIterated {
        co: Box<dyn CoIterator + 'a>,
        next_row: usize,
    },
}

/// Cursor over a selection of rows, read through a mapping.
///
/// With a co-iterator attached the cursor follows the co-iterator's keys and
/// reports positions with no matching row as not existing.
pub struct TableIterator<'a> {
    rows: &'a [TableRow],
    mapping: &'a TableMapping,
    aggregated: bool,
    first_index: usize,
    end_index: usize,
    cursor: Cursor<'a>,
    state: State,
    meta: Option<&'a mut MetaStore>,
}

impl std::fmt::Debug for TableIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableIterator")
            .field("first_index", &self.first_index)
            .field("end_index", &self.end_index)
            .field("co_iterated", &matches!(self.cursor, Cursor::CoIterated { .. }))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> TableIterator<'a> {
    #[must_use]
    pub fn new(storage: &'a TableStorage, selection: &Selection, mapping: &'a TableMapping) -> Self {
        let rows = storage.rows();
        let end_index = selection.end_index().min(rows.len());
        Self {
            rows,
            mapping,
            aggregated: storage.is_aggregated(),
            first_index: selection.first_index().min(end_index),
            end_index,
            cursor: Cursor::Simple,
            state: State::PreFirst,
            meta: None,
        }
    }

    /// Follows `co` instead of walking rows one by one. Resets the iterator.
    #[must_use]
    pub fn with_co_iterator(mut self, co: Box<dyn CoIterator + 'a>) -> Self {
        self.cursor = Cursor::CoIterated {
            co,
            next_row: self.first_index,
        };
        self.reset();
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: &'a mut MetaStore) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Moves to the next position. Returns `false` once exhausted.
    pub fn advance(&mut self) -> bool {
        if self.state == State::Exhausted {
            return false;
        }
        let next = match &mut self.cursor {
            Cursor::Simple => {
                let row = match self.state {
                    State::PreFirst => self.first_index,
                    State::Positioned { index, .. } => index + 1,
                    State::Exhausted => self.end_index,
                };
                (row < self.end_index).then(|| State::Positioned {
                    row: Some(row),
                    index: row,
                    key: self.rows[row].key,
                })
            }
            Cursor::CoIterated { co, next_row } => {
                if co.advance() {
                    co.current_key().zip(co.current_index()).map(|(key, index)| {
                        while *next_row < self.end_index && self.rows[*next_row].key < key {
                            *next_row += 1;
                        }
                        let row = (*next_row < self.end_index
                            && self.rows[*next_row].key == key)
                            .then_some(*next_row);
                        if row.is_some() {
                            *next_row += 1;
                        }
                        State::Positioned { row, index, key }
                    })
                } else {
                    None
                }
            }
        };
        self.state = next.unwrap_or(State::Exhausted);
        if let State::Positioned { row, index, key } = self.state {
            trace!(index, key, exists = row.is_some(), "advance table iterator");
        }
        self.state != State::Exhausted
    }

    /// Returns to the pre-first position.
    pub fn reset(&mut self) {
        if let Cursor::CoIterated { co, next_row } = &mut self.cursor {
            co.reset();
            *next_row = self.first_index;
        }
        self.state = State::PreFirst;
    }

    /// Current row, `None` outside a positioned state or on a missing row.
    #[must_use]
    pub fn current(&self) -> Option<&'a TableRow> {
        match self.state {
            State::Positioned { row: Some(row), .. } => self.rows.get(row),
            _ => None,
        }
    }

    /// Mapped value of `field` on the current row.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<f64> {
        let column = self.mapping.column(field, self.aggregated).ok()?;
        self.get_column(column)
    }

    #[must_use]
    pub fn get_column(&self, column: Column) -> Option<f64> {
        self.current().map(|row| row.column(column))
    }

    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.state {
            State::Positioned { index, .. } => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<RowKey> {
        match self.state {
            State::Positioned { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Whether the current position has a row.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.current().is_some()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Rows in the underlying selection.
    #[must_use]
    pub fn rows_count(&self) -> usize {
        self.end_index - self.first_index
    }

    #[must_use]
    pub fn meta(&self, name: &str) -> Option<&Value> {
        let index = self.index()?;
        self.meta.as_deref()?.get(&index)?.get(name)
    }

    /// Stores a meta value at the current position. Returns `false` when not positioned.
    pub fn set_meta(&mut self, name: &str, value: Value) -> bool {
        let Some(index) = self.index() else {
            return false;
        };
        let Some(meta) = self.meta.as_deref_mut() else {
            return false;
        };
        meta.entry(index)
            .or_default()
            .insert(name.to_owned(), value);
        true
    }

    /// Drains every position into snapshots, leaving the iterator reset.
    pub fn to_vec(&mut self) -> Vec<RowSnapshot> {
        self.reset();
        let mapping = self.mapping;
        let names: Vec<&str> = mapping.field_names().collect();
        let mut snapshots = Vec::new();
        while self.advance() {
            let (Some(index), Some(key)) = (self.index(), self.key()) else {
                continue;
            };
            let fields = self.exists().then(|| {
                names
                    .iter()
                    .map(|name| ((*name).to_owned(), self.get(name).unwrap_or(f64::NAN)))
                    .collect()
            });
            snapshots.push(RowSnapshot { index, key, fields });
        }
        self.reset();
        snapshots
    }
}
