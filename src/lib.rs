//! chart-stock: stock data engine for charting.
//!
//! Key-ordered time-series tables with grouped storages, mappings and
//! iterators, plus incremental technical indicators computed into extension
//! columns of the same rows.

pub mod core;
pub mod data;
pub mod error;
pub mod indicators;
pub mod telemetry;
pub mod tree;

pub use crate::core::{CycledQueue, RowKey};
pub use data::{
    AggregationType, Column, ComputerId, Interval, IntervalUnit, KeyRegistry, SearchMode,
    Selection, Table, TableComputer, TableIterator, TableMapping, TableRow, TableSelectable,
};
pub use error::{ChartError, ChartResult};
pub use indicators::{IndicatorKernel, IndicatorParams, create_kernel};
