use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid row key: {key}")]
    InvalidKey { key: f64 },

    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("indicator `{indicator}` failed at row key {key}: {source}")]
    Computation {
        key: i64,
        indicator: String,
        #[source]
        source: Box<ChartError>,
    },

    #[error("field `{field}` is not bound to any column")]
    MappingBinding { field: String },

    #[error("mapping belongs to a different table")]
    MappingTableMismatch,

    #[error("computed field name `{name}` is already registered")]
    DuplicateComputedField { name: String },

    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("unknown indicator `{name}`")]
    UnknownIndicator { name: String },

    #[error("unknown computer id {id}")]
    UnknownComputer { id: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
