mod aggregate;
pub mod aggregation;
pub mod computer;
pub mod interval;
pub mod iterator;
pub mod mapping;
pub mod registry;
pub mod row;
pub mod selectable;
pub mod storage;
pub mod table;

pub use aggregation::AggregationType;
pub use computer::{ComputerId, RowProxy, TableComputer};
pub use interval::{Interval, IntervalGenerator, IntervalUnit};
pub use iterator::{CoIterator, MetaStore, RowSnapshot, TableIterator};
pub use mapping::{FieldBinding, TableMapping};
pub use registry::{KeyRegistry, RegistryIterator};
pub use row::{Column, TableRow};
pub use selectable::{RowView, TableSelectable};
pub use storage::{RowInsert, SearchMode, Selection, TableStorage};
pub use table::{IngestSettings, MappingId, Table, TableId};
