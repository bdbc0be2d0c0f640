pub mod cycled_queue;
pub mod primitives;

pub use cycled_queue::CycledQueue;
pub use primitives::{RowKey, datetime_to_key, decimal_to_f64, key_from_f64};
