use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::error::{ChartError, ChartResult};

/// Row identity: epoch milliseconds.
pub type RowKey = i64;

const MILLIS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> ChartResult<f64> {
    value.to_f64().ok_or_else(|| {
        ChartError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

#[must_use]
pub fn datetime_to_key(time: DateTime<Utc>) -> RowKey {
    time.timestamp_millis()
}

/// Validates a floating key and converts it to a [`RowKey`].
///
/// Keys must be finite, integral and inside the millisecond range of
/// `chrono` timestamps, so calendar grouping can place every row.
pub fn key_from_f64(key: f64) -> ChartResult<RowKey> {
    let min = DateTime::<Utc>::MIN_UTC.timestamp_millis() as f64;
    let max = DateTime::<Utc>::MAX_UTC.timestamp_millis() as f64;
    if !key.is_finite() || key.fract() != 0.0 || key < min || key > max {
        return Err(ChartError::InvalidKey { key });
    }
    Ok(key as RowKey)
}

/// Parses a raw key cell: numbers, numeric strings and RFC 3339 / ISO dates.
///
/// Returns `None` for anything that cannot be interpreted as a key.
#[must_use]
pub fn parse_key_cell(cell: &Value, time_offset_hours: f64) -> Option<RowKey> {
    let millis = match cell {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => parse_key_text(text.trim())?,
        _ => return None,
    };
    let shifted = millis + time_offset_hours * MILLIS_PER_HOUR;
    key_from_f64(shifted.round()).ok()
}

fn parse_key_text(text: &str) -> Option<f64> {
    if let Ok(number) = text.parse::<f64>() {
        return Some(number);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.timestamp_millis() as f64);
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(time.and_utc().timestamp_millis() as f64);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc().timestamp_millis() as f64)
}

/// Converts a raw value cell to `f64`. Non-numeric cells become `NaN`.
#[must_use]
pub fn parse_value_cell(cell: &Value) -> f64 {
    match cell {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => f64::NAN,
    }
}
