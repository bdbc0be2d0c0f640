use serde::{Deserialize, Serialize};

use super::row::TableRow;

/// Reducer used to collapse several source rows into one grouped row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationType {
    /// First non-`NaN` value of the group.
    First,
    /// Last non-`NaN` value of the group.
    Last,
    Min,
    Max,
    Sum,
    #[serde(alias = "avg")]
    Average,
    /// Weighted by a second column; plain average without one.
    WeightedAverage,
    /// First value of the group, `NaN` included.
    FirstValue,
    /// Last value of the group, `NaN` included.
    LastValue,
}

impl AggregationType {
    /// Default reducer for a semantic field name, mirroring OHLCV conventions.
    #[must_use]
    pub fn for_field_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "open" => Self::First,
            "high" => Self::Max,
            "low" => Self::Min,
            "volume" => Self::Sum,
            _ => Self::Last,
        }
    }
}

/// Identity of a registered aggregate column. Identical definitions share one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AggregatorKey {
    pub kind: AggregationType,
    pub values_column: usize,
    pub weights_column: Option<usize>,
}

/// Streaming reducer state for one aggregate column.
#[derive(Debug, Clone)]
pub(crate) struct Aggregator {
    kind: AggregationType,
    values_column: usize,
    weights_column: Option<usize>,
    value: f64,
    weight_sum: f64,
    count: usize,
    seen: bool,
}

impl Aggregator {
    pub fn new(key: AggregatorKey) -> Self {
        let kind = match (key.kind, key.weights_column) {
            (AggregationType::WeightedAverage, None) => AggregationType::Average,
            (kind, _) => kind,
        };
        Self {
            kind,
            values_column: key.values_column,
            weights_column: key.weights_column,
            value: f64::NAN,
            weight_sum: 0.0,
            count: 0,
            seen: false,
        }
    }

    pub fn process(&mut self, row: &TableRow) {
        let value = row.value(self.values_column);
        match self.kind {
            AggregationType::FirstValue => {
                if !self.seen {
                    self.value = value;
                }
            }
            AggregationType::LastValue => self.value = value,
            _ if value.is_nan() => return,
            AggregationType::First => {
                if !self.seen {
                    self.value = value;
                }
            }
            AggregationType::Last => self.value = value,
            AggregationType::Min => {
                if !self.seen || value < self.value {
                    self.value = value;
                }
            }
            AggregationType::Max => {
                if !self.seen || value > self.value {
                    self.value = value;
                }
            }
            AggregationType::Sum | AggregationType::Average => {
                self.value = if self.seen { self.value + value } else { value };
                self.count += 1;
            }
            AggregationType::WeightedAverage => {
                let weight = self
                    .weights_column
                    .map_or(f64::NAN, |column| row.value(column));
                if weight.is_nan() {
                    return;
                }
                self.value = if self.seen {
                    self.value + value * weight
                } else {
                    value * weight
                };
                self.weight_sum += weight;
            }
        }
        self.seen = true;
    }

    /// Returns the reduced value of the current group and clears the state.
    pub fn take(&mut self) -> f64 {
        let result = if !self.seen {
            f64::NAN
        } else {
            match self.kind {
                AggregationType::Average => self.value / self.count as f64,
                AggregationType::WeightedAverage => {
                    if self.weight_sum == 0.0 {
                        f64::NAN
                    } else {
                        self.value / self.weight_sum
                    }
                }
                _ => self.value,
            }
        };
        self.value = f64::NAN;
        self.weight_sum = 0.0;
        self.count = 0;
        self.seen = false;
        result
    }
}
