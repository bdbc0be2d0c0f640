use serde::{Deserialize, Serialize};

use crate::core::CycledQueue;
use crate::data::RowProxy;
use crate::error::{ChartError, ChartResult};

use super::{IndicatorKernel, IndicatorParams, MAX_PERIOD, check_period};

pub const DEFAULT_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingAverageType {
    Sma,
    #[default]
    Ema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageParams {
    pub period: Option<usize>,
}

impl MovingAverageParams {
    /// Window length: `None` or `0` give the default, larger values are capped at [`MAX_PERIOD`].
    #[must_use]
    pub fn period(self) -> usize {
        self.period
            .filter(|period| *period > 0)
            .unwrap_or(DEFAULT_PERIOD)
            .min(MAX_PERIOD)
    }

    pub fn validate(&self) -> ChartResult<()> {
        check_period("period", self.period)
    }
}

/// Simple moving average over a fixed window.
#[derive(Debug, Clone, PartialEq)]
pub struct SmaContext {
    period: usize,
    window: CycledQueue<f64>,
    sum: f64,
}

impl SmaContext {
    #[must_use]
    pub fn new(period: usize) -> Self {
        let period = period.clamp(1, MAX_PERIOD);
        Self {
            period,
            window: CycledQueue::new(period),
            sum: 0.0,
        }
    }

    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn start(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }

    /// Feeds one value. `NaN` inputs return `NaN` and leave the window untouched.
    pub fn calculate(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        self.sum += value;
        if let Some(evicted) = self.window.enqueue(value) {
            self.sum -= evicted;
        }
        if self.window.is_full() {
            self.sum / self.period as f64
        } else {
            f64::NAN
        }
    }
}

/// Exponential moving average seeded with the SMA of the first `period` values.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaContext {
    alpha: f64,
    seed: SmaContext,
    prev: f64,
}

impl EmaContext {
    #[must_use]
    pub fn new(period: usize) -> Self {
        let seed = SmaContext::new(period);
        Self {
            alpha: 2.0 / (seed.period() as f64 + 1.0),
            seed,
            prev: f64::NAN,
        }
    }

    pub fn start(&mut self) {
        self.seed.start();
        self.prev = f64::NAN;
    }

    pub fn calculate(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        self.prev = if self.prev.is_nan() {
            self.seed.calculate(value)
        } else {
            self.alpha * value + (1.0 - self.alpha) * self.prev
        };
        self.prev
    }
}

/// Either moving average, picked at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum MovingAverage {
    Sma(SmaContext),
    Ema(EmaContext),
}

impl MovingAverage {
    #[must_use]
    pub fn new(kind: MovingAverageType, period: usize) -> Self {
        match kind {
            MovingAverageType::Sma => Self::Sma(SmaContext::new(period)),
            MovingAverageType::Ema => Self::Ema(EmaContext::new(period)),
        }
    }

    pub fn start(&mut self) {
        match self {
            Self::Sma(context) => context.start(),
            Self::Ema(context) => context.start(),
        }
    }

    pub fn calculate(&mut self, value: f64) -> f64 {
        match self {
            Self::Sma(context) => context.calculate(value),
            Self::Ema(context) => context.calculate(value),
        }
    }
}

/// Moving average of the `value` field into `result`.
#[derive(Debug, Clone)]
pub struct MovingAverageKernel {
    kind: MovingAverageType,
    params: MovingAverageParams,
    context: MovingAverage,
}

impl MovingAverageKernel {
    #[must_use]
    pub fn new(kind: MovingAverageType, params: MovingAverageParams) -> Self {
        Self {
            kind,
            params,
            context: MovingAverage::new(kind, params.period()),
        }
    }

    #[must_use]
    pub fn sma(params: MovingAverageParams) -> Self {
        Self::new(MovingAverageType::Sma, params)
    }

    #[must_use]
    pub fn ema(params: MovingAverageParams) -> Self {
        Self::new(MovingAverageType::Ema, params)
    }
}

const VALUE: usize = 0;
const RESULT: usize = 0;

impl IndicatorKernel for MovingAverageKernel {
    fn name(&self) -> &'static str {
        match self.kind {
            MovingAverageType::Sma => "sma",
            MovingAverageType::Ema => "ema",
        }
    }

    fn input_fields(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["result"]
    }

    fn start(&mut self) {
        self.context.start();
    }

    fn calculate(&mut self, row: &mut RowProxy<'_>) -> ChartResult<()> {
        let value = row.input(VALUE)?;
        row.set_output(RESULT, self.context.calculate(value))
    }

    fn reinit(&mut self, params: &IndicatorParams) -> ChartResult<()> {
        let params = match (self.kind, params) {
            (MovingAverageType::Sma, IndicatorParams::Sma(params))
            | (MovingAverageType::Ema, IndicatorParams::Ema(params)) => *params,
            (_, other) => {
                return Err(ChartError::InvalidParameter {
                    name: "indicator",
                    value: other.name().to_owned(),
                });
            }
        };
        params.validate()?;
        *self = Self::new(self.kind, params);
        Ok(())
    }

    fn params(&self) -> IndicatorParams {
        match self.kind {
            MovingAverageType::Sma => IndicatorParams::Sma(self.params),
            MovingAverageType::Ema => IndicatorParams::Ema(self.params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_waits_for_a_full_window() {
        let mut sma = SmaContext::new(3);
        assert!(sma.calculate(1.0).is_nan());
        assert!(sma.calculate(2.0).is_nan());
        assert_eq!(sma.calculate(3.0), 2.0);
        assert!(sma.calculate(f64::NAN).is_nan());
        assert_eq!(sma.calculate(7.0), 4.0);
    }

    #[test]
    fn ema_is_seeded_with_sma() {
        let mut ema = EmaContext::new(3);
        ema.calculate(1.0);
        ema.calculate(2.0);
        assert_eq!(ema.calculate(3.0), 2.0);
        assert_eq!(ema.calculate(6.0), 4.0);
    }

    #[test]
    fn zero_period_falls_back_to_default() {
        assert_eq!(MovingAverageParams { period: Some(0) }.period(), DEFAULT_PERIOD);
    }

    #[test]
    fn huge_period_is_capped_and_rejected_on_reinit() {
        let params = MovingAverageParams {
            period: Some(usize::MAX),
        };
        assert_eq!(params.period(), MAX_PERIOD);
        let mut kernel = MovingAverageKernel::sma(MovingAverageParams::default());
        assert!(matches!(
            kernel.reinit(&IndicatorParams::Sma(params)),
            Err(ChartError::InvalidParameter { name: "period", .. })
        ));
        assert_eq!(kernel.params(), IndicatorParams::Sma(MovingAverageParams::default()));
    }
}
