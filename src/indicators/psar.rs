//! Parabolic stop-and-reverse.
//!
//! The kernel keeps the last two (high, low) pairs. The SAR of a bar moves
//! towards the trend's extreme point by the acceleration factor, is clamped by
//! the lows (uptrend) or highs (downtrend) of the two previous bars, and flips
//! the trend when price crosses it.

use serde::{Deserialize, Serialize};

use crate::core::CycledQueue;
use crate::data::RowProxy;
use crate::error::{ChartError, ChartResult};

use super::{IndicatorKernel, IndicatorParams};

pub const DEFAULT_ACCELERATION_START: f64 = 0.02;
pub const DEFAULT_ACCELERATION_INCREMENT: f64 = 0.02;
pub const DEFAULT_ACCELERATION_MAX: f64 = 0.2;

const HISTORY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PsarParams {
    pub acceleration_start: Option<f64>,
    pub acceleration_increment: Option<f64>,
    pub acceleration_max: Option<f64>,
}

/// Running state of one PSAR computation.
#[derive(Debug, Clone, PartialEq)]
pub struct PsarContext {
    highs: CycledQueue<f64>,
    lows: CycledQueue<f64>,
    /// Values evicted from the history, i.e. two bars back. `NaN` until evicted.
    dequeued_high: f64,
    dequeued_low: f64,
    prev_result: f64,
    is_uptrend: bool,
    extreme_point: f64,
    alpha: f64,
    alpha_start: f64,
    alpha_increment: f64,
    alpha_max: f64,
}

impl PsarContext {
    #[must_use]
    pub fn is_uptrend(&self) -> bool {
        self.is_uptrend
    }

    #[must_use]
    pub fn extreme_point(&self) -> f64 {
        self.extreme_point
    }

    /// Current acceleration factor.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value
        .filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(default)
}

/// Builds a context, replacing missing or invalid parameters with the defaults.
#[must_use]
pub fn init_context(params: &PsarParams) -> PsarContext {
    let alpha_start = positive_or(params.acceleration_start, DEFAULT_ACCELERATION_START);
    let alpha_increment =
        positive_or(params.acceleration_increment, DEFAULT_ACCELERATION_INCREMENT);
    let mut alpha_max = positive_or(params.acceleration_max, DEFAULT_ACCELERATION_MAX);
    if alpha_max < alpha_start {
        alpha_max = alpha_start;
    }
    let mut context = PsarContext {
        highs: CycledQueue::new(HISTORY),
        lows: CycledQueue::new(HISTORY),
        dequeued_high: f64::NAN,
        dequeued_low: f64::NAN,
        prev_result: f64::NAN,
        is_uptrend: false,
        extreme_point: f64::NAN,
        alpha: alpha_start,
        alpha_start,
        alpha_increment,
        alpha_max,
    };
    start(&mut context);
    context
}

/// Resets the running state for a run from scratch.
pub fn start(context: &mut PsarContext) {
    context.highs.clear();
    context.lows.clear();
    context.dequeued_high = f64::NAN;
    context.dequeued_low = f64::NAN;
    context.prev_result = f64::NAN;
    context.is_uptrend = false;
    context.extreme_point = f64::NAN;
    context.alpha = context.alpha_start;
}

/// Feeds one bar and returns its SAR, `NaN` while fewer than two bars were seen.
///
/// A `NaN` high or low returns `NaN` without touching the state.
pub fn calculate(context: &mut PsarContext, high: f64, low: f64) -> f64 {
    if high.is_nan() || low.is_nan() {
        return f64::NAN;
    }
    if let Some(evicted) = context.highs.enqueue(high) {
        context.dequeued_high = evicted;
    }
    if let Some(evicted) = context.lows.enqueue(low) {
        context.dequeued_low = evicted;
    }
    let (Some(prev_high), Some(prev_low)) = (context.highs.value(0), context.lows.value(0)) else {
        return f64::NAN;
    };
    if context.highs.len() < HISTORY {
        return f64::NAN;
    }

    let sar = if context.prev_result.is_nan() {
        context.is_uptrend = prev_high <= high;
        context.alpha = context.alpha_start;
        if context.is_uptrend {
            context.extreme_point = prev_high.max(high);
            prev_low.min(low)
        } else {
            context.extreme_point = prev_low.min(low);
            prev_high.max(high)
        }
    } else if context.is_uptrend {
        step_uptrend(context, high, low, prev_low)
    } else {
        step_downtrend(context, high, low, prev_high)
    };
    context.prev_result = sar;
    sar
}

fn step_uptrend(context: &mut PsarContext, high: f64, low: f64, prev_low: f64) -> f64 {
    let mut sar = context.prev_result + context.alpha * (context.extreme_point - context.prev_result);
    sar = sar.min(prev_low);
    if !context.dequeued_low.is_nan() {
        sar = sar.min(context.dequeued_low);
    }
    if low < sar {
        sar = context.extreme_point;
        context.is_uptrend = false;
        context.extreme_point = low;
        context.alpha = context.alpha_start;
    } else if high > context.extreme_point {
        context.extreme_point = high;
        context.alpha = (context.alpha + context.alpha_increment).min(context.alpha_max);
    }
    sar
}

fn step_downtrend(context: &mut PsarContext, high: f64, low: f64, prev_high: f64) -> f64 {
    let mut sar = context.prev_result + context.alpha * (context.extreme_point - context.prev_result);
    sar = sar.max(prev_high);
    if !context.dequeued_high.is_nan() {
        sar = sar.max(context.dequeued_high);
    }
    if high > sar {
        sar = context.extreme_point;
        context.is_uptrend = true;
        context.extreme_point = high;
        context.alpha = context.alpha_start;
    } else if low < context.extreme_point {
        context.extreme_point = low;
        context.alpha = (context.alpha + context.alpha_increment).min(context.alpha_max);
    }
    sar
}

/// PSAR over the `high` and `low` fields into `result`.
#[derive(Debug, Clone)]
pub struct PsarKernel {
    params: PsarParams,
    context: PsarContext,
}

impl PsarKernel {
    #[must_use]
    pub fn new(params: PsarParams) -> Self {
        Self {
            params,
            context: init_context(&params),
        }
    }

    #[must_use]
    pub fn context(&self) -> &PsarContext {
        &self.context
    }
}

impl Default for PsarKernel {
    fn default() -> Self {
        Self::new(PsarParams::default())
    }
}

const HIGH: usize = 0;
const LOW: usize = 1;
const RESULT: usize = 0;

impl IndicatorKernel for PsarKernel {
    fn name(&self) -> &'static str {
        "psar"
    }

    fn input_fields(&self) -> &'static [&'static str] {
        &["high", "low"]
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["result"]
    }

    fn start(&mut self) {
        start(&mut self.context);
    }

    fn calculate(&mut self, row: &mut RowProxy<'_>) -> ChartResult<()> {
        let high = row.input(HIGH)?;
        let low = row.input(LOW)?;
        row.set_output(RESULT, calculate(&mut self.context, high, low))
    }

    fn reinit(&mut self, params: &IndicatorParams) -> ChartResult<()> {
        let IndicatorParams::Psar(params) = params else {
            return Err(ChartError::InvalidParameter {
                name: "indicator",
                value: params.name().to_owned(),
            });
        };
        *self = Self::new(*params);
        Ok(())
    }

    fn params(&self) -> IndicatorParams {
        IndicatorParams::Psar(self.params)
    }
}
