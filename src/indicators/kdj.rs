use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::CycledQueue;
use crate::data::RowProxy;
use crate::error::{ChartError, ChartResult};

use super::ma::{MovingAverage, MovingAverageType};
use super::{IndicatorKernel, IndicatorParams, MAX_PERIOD, check_period};

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_K_MA_PERIOD: usize = 5;
pub const DEFAULT_D_PERIOD: usize = 5;
pub const DEFAULT_K_MULTIPLIER: f64 = -2.0;
pub const DEFAULT_D_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KdjParams {
    pub k_period: Option<usize>,
    pub k_ma_period: Option<usize>,
    pub d_period: Option<usize>,
    pub k_ma_type: Option<MovingAverageType>,
    pub d_ma_type: Option<MovingAverageType>,
    pub k_multiplier: Option<f64>,
    pub d_multiplier: Option<f64>,
}

impl KdjParams {
    pub fn validate(&self) -> ChartResult<()> {
        check_period("k_period", self.k_period)?;
        check_period("k_ma_period", self.k_ma_period)?;
        check_period("d_period", self.d_period)
    }
}

/// K, D and J of one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KdjValue {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

impl KdjValue {
    const NAN: Self = Self {
        k: f64::NAN,
        d: f64::NAN,
        j: f64::NAN,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct KdjContext {
    highs: CycledQueue<f64>,
    lows: CycledQueue<f64>,
    k_ma: MovingAverage,
    d_ma: MovingAverage,
    k_multiplier: f64,
    d_multiplier: f64,
}

fn period_or(value: Option<usize>, default: usize) -> usize {
    value
        .filter(|period| *period > 0)
        .unwrap_or(default)
        .min(MAX_PERIOD)
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|value| value.is_finite()).unwrap_or(default)
}

#[must_use]
pub fn init_context(params: &KdjParams) -> KdjContext {
    let k_period = period_or(params.k_period, DEFAULT_K_PERIOD);
    KdjContext {
        highs: CycledQueue::new(k_period),
        lows: CycledQueue::new(k_period),
        k_ma: MovingAverage::new(
            params.k_ma_type.unwrap_or_default(),
            period_or(params.k_ma_period, DEFAULT_K_MA_PERIOD),
        ),
        d_ma: MovingAverage::new(
            params.d_ma_type.unwrap_or_default(),
            period_or(params.d_period, DEFAULT_D_PERIOD),
        ),
        k_multiplier: finite_or(params.k_multiplier, DEFAULT_K_MULTIPLIER),
        d_multiplier: finite_or(params.d_multiplier, DEFAULT_D_MULTIPLIER),
    }
}

pub fn start(context: &mut KdjContext) {
    context.highs.clear();
    context.lows.clear();
    context.k_ma.start();
    context.d_ma.start();
}

pub fn calculate(context: &mut KdjContext, high: f64, low: f64, close: f64) -> KdjValue {
    if high.is_nan() || low.is_nan() || close.is_nan() {
        return KdjValue::NAN;
    }
    context.highs.enqueue(high);
    context.lows.enqueue(low);
    if !context.highs.is_full() {
        return KdjValue::NAN;
    }

    let highest = context.highs.iter().copied().map(OrderedFloat).max();
    let lowest = context.lows.iter().copied().map(OrderedFloat).min();
    let (Some(OrderedFloat(highest)), Some(OrderedFloat(lowest))) = (highest, lowest) else {
        return KdjValue::NAN;
    };
    if highest == lowest {
        return KdjValue::NAN;
    }

    let raw_k = 100.0 * (close - lowest) / (highest - lowest);
    let k = context.k_ma.calculate(raw_k);
    let d = if k.is_nan() {
        f64::NAN
    } else {
        context.d_ma.calculate(k)
    };
    let j = context.d_multiplier * d + context.k_multiplier * k;
    KdjValue { k, d, j }
}

/// KDJ over `high`, `low` and `close` into `k`, `d` and `j`.
#[derive(Debug, Clone)]
pub struct KdjKernel {
    params: KdjParams,
    context: KdjContext,
}

impl KdjKernel {
    #[must_use]
    pub fn new(params: KdjParams) -> Self {
        Self {
            params,
            context: init_context(&params),
        }
    }
}

impl Default for KdjKernel {
    fn default() -> Self {
        Self::new(KdjParams::default())
    }
}

const HIGH: usize = 0;
const LOW: usize = 1;
const CLOSE: usize = 2;
const K: usize = 0;
const D: usize = 1;
const J: usize = 2;

impl IndicatorKernel for KdjKernel {
    fn name(&self) -> &'static str {
        "kdj"
    }

    fn input_fields(&self) -> &'static [&'static str] {
        &["high", "low", "close"]
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["k", "d", "j"]
    }

    fn start(&mut self) {
        start(&mut self.context);
    }

    fn calculate(&mut self, row: &mut RowProxy<'_>) -> ChartResult<()> {
        let value = calculate(
            &mut self.context,
            row.input(HIGH)?,
            row.input(LOW)?,
            row.input(CLOSE)?,
        );
        row.set_output(K, value.k)?;
        row.set_output(D, value.d)?;
        row.set_output(J, value.j)
    }

    fn reinit(&mut self, params: &IndicatorParams) -> ChartResult<()> {
        let IndicatorParams::Kdj(params) = params else {
            return Err(ChartError::InvalidParameter {
                name: "indicator",
                value: params.name().to_owned(),
            });
        };
        params.validate()?;
        *self = Self::new(*params);
        Ok(())
    }

    fn params(&self) -> IndicatorParams {
        IndicatorParams::Kdj(self.params)
    }
}
