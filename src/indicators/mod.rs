//! Incremental indicator kernels.
//!
//! Each kernel module exposes `init_context`, `start` and `calculate` over a
//! plain context struct, plus an [`IndicatorKernel`] wrapper that reads and
//! writes rows through a [`RowProxy`].

pub mod kdj;
pub mod ma;
pub mod psar;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::RowProxy;
use crate::error::{ChartError, ChartResult};

pub use kdj::{KdjKernel, KdjParams};
pub use ma::{MovingAverageKernel, MovingAverageParams, MovingAverageType};
pub use psar::{PsarKernel, PsarParams};

/// Largest window accepted for any period parameter.
pub const MAX_PERIOD: usize = 1_000_000;

/// Rejects periods above [`MAX_PERIOD`]. `None` and `0` fall back to defaults later.
pub(crate) fn check_period(name: &'static str, period: Option<usize>) -> ChartResult<()> {
    match period {
        Some(period) if period > MAX_PERIOD => Err(ChartError::InvalidParameter {
            name,
            value: period.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Incremental indicator driven row by row by a table computer.
pub trait IndicatorKernel: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Fields read through [`RowProxy::input`], in slot order.
    fn input_fields(&self) -> &'static [&'static str];

    /// Fields written through [`RowProxy::set_output`], in slot order.
    fn output_fields(&self) -> &'static [&'static str];

    /// Resets running state before a run from the first row.
    fn start(&mut self);

    fn calculate(&mut self, row: &mut RowProxy<'_>) -> ChartResult<()>;

    /// Rebuilds the context from new parameters.
    fn reinit(&mut self, params: &IndicatorParams) -> ChartResult<()>;

    fn params(&self) -> IndicatorParams;
}

/// Parameters of any registered kernel, tagged by indicator name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "indicator", rename_all = "lowercase")]
pub enum IndicatorParams {
    Psar(PsarParams),
    Kdj(KdjParams),
    Sma(MovingAverageParams),
    Ema(MovingAverageParams),
}

impl IndicatorParams {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Psar(_) => "psar",
            Self::Kdj(_) => "kdj",
            Self::Sma(_) => "sma",
            Self::Ema(_) => "ema",
        }
    }

    /// Fails with `InvalidParameter` on values no kernel can be built from.
    pub fn validate(&self) -> ChartResult<()> {
        match self {
            Self::Psar(_) => Ok(()),
            Self::Kdj(params) => params.validate(),
            Self::Sma(params) | Self::Ema(params) => params.validate(),
        }
    }

    /// Loads and validates parameters from JSON such as
    /// `{"indicator":"psar","acceleration_max":0.3}`.
    pub fn from_json(text: &str) -> ChartResult<Self> {
        let params: Self = serde_json::from_str(text)
            .map_err(|err| ChartError::InvalidData(format!("indicator params: {err}")))?;
        params.validate()?;
        Ok(params)
    }
}

/// Creates a kernel by indicator name, with default parameters when `params` is `None`.
pub fn create_kernel(
    name: &str,
    params: Option<&IndicatorParams>,
) -> ChartResult<Box<dyn IndicatorKernel>> {
    let mut kernel: Box<dyn IndicatorKernel> = match name.to_ascii_lowercase().as_str() {
        "psar" => Box::new(PsarKernel::default()),
        "kdj" => Box::new(KdjKernel::default()),
        "sma" => Box::new(MovingAverageKernel::sma(MovingAverageParams::default())),
        "ema" => Box::new(MovingAverageKernel::ema(MovingAverageParams::default())),
        _ => {
            return Err(ChartError::UnknownIndicator {
                name: name.to_owned(),
            });
        }
    };
    if let Some(params) = params {
        params.validate()?;
        kernel.reinit(params)?;
    }
    Ok(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_load_from_tagged_json() {
        let params = IndicatorParams::from_json(r#"{"indicator":"psar","acceleration_max":0.3}"#)
            .expect("valid params");
        assert_eq!(
            params,
            IndicatorParams::Psar(PsarParams {
                acceleration_max: Some(0.3),
                ..PsarParams::default()
            })
        );
    }

    #[test]
    fn registry_rejects_mismatched_params() {
        assert!(create_kernel("PSAR", None).is_ok());
        assert!(matches!(
            create_kernel("macd", None),
            Err(ChartError::UnknownIndicator { .. })
        ));
        let ema = IndicatorParams::Ema(MovingAverageParams::default());
        assert!(create_kernel("psar", Some(&ema)).is_err());
        assert!(create_kernel("ema", Some(&ema)).is_ok());
    }

    #[test]
    fn oversized_periods_are_rejected() {
        let err = IndicatorParams::from_json(r#"{"indicator":"sma","period":1000000000000000000}"#)
            .expect_err("period too large");
        assert!(matches!(err, ChartError::InvalidParameter { name: "period", .. }));

        let kdj = IndicatorParams::Kdj(KdjParams {
            d_period: Some(MAX_PERIOD + 1),
            ..KdjParams::default()
        });
        assert!(matches!(
            create_kernel("kdj", Some(&kdj)),
            Err(ChartError::InvalidParameter { name: "d_period", .. })
        ));
        let largest = IndicatorParams::Ema(MovingAverageParams {
            period: Some(MAX_PERIOD),
        });
        assert!(create_kernel("ema", Some(&largest)).is_ok());
    }
}
