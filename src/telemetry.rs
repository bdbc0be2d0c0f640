//! Telemetry helpers for applications embedding `chart-stock`.
//!
//! Tracing setup stays explicit and opt-in. Hosts can either call
//! `init_default_tracing` or wire their own `tracing` subscriber; the table,
//! aggregation and computer layers only emit events.

/// Filter used when `RUST_LOG` is unset or invalid.
///
/// Passes `info` and above from targets under `chart_stock` and drops every
/// other crate, so the per-row `trace!` and per-run `debug!` events stay off.
pub const DEFAULT_FILTER: &str = "chart_stock=info";

/// Installs a compact `fmt` subscriber when the `telemetry` feature is enabled.
///
/// The filter comes from `RUST_LOG` (e.g. `chart_stock::data=trace`) and falls
/// back to [`DEFAULT_FILTER`]. Event targets are printed so table, aggregate
/// and computer events can be told apart.
///
/// Returns `false` without the feature or when the host already installed a
/// global subscriber.
#[must_use]
pub fn init_default_tracing() -> bool {
    #[cfg(feature = "telemetry")]
    {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
            )
            .with_target(true)
            .compact();

        return builder.try_init().is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        false
    }
}
