use chart_stock::indicators::psar::{self, PsarParams};
use proptest::prelude::*;

fn run(bars: &[(f64, f64)]) -> Vec<f64> {
    let mut context = psar::init_context(&PsarParams::default());
    bars.iter()
        .map(|(high, low)| psar::calculate(&mut context, *high, *low))
        .collect()
}

fn same(left: &[f64], right: &[f64]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(a, b)| (a.is_nan() && b.is_nan()) || (a - b).abs() <= 1e-9)
}

#[test]
fn single_bar_yields_nan() {
    let mut context = psar::init_context(&PsarParams::default());
    assert!(psar::calculate(&mut context, 10.0, 5.0).is_nan());
}

#[test]
fn second_bar_seeds_uptrend_at_lowest_low() {
    let mut context = psar::init_context(&PsarParams::default());
    psar::calculate(&mut context, 10.0, 5.0);
    let sar = psar::calculate(&mut context, 12.0, 6.0);
    assert!((sar - 5.0).abs() <= 1e-12);
    assert!(context.is_uptrend());
    assert!((context.extreme_point() - 12.0).abs() <= 1e-12);
    assert!((context.alpha() - 0.02).abs() <= 1e-12);
}

#[test]
fn second_bar_seeds_downtrend_at_highest_high() {
    let mut context = psar::init_context(&PsarParams::default());
    psar::calculate(&mut context, 12.0, 6.0);
    let sar = psar::calculate(&mut context, 10.0, 5.0);
    assert!((sar - 12.0).abs() <= 1e-12);
    assert!(!context.is_uptrend());
    assert!((context.extreme_point() - 5.0).abs() <= 1e-12);
}

#[test]
fn regression_sequence_with_reversal() {
    let sars = run(&[(10.0, 5.0), (12.0, 6.0), (13.0, 7.0), (11.0, 4.0), (9.0, 3.0)]);
    assert!(same(&sars, &[f64::NAN, 5.0, 5.0, 13.0, 13.0]));
}

#[test]
fn acceleration_grows_with_new_extremes_up_to_max() {
    let mut context = psar::init_context(&PsarParams {
        acceleration_start: Some(0.1),
        acceleration_increment: Some(0.1),
        acceleration_max: Some(0.25),
    });
    let mut high = 10.0;
    for _ in 0..6 {
        psar::calculate(&mut context, high, high - 1.0);
        high += 1.0;
    }
    assert!(context.is_uptrend());
    assert!((context.alpha() - 0.25).abs() <= 1e-12);
}

#[test]
fn nan_bar_does_not_disturb_state() {
    let clean = run(&[(10.0, 5.0), (12.0, 6.0), (13.0, 7.0), (14.0, 8.0)]);
    let gapped = run(&[
        (10.0, 5.0),
        (f64::NAN, 6.0),
        (12.0, 6.0),
        (13.0, f64::NAN),
        (13.0, 7.0),
        (14.0, 8.0),
    ]);
    let kept: Vec<f64> = [0, 2, 4, 5].iter().map(|index| gapped[*index]).collect();
    assert!(same(&clean, &kept));
    assert!(gapped[1].is_nan());
    assert!(gapped[3].is_nan());
}

#[test]
fn start_resets_running_state() {
    let bars = [(10.0, 5.0), (12.0, 6.0), (13.0, 7.0), (11.0, 4.0)];
    let mut context = psar::init_context(&PsarParams::default());
    let first: Vec<f64> = bars
        .iter()
        .map(|(high, low)| psar::calculate(&mut context, *high, *low))
        .collect();
    psar::start(&mut context);
    let second: Vec<f64> = bars
        .iter()
        .map(|(high, low)| psar::calculate(&mut context, *high, *low))
        .collect();
    assert!(same(&first, &second));
}

proptest! {
    #[test]
    fn uptrend_sar_stays_below_previous_lows(
        bars in prop::collection::vec((1.0f64..100.0, 0.0f64..5.0), 3..80)
    ) {
        let bars: Vec<(f64, f64)> = bars
            .into_iter()
            .map(|(low, spread)| (low + spread, low))
            .collect();
        let mut context = psar::init_context(&PsarParams::default());
        for (position, (high, low)) in bars.iter().enumerate() {
            let was_uptrend = context.is_uptrend();
            let sar = psar::calculate(&mut context, *high, *low);
            if position >= 2 && was_uptrend && context.is_uptrend() {
                prop_assert!(sar <= bars[position - 1].1 + 1e-9);
                prop_assert!(sar <= *low + 1e-9);
            }
        }
    }
}
