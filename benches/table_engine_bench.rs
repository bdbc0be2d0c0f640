use chart_stock::data::{Interval, IntervalUnit, Table, TableMapping, TableSelectable};
use chart_stock::indicators::psar::{self, PsarParams};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn generated_bars(count: usize) -> Vec<(f64, f64, f64, f64)> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            let base = 100.0 + (t * 0.05).sin() * 10.0;
            let close = if i % 2 == 0 { base + 1.0 } else { base - 1.0 };
            (base + 1.5, base - 1.5, close, 1_000.0 + t)
        })
        .collect()
}

fn ohlc_table(count: usize) -> (Table, TableMapping) {
    let mut table = Table::new();
    for (i, (high, low, close, volume)) in generated_bars(count).into_iter().enumerate() {
        table
            .add_row(i as f64 * 60_000.0, vec![high, low, close, volume])
            .expect("valid generated row");
    }
    let mut mapping = TableMapping::new(&table);
    for (column, name) in ["high", "low", "close", "volume"].iter().enumerate() {
        mapping
            .add_field(&mut table, name, column, None)
            .expect("same table");
    }
    (table, mapping)
}

fn bench_ingest_10k(c: &mut Criterion) {
    let bars = generated_bars(10_000);
    c.bench_function("table_ingest_10k", |b| {
        b.iter(|| {
            let mut table = Table::new();
            for (i, (high, low, close, volume)) in bars.iter().enumerate() {
                let _ = table
                    .add_row(i as f64, vec![*high, *low, *close, *volume])
                    .expect("valid generated row");
            }
            black_box(table.len())
        })
    });
}

fn bench_selection_iteration_10k(c: &mut Criterion) {
    let (mut table, mapping) = ohlc_table(10_000);
    let mut selectable = TableSelectable::new(mapping);
    selectable.select_all(&mut table, None);

    c.bench_function("selection_iteration_10k", |b| {
        b.iter(|| {
            let mut iterator = selectable.iterator(&mut table);
            let mut sum = 0.0;
            while iterator.advance() {
                sum += iterator.get("close").unwrap_or(0.0);
            }
            black_box(sum)
        })
    });
}

fn bench_hourly_aggregation_10k(c: &mut Criterion) {
    let (mut table, _mapping) = ohlc_table(10_000);
    let hour = Interval::new(IntervalUnit::Hour, 1).expect("valid interval");
    let first = table.storage(None).rows()[0].values.clone();

    // Re-inserting the head row forces a full rebuild of the grouped storage.
    c.bench_function("hourly_aggregation_10k", |b| {
        b.iter(|| {
            let _ = table.remove_first(1);
            let _ = table.add_row(0.0, first.clone()).expect("valid row");
            black_box(table.storage(Some(hour)).len())
        })
    });
}

fn bench_psar_stream_10k(c: &mut Criterion) {
    let bars = generated_bars(10_000);
    c.bench_function("psar_stream_10k", |b| {
        b.iter(|| {
            let mut context = psar::init_context(&PsarParams::default());
            let mut last = f64::NAN;
            for (high, low, _, _) in &bars {
                last = psar::calculate(&mut context, black_box(*high), black_box(*low));
            }
            black_box(last)
        })
    });
}

criterion_group!(
    benches,
    bench_ingest_10k,
    bench_selection_iteration_10k,
    bench_hourly_aggregation_10k,
    bench_psar_stream_10k
);
criterion_main!(benches);
