use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kettle_core::calibration::CalibrationStore;
use kettle_core::{MedianWindow, MemoryLog, ScaleCfg, WeightChannel};
use kettle_hardware::{MemoryStore, SimulatedLoadCell};

// Filling ramp in grams: linear rise with xorshift noise and a rare spike.
fn fill_trace(n: usize, noise_g: f32, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    let mut next_unit = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| {
            let base = 400.0 + i as f32 * 1.5;
            let noise = (next_unit() * 2.0 - 1.0) * noise_g;
            if i % 97 == 0 { base + 900.0 } else { base + noise }
        })
        .collect()
}

fn sample_size(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p kettle_core --bench weight_filter
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(10));
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms));
    }
}

pub fn bench_median(c: &mut Criterion) {
    let mut g = c.benchmark_group("median_window");
    sample_size(&mut g);
    let trace = fill_trace(10_000, 3.0, 0xC0FFEE);

    for &cap in &[3usize, 5, 9, 15] {
        g.bench_function(format!("cap_{cap}"), |b| {
            b.iter_batched(
                || MedianWindow::new(cap),
                |mut w| {
                    let mut acc = 0.0f32;
                    for &v in black_box(&trace) {
                        w.push(v);
                        acc += w.median().unwrap_or(0.0);
                    }
                    black_box(acc);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

pub fn bench_channel(c: &mut Criterion) {
    let mut g = c.benchmark_group("weight_channel");
    sample_size(&mut g);
    let trace = fill_trace(2_000, 3.0, 0xBEEF);
    let factor = 0.5f32;

    g.bench_function("update_with_outliers", |b| {
        b.iter_batched(
            || {
                let cell = SimulatedLoadCell::new(0);
                let cfg = ScaleCfg {
                    default_factor: factor,
                    ..ScaleCfg::default()
                };
                let ch = WeightChannel::open(
                    Box::new(cell.clone()),
                    CalibrationStore::new(Box::new(MemoryStore::new(64)), 0),
                    cfg,
                    Arc::new(MemoryLog::new()),
                    0,
                );
                (cell, ch)
            },
            |(cell, mut ch)| {
                let mut now = 0u32;
                for &g in &trace {
                    cell.set_raw((g / factor) as i32);
                    now = now.wrapping_add(100);
                    ch.update(now);
                }
                black_box(ch.current_weight());
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

criterion_group!(weight_filter, bench_median, bench_channel);
criterion_main!(weight_filter);
