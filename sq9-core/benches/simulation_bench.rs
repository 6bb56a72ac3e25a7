//! Criterion benchmarks for the simulation hot paths.
//!
//! Benchmarks:
//! 1. Level computation
//! 2. Full simulation over intraday bars (both directions)
//! 3. Single-step throughput on a live-style context

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sq9_core::data::{generate_synthetic_bars, Interval};
use sq9_core::{run_simulation, BarContext, Direction, LevelSet, SessionConfig, Simulation, TradeMode};

fn bench_levels(c: &mut Criterion) {
    c.bench_function("level_set_compute", |b| {
        b.iter(|| LevelSet::compute(black_box(2_456.75)))
    });
}

fn bench_simulation(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let bars = generate_synthetic_bars("BENCH", Interval::Minute5, start, end);

    let mut group = c.benchmark_group("run_simulation");
    for direction in [Direction::Long, Direction::Short] {
        let cfg = SessionConfig::new("BENCH", direction, TradeMode::Intraday);
        group.bench_with_input(BenchmarkId::from_parameter(direction), &cfg, |b, cfg| {
            b.iter(|| run_simulation(cfg.clone(), black_box(&bars)))
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let bars = generate_synthetic_bars("STEP", Interval::Minute1, start, end);
    let cfg = SessionConfig::new("STEP", Direction::Long, TradeMode::Swing);

    c.bench_function("simulation_step_1m_month", |b| {
        b.iter(|| {
            let Ok(mut sim) = Simulation::new(cfg.clone()) else {
                return;
            };
            for bar in &bars {
                let _ = sim.step(black_box(bar), BarContext::new(false));
            }
        })
    });
}

criterion_group!(benches, bench_levels, bench_simulation, bench_step);
criterion_main!(benches);
