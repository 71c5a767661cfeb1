//! Benchmarks for chart pattern scoring.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chartpat::prelude::*;

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<BarData> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let open = price;
    let close = price + change;
    let high = open.max(close) + volatility * 0.5;
    let low = open.min(close) - volatility * 0.5;
    let volume = 1000.0 + ((i * 11) % 500) as f64;

    bars.push(BarData {
      open,
      high,
      low,
      close,
      volume,
    });
    price = close;
  }

  bars
}

fn bench_single_pattern(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let scanner = PatternScanner::with_defaults();
  let ctx = MarketContext::default();

  let mut group = c.benchmark_group("single_pattern");
  for kind in PatternKind::ALL {
    group.bench_with_input(BenchmarkId::from_parameter(kind.name()), &kind, |b, &kind| {
      b.iter(|| scanner.detect(black_box(&bars), kind, &ctx, Timeframe::Daily));
    });
  }
  group.finish();
}

fn bench_full_scan(c: &mut Criterion) {
  let scanner = PatternScanner::with_defaults();
  let ctx = MarketContext::default();

  let mut group = c.benchmark_group("full_scan");
  for n in [100, 500, 1000] {
    let bars = generate_bars(n);
    group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
      b.iter(|| scanner.scan(black_box(bars), &ctx, Timeframe::Daily).unwrap());
    });
  }
  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let scanner = PatternScanner::with_defaults();
  let ctx = MarketContext::default();

  let series: Vec<(String, Vec<BarData>)> = (0..64)
    .map(|i| (format!("SYM{i}"), generate_bars(500 + i)))
    .collect();
  let instruments: Vec<(&str, &[BarData])> = series
    .iter()
    .map(|(symbol, bars)| (symbol.as_str(), bars.as_slice()))
    .collect();

  c.bench_function("scan_parallel_64_instruments", |b| {
    b.iter(|| {
      scan_parallel(
        &scanner,
        black_box(instruments.clone()),
        &ctx,
        Timeframe::Daily,
      )
    });
  });
}

fn bench_macd(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

  c.bench_function("macd_triple_1000", |b| {
    b.iter(|| macd_triple(black_box(&closes)));
  });
}

criterion_group!(
  benches,
  bench_single_pattern,
  bench_full_scan,
  bench_parallel_scan,
  bench_macd
);
criterion_main!(benches);
