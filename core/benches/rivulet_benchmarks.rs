use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rivulet::Pipeline;

// --- Benchmark Functions ---

// The classic sequential-vs-parallel comparison: square every element and
// fold the results. Cloning the source is part of each measured iteration
// because a pipeline is consumed exactly once.
fn bench_square_and_sum(c: &mut Criterion) {
  let mut group = c.benchmark_group("SquareAndSum");

  for size in [1_000usize, 100_000] {
    let data: Vec<u64> = (0..size as u64).collect();
    group.throughput(Throughput::Elements(size as u64));

    group.bench_with_input(BenchmarkId::new("sequential", size), &data, |b, data| {
      b.iter(|| {
        Pipeline::from_vec(data.clone())
          .map(|v| v * v)
          .unwrap()
          .reduce(|a, b| a.wrapping_add(b))
          .unwrap()
      })
    });

    group.bench_with_input(BenchmarkId::new("parallel", size), &data, |b, data| {
      b.iter(|| {
        Pipeline::from_vec(data.clone())
          .parallel()
          .unwrap()
          .map(|v| v * v)
          .unwrap()
          .reduce(|a, b| a.wrapping_add(b))
          .unwrap()
      })
    });
  }

  group.finish();
}

fn bench_filter_sort_collect(c: &mut Criterion) {
  let mut group = c.benchmark_group("FilterSortCollect");

  for size in [1_000usize, 100_000] {
    // interleaved ascending/descending runs so the sort has real work
    let data: Vec<i64> = (0..size as i64).map(|v| if v % 2 == 0 { -v } else { v }).collect();
    group.throughput(Throughput::Elements(size as u64));

    group.bench_with_input(BenchmarkId::new("sequential", size), &data, |b, data| {
      b.iter(|| {
        Pipeline::from_vec(data.clone())
          .filter(|v| v % 3 != 0)
          .unwrap()
          .sorted()
          .unwrap()
          .to_vec()
          .unwrap()
      })
    });

    group.bench_with_input(BenchmarkId::new("parallel", size), &data, |b, data| {
      b.iter(|| {
        Pipeline::from_vec(data.clone())
          .parallel()
          .unwrap()
          .filter(|v| v % 3 != 0)
          .unwrap()
          .sorted()
          .unwrap()
          .to_vec()
          .unwrap()
      })
    });
  }

  group.finish();
}

fn bench_short_circuit_any_match(c: &mut Criterion) {
  let mut group = c.benchmark_group("ShortCircuitAnyMatch");

  let data: Vec<u64> = (0..1_000_000).collect();
  group.bench_function("needle_near_front", |b| {
    b.iter(|| {
      Pipeline::from_vec(data.clone())
        .map(|v| v + 1)
        .unwrap()
        .any_match(|v| *v > 100)
        .unwrap()
    })
  });

  group.finish();
}

criterion_group!(
  benches,
  bench_square_and_sum,
  bench_filter_sort_collect,
  bench_short_circuit_any_match
);
criterion_main!(benches);
