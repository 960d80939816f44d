// rivulet_core/examples/parallel_evaluation.rs

use rivulet::{Pipeline, RivuletError};
use tracing::info;

fn main() -> Result<(), RivuletError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Parallel Evaluation Example ---");

  let source: Vec<u64> = (1..=1_000_000).collect();

  // Sequential: one thread, elements pulled one at a time.
  let started = std::time::Instant::now();
  let sequential_sum = Pipeline::from_vec(source.clone())
    .map(|v| v * v)?
    .reduce(|a, b| a.wrapping_add(b))?;
  info!("sequential: sum = {sequential_sum:?}, took {:?}", started.elapsed());

  // Parallel: the source is partitioned into contiguous chunks, each chunk
  // processed by its own scoped worker; chunk-local folds are combined in
  // chunk order. The combining operator must be associative.
  let started = std::time::Instant::now();
  let parallel_sum = Pipeline::from_vec(source)
    .parallel()?
    .map(|v| v * v)?
    .reduce(|a, b| a.wrapping_add(b))?;
  info!("parallel:   sum = {parallel_sum:?}, took {:?}", started.elapsed());

  assert_eq!(sequential_sum, parallel_sum);

  // Side effects inside worker partitions carry no cross-partition ordering
  // guarantee: the tap below may fire out of source order.
  Pipeline::from_iter(0..8u32)
    .parallel_with(4)?
    .peek(|v| info!("worker saw {v}"))?
    .for_each(|_| {})?;

  Ok(())
}
