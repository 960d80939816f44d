// rivulet_core/examples/basic_pipeline.rs

use rivulet::{Pipeline, RivuletError};
use tracing::info;

fn main() -> Result<(), RivuletError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 1. Chain deferred stages over an in-memory source. Nothing runs yet:
  //    each append records a descriptor and hands the pipeline back.
  let pipeline = Pipeline::from_vec(vec![2, 1, 4, 7, 5])
    .filter(|v| *v >= 3)?
    .peek(|v| info!("after filter: {v}"))?
    .map(|v| -v)?
    .peek(|v| info!("after negating: {v}"))?
    .sorted()?
    .peek(|v| info!("after sort: {v}"))?;

  // 2. A terminal operation consumes the pipeline exactly once.
  //    Note how the taps fire: the sort is a hard synchronization point,
  //    so "after sort" lines only appear once the buffer is released.
  let mut pipeline = pipeline;
  let collected = pipeline.to_vec()?;
  info!("collected: {collected:?}"); // [-7, -5, -4]

  // 3. A second terminal fails: the pipeline is dead.
  match pipeline.count() {
    Err(RivuletError::AlreadyConsumed { operation }) => {
      info!("as expected, `{operation}` was refused: pipeline already consumed");
    }
    other => info!("unexpected outcome: {other:?}"),
  }

  // 4. Flattening a nested source, one level deep, order preserved.
  let words = Pipeline::from_nested(vec![
    vec!["I", "Love", "Java"],
    vec!["Concepts", "are", "fun"],
  ])
  .to_vec()?;
  info!("flattened words: {words:?}");

  // 5. Scalar terminals return an explicit no-value sentinel when nothing
  //    survives filtering, never an error.
  let folded = Pipeline::from_vec(vec![1, 2, 3]).filter(|v| *v > 10)?.reduce(|a, b| a + b)?;
  info!("reduce over an empty yield: {folded:?}"); // None

  Ok(())
}
