// tests/error_handling_tests.rs
mod common; // Reference the common module

use common::*;
use rivulet::{Pipeline, RivuletError, RivuletResult, StageKind};
use std::sync::atomic::Ordering;

#[test]
fn test_try_filter_failure_surfaces_as_stage_failure() -> RivuletResult<()> {
  setup_tracing();
  let outcome = Pipeline::from_vec(terminal_numbers())
    .try_filter(|v| {
      if *v == 5 {
        anyhow::bail!("predicate cannot rank {v}");
      }
      Ok(*v > 3)
    })?
    .to_vec();

  match outcome {
    Err(RivuletError::StageFailure { stage, source }) => {
      assert_eq!(stage, StageKind::Filter);
      assert!(source.to_string().contains("cannot rank 5"));
    }
    other => panic!("expected StageFailure, got {other:?}"),
  }
  Ok(())
}

#[test]
fn test_stage_failure_aborts_remaining_evaluation() -> RivuletResult<()> {
  setup_tracing();
  let pulled = shared_counter();
  let tap = pulled.clone();

  let outcome = Pipeline::from_vec(vec![1, 2, 3, 4])
    .peek(move |_| {
      tap.fetch_add(1, Ordering::SeqCst);
    })?
    .try_map(|v| {
      if v == 2 {
        anyhow::bail!("boom");
      }
      Ok(v)
    })?
    .to_vec();

  assert!(outcome.is_err());
  // element 1 passed, element 2 failed; 3 and 4 were never pulled
  assert_eq!(pulled.load(Ordering::SeqCst), 2);
  Ok(())
}

#[test]
fn test_try_flat_map_failure() -> RivuletResult<()> {
  setup_tracing();
  let outcome = Pipeline::from_vec(vec![1, 2, 3])
    .try_flat_map(|v| {
      if v == 3 {
        anyhow::bail!("no expansion for {v}");
      }
      Ok(vec![v, v])
    })?
    .to_vec();

  match outcome {
    Err(RivuletError::StageFailure { stage, .. }) => assert_eq!(stage, StageKind::FlatMap),
    other => panic!("expected StageFailure, got {other:?}"),
  }
  Ok(())
}

#[test]
fn test_error_display_names_the_stage() {
  setup_tracing();
  let err = RivuletError::StageFailure {
    stage: StageKind::Map,
    source: anyhow::anyhow!("overflow"),
  };
  let rendered = err.to_string();
  assert!(rendered.contains("map"));
  assert!(rendered.contains("overflow"));

  let err = RivuletError::AlreadyConsumed { operation: "reduce" };
  assert!(err.to_string().contains("reduce"));
}

#[test]
fn test_errors_reach_the_terminal_caller_directly() -> RivuletResult<()> {
  setup_tracing();
  // a failure upstream of a sort barrier must not be swallowed by buffering
  let outcome = Pipeline::from_vec(vec![3, 1, 2])
    .try_map(|v| if v == 1 { anyhow::bail!("bad") } else { Ok(v) })?
    .sorted()?
    .to_vec();

  assert!(matches!(outcome, Err(RivuletError::StageFailure { .. })));
  Ok(())
}
