// tests/stage_chain_tests.rs
mod common; // Reference the common module

use common::*;
use rivulet::{Pipeline, RivuletResult};
use std::sync::atomic::Ordering;

#[test]
fn test_filter_map_sort_chain() -> RivuletResult<()> {
  setup_tracing();
  let result = Pipeline::from_vec(chain_numbers())
    .filter(|v| *v >= 3)?
    .map(|v| -v)?
    .sorted()?
    .to_vec()?;

  assert_eq!(result, vec![-7, -5, -4]);
  Ok(())
}

#[test]
fn test_from_nested_flattens_one_level_in_order() -> RivuletResult<()> {
  setup_tracing();
  let result = Pipeline::from_nested(nested_words()).to_vec()?;

  assert_eq!(result, vec!["I", "Love", "Java", "Concepts", "are", "fun"]);
  Ok(())
}

#[test]
fn test_flat_map_expands_each_element_depth_one() -> RivuletResult<()> {
  setup_tracing();
  let result = Pipeline::from_vec(vec![1, 2, 3]).flat_map(|v| vec![v, v * 10])?.to_vec()?;

  assert_eq!(result, vec![1, 10, 2, 20, 3, 30]);
  Ok(())
}

#[test]
fn test_flat_map_may_drop_elements() -> RivuletResult<()> {
  setup_tracing();
  // an empty expansion removes the element entirely
  let result = Pipeline::from_vec(vec![1, 2, 3, 4])
    .flat_map(|v| if v % 2 == 0 { vec![v] } else { Vec::new() })?
    .to_vec()?;

  assert_eq!(result, vec![2, 4]);
  Ok(())
}

#[test]
fn test_distinct_keeps_first_occurrence() -> RivuletResult<()> {
  setup_tracing();
  let result = Pipeline::from_vec(vec![1, 2, 4, 1, 5, 3, 2]).distinct()?.to_vec()?;

  assert_eq!(result, vec![1, 2, 4, 5, 3]);
  Ok(())
}

#[test]
fn test_distinct_is_idempotent() -> RivuletResult<()> {
  setup_tracing();
  let once = Pipeline::from_vec(vec![1, 2, 4, 1, 5, 3, 2]).distinct()?.to_vec()?;
  let twice = Pipeline::from_vec(vec![1, 2, 4, 1, 5, 3, 2])
    .distinct()?
    .distinct()?
    .to_vec()?;

  assert_eq!(once, twice);
  Ok(())
}

#[test]
fn test_sorted_natural_and_comparator_orders() -> RivuletResult<()> {
  setup_tracing();
  let ascending = Pipeline::from_vec(vec![1, 2, 4, 1, 5, 3, 2]).sorted()?.to_vec()?;
  assert_eq!(ascending, vec![1, 1, 2, 2, 3, 4, 5]);

  let descending = Pipeline::from_vec(vec![1, 2, 4, 1, 5, 3, 2])
    .sorted_by(|a, b| b.cmp(a))?
    .to_vec()?;
  assert_eq!(descending, vec![5, 4, 3, 2, 2, 1, 1]);
  Ok(())
}

#[test]
fn test_sorted_is_stable_and_idempotent() -> RivuletResult<()> {
  setup_tracing();
  // compare by key only; the tag records encounter order
  let items = vec![(2, "a"), (1, "b"), (2, "c"), (1, "d")];
  let by_key = |a: &(i32, &str), b: &(i32, &str)| a.0.cmp(&b.0);

  let sorted_once = Pipeline::from_vec(items).sorted_by(by_key)?.to_vec()?;
  assert_eq!(sorted_once, vec![(1, "b"), (1, "d"), (2, "a"), (2, "c")]);

  // sorting an already-sorted sequence must reproduce it exactly,
  // including the relative order of equal-key elements
  let sorted_twice = Pipeline::from_vec(sorted_once.clone()).sorted_by(by_key)?.to_vec()?;
  assert_eq!(sorted_twice, sorted_once);
  Ok(())
}

#[test]
fn test_skip_then_limit() -> RivuletResult<()> {
  setup_tracing();
  let result = Pipeline::from_iter(1..=10).skip(2)?.limit(3)?.to_vec()?;

  assert_eq!(result, vec![3, 4, 5]);
  Ok(())
}

#[test]
fn test_stages_are_lazy_until_a_terminal_runs() -> RivuletResult<()> {
  setup_tracing();
  let observed = shared_counter();
  let tap = observed.clone();

  let mut pipeline = Pipeline::from_vec(terminal_numbers())
    .peek(move |_| {
      tap.fetch_add(1, Ordering::SeqCst);
    })?
    .map(|v| v * 2)?;

  // nothing has flowed yet: stage appends defer everything
  assert_eq!(observed.load(Ordering::SeqCst), 0);
  assert_eq!(pipeline.stage_count(), Some(2));

  let total = pipeline.count()?;
  assert_eq!(total, 6);
  assert_eq!(observed.load(Ordering::SeqCst), 6);
  Ok(())
}

#[test]
fn test_limit_stops_pulling_from_the_source() -> RivuletResult<()> {
  setup_tracing();
  let pulled = shared_counter();
  let tap = pulled.clone();

  let result = Pipeline::from_iter(0..100)
    .peek(move |_| {
      tap.fetch_add(1, Ordering::SeqCst);
    })?
    .limit(3)?
    .to_vec()?;

  assert_eq!(result, vec![0, 1, 2]);
  // elements 0..=2 passed; element 3 was pulled, hit the cap, and stopped
  // the source — the remaining 96 were never touched
  assert_eq!(pulled.load(Ordering::SeqCst), 4);
  Ok(())
}

#[test]
fn test_peek_observes_elements_between_stages() -> RivuletResult<()> {
  setup_tracing();
  let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
  let tap = seen.clone();

  let result = Pipeline::from_vec(chain_numbers())
    .filter(|v| *v >= 3)?
    .peek(move |v| tap.lock().push(*v))?
    .map(|v| -v)?
    .to_vec()?;

  assert_eq!(result, vec![-4, -7, -5]);
  assert_eq!(*seen.lock(), vec![4, 7, 5]);
  Ok(())
}
