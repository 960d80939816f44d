// rivulet/src/pipeline/parallel.rs

//! The parallel evaluator: partitions the source into contiguous chunks,
//! applies elementwise stages independently per chunk on scoped worker
//! threads, and gathers chunk outputs under a mutex with an ordered join.
//! Behavior closures are shared behind mutexes, so a distinct stage keeps
//! its global dedup across partitions; side-effect ordering across
//! partitions is user-visible non-determinism.
//!
//! Sort, skip and limit are barriers, not elementwise work. A sort is
//! evaluated as parallel-partition-then-merge: each worker stable-sorts its
//! own chunk output, then the chunks are merged with the same comparator,
//! preferring the earlier chunk on ties. Skip and limit are applied at an
//! ordered join of the chunk outputs, so the survivors are exactly the
//! encounter-order suffix (or prefix) that sequential evaluation keeps.
//! After a barrier the ordered survivors are re-partitioned for the stages
//! past it.
//!
//! Failure policy: if any partition's evaluation fails, the whole run fails
//! and partial results are discarded. No partial-success reporting.

use crate::core::sequence::Sequence;
use crate::core::stage::{SharedComparator, Stage, StageOp};
use crate::error::RivuletResult;
use crate::pipeline::execution::apply_ops;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::thread;
use tracing::{event, span, Level};

/// One parallel execution step: a chunked run of elementwise stages
/// (optionally ending in chunk-local sorts) or a whole-sequence barrier.
enum Step<'a, T> {
  Run {
    ops: &'a [Stage<T>],
    sort: Option<&'a SharedComparator<T>>,
  },
  Skip(usize),
  Limit(usize),
}

/// Runs the whole stage chain over the materialized source and returns the
/// surviving elements, partitioned by chunk, in chunk (source) order.
pub(crate) fn evaluate<T: Send>(
  sequence: Sequence<T>,
  stages: &[Stage<T>],
  workers: usize,
) -> RivuletResult<Vec<Vec<T>>> {
  let items: Vec<T> = sequence.collect();
  event!(
    Level::DEBUG,
    workers,
    total_items = items.len(),
    num_stages = stages.len(),
    "Parallel evaluation starting."
  );

  let mut chunks = partition(items, workers);
  for step in split_steps(stages) {
    match step {
      Step::Run { ops, sort: None } if ops.is_empty() => {}
      Step::Run { ops, sort } => {
        chunks = run_segment(chunks, ops, sort)?;
        if let Some(comparator) = sort {
          // workers sorted their own chunks; merge them into one ordered run
          let merged = merge_sorted(chunks, comparator);
          chunks = partition(merged, workers);
        }
      }
      Step::Skip(count) => {
        let survivors: Vec<T> = chunks.into_iter().flatten().skip(count).collect();
        chunks = partition(survivors, workers);
      }
      Step::Limit(count) => {
        let survivors: Vec<T> = chunks.into_iter().flatten().take(count).collect();
        chunks = partition(survivors, workers);
      }
    }
  }
  Ok(chunks)
}

/// Splits the chain at its barriers. Skip and limit counts are read once
/// here; their shared counters are only decremented by the sequential
/// engine, never by parallel workers.
fn split_steps<T>(stages: &[Stage<T>]) -> Vec<Step<'_, T>> {
  let mut steps = Vec::new();
  let mut start = 0;
  for (index, stage) in stages.iter().enumerate() {
    let barrier = match &stage.op {
      StageOp::Sort(comparator) => {
        steps.push(Step::Run {
          ops: &stages[start..index],
          sort: Some(comparator),
        });
        true
      }
      StageOp::Skip(remaining) => {
        steps.push(Step::Run {
          ops: &stages[start..index],
          sort: None,
        });
        steps.push(Step::Skip(remaining.load(AtomicOrdering::Acquire)));
        true
      }
      StageOp::Limit(remaining) => {
        steps.push(Step::Run {
          ops: &stages[start..index],
          sort: None,
        });
        steps.push(Step::Limit(remaining.load(AtomicOrdering::Acquire)));
        true
      }
      _ => false,
    };
    if barrier {
      start = index + 1;
    }
  }
  steps.push(Step::Run {
    ops: &stages[start..],
    sort: None,
  });
  steps
}

/// Splits the items into at most `workers` contiguous chunks of near-equal
/// size. Deterministic partitioning is not a contract, just the simplest
/// scheme that keeps encounter order within and across chunks.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
  if items.is_empty() {
    return Vec::new();
  }
  let chunk_size = items.len().div_ceil(workers.max(1));
  let mut chunks = Vec::new();
  let mut remaining = items.into_iter();
  loop {
    let chunk: Vec<T> = remaining.by_ref().take(chunk_size).collect();
    if chunk.is_empty() {
      break;
    }
    chunks.push(chunk);
  }
  chunks
}

/// One scoped worker thread per chunk; outcomes are gathered under a mutex
/// and re-ordered by chunk index before the join result is assembled.
fn run_segment<T: Send>(
  chunks: Vec<Vec<T>>,
  ops: &[Stage<T>],
  sort: Option<&SharedComparator<T>>,
) -> RivuletResult<Vec<Vec<T>>> {
  let gathered: Mutex<Vec<(usize, RivuletResult<Vec<T>>)>> = Mutex::new(Vec::with_capacity(chunks.len()));

  thread::scope(|scope| {
    for (chunk_index, chunk) in chunks.into_iter().enumerate() {
      let gathered = &gathered;
      scope.spawn(move || {
        let chunk_span = span!(Level::DEBUG, "chunk_evaluation", chunk_index, chunk_len = chunk.len());
        let _span_guard = chunk_span.enter();
        let outcome = process_chunk(chunk, ops, sort);
        if let Err(error) = &outcome {
          event!(Level::ERROR, chunk_index, error = %error, "Chunk evaluation failed.");
        }
        gathered.lock().push((chunk_index, outcome));
      });
    }
  });

  let mut gathered = gathered.into_inner();
  gathered.sort_by_key(|(chunk_index, _)| *chunk_index);
  // first failing chunk aborts the whole evaluation
  gathered.into_iter().map(|(_, outcome)| outcome).collect()
}

fn process_chunk<T>(chunk: Vec<T>, ops: &[Stage<T>], sort: Option<&SharedComparator<T>>) -> RivuletResult<Vec<T>> {
  let mut survivors = Vec::new();
  for item in chunk {
    let flow = apply_ops(ops, item, &mut |survivor| {
      survivors.push(survivor);
      ControlFlow::Continue(())
    })?;
    if flow.is_break() {
      break;
    }
  }
  if let Some(comparator) = sort {
    survivors.sort_by(|a, b| (**comparator)(a, b));
  }
  Ok(survivors)
}

/// Stable k-way merge of individually sorted chunks, in chunk order. Ties
/// prefer the earlier chunk, so encounter order survives equal keys.
fn merge_sorted<T>(chunks: Vec<Vec<T>>, comparator: &SharedComparator<T>) -> Vec<T> {
  chunks
    .into_iter()
    .fold(Vec::new(), |merged, next| merge_two(merged, next, comparator))
}

fn merge_two<T>(left: Vec<T>, right: Vec<T>, comparator: &SharedComparator<T>) -> Vec<T> {
  let mut merged = Vec::with_capacity(left.len() + right.len());
  let mut left = left.into_iter().peekable();
  let mut right = right.into_iter().peekable();
  loop {
    match (left.peek(), right.peek()) {
      (Some(l), Some(r)) => {
        if (**comparator)(l, r) == Ordering::Greater {
          merged.extend(right.next());
        } else {
          merged.extend(left.next());
        }
      }
      _ => break,
    }
  }
  merged.extend(left);
  merged.extend(right);
  merged
}
