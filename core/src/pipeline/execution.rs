// rivulet/src/pipeline/execution.rs

//! Contains the terminal operations and the sequential evaluator. A terminal
//! consumes the pipeline exactly once, pulling elements one at a time through
//! the full ordered stage chain (buffering only across sort barriers) and
//! short-circuiting where its semantics allow.

use crate::core::mode::ExecutionMode;
use crate::core::sequence::Sequence;
use crate::core::stage::{SharedComparator, Stage, StageOp};
use crate::error::{RivuletError, RivuletResult};
use crate::pipeline::definition::{Pipeline, PipelineState};
use crate::pipeline::parallel;
use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tracing::{event, instrument, Level};

/// Everything a terminal needs, taken out of the pipeline in one move.
pub(crate) struct Evaluation<T> {
  pub(crate) sequence: Sequence<T>,
  pub(crate) stages: Vec<Stage<T>>,
  pub(crate) mode: ExecutionMode,
}

impl<T: Send + 'static> Pipeline<T> {
  /// Flips the pipeline to consumed and hands back its parts, or reports
  /// that a terminal already ran. The flip happens before evaluation, so a
  /// failed evaluation still leaves the pipeline dead.
  fn consume(&mut self, operation: &'static str) -> RivuletResult<Evaluation<T>> {
    match std::mem::replace(&mut self.state, PipelineState::Consumed) {
      PipelineState::Open { sequence, stages, mode } => {
        event!(
          Level::DEBUG,
          operation,
          num_stages = stages.len(),
          mode = ?mode,
          "Terminal operation starting."
        );
        Ok(Evaluation { sequence, stages, mode })
      }
      PipelineState::Consumed => {
        event!(Level::ERROR, operation, "Terminal operation on a consumed pipeline.");
        Err(RivuletError::AlreadyConsumed { operation })
      }
    }
  }

  // --- Terminal operations ---

  /// Applies `action` to every surviving element, exhausting the sequence.
  ///
  /// Under parallel evaluation the order in which elements from different
  /// partitions reach `action` is unspecified.
  pub fn for_each(&mut self, mut action: impl FnMut(T)) -> RivuletResult<()> {
    let evaluation = self.consume("for_each")?;
    match evaluation.mode {
      ExecutionMode::Sequential => drive(evaluation.sequence, &evaluation.stages, &mut |item| {
        action(item);
        ControlFlow::Continue(())
      }),
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        for item in chunks.into_iter().flatten() {
          action(item);
        }
        Ok(())
      }
    }
  }

  /// Materializes all surviving elements, preserving stage-chain order, into
  /// a vector.
  #[instrument(
        name = "Pipeline::to_vec",
        skip_all,
        fields(element_type = %std::any::type_name::<T>()),
        err(Display)
    )]
  pub fn to_vec(&mut self) -> RivuletResult<Vec<T>> {
    let evaluation = self.consume("to_vec")?;
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut out = Vec::new();
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          out.push(item);
          ControlFlow::Continue(())
        })?;
        Ok(out)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        Ok(chunks.into_iter().flatten().collect())
      }
    }
  }

  /// Left-associative seedless fold over the surviving elements. Yields
  /// `Ok(None)` when nothing survives; that is an explicit no-value result,
  /// not an error.
  ///
  /// Under parallel evaluation chunk-local folds are combined across chunks;
  /// `op` must be associative or the numeric result is unspecified (by
  /// contract, not as an implementation bug).
  #[instrument(
        name = "Pipeline::reduce",
        skip_all,
        fields(element_type = %std::any::type_name::<T>()),
        err(Display)
    )]
  pub fn reduce(&mut self, mut op: impl FnMut(T, T) -> T) -> RivuletResult<Option<T>> {
    let evaluation = self.consume("reduce")?;
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut acc: Option<T> = None;
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          acc = Some(match acc.take() {
            None => item,
            Some(folded) => op(folded, item),
          });
          ControlFlow::Continue(())
        })?;
        Ok(acc)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        let mut acc: Option<T> = None;
        for chunk in chunks {
          let chunk_fold = chunk.into_iter().reduce(&mut op);
          acc = match (acc, chunk_fold) {
            (Some(folded), Some(local)) => Some(op(folded, local)),
            (folded, None) => folded,
            (None, local) => local,
          };
        }
        Ok(acc)
      }
    }
  }

  /// Number of surviving elements.
  pub fn count(&mut self) -> RivuletResult<usize> {
    let evaluation = self.consume("count")?;
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut total = 0usize;
        drive(evaluation.sequence, &evaluation.stages, &mut |_| {
          total += 1;
          ControlFlow::Continue(())
        })?;
        Ok(total)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        Ok(chunks.iter().map(Vec::len).sum())
      }
    }
  }

  /// The minimal element by `comparator`, or `Ok(None)` when nothing
  /// survives. Stable with respect to first occurrence on ties.
  pub fn min_by(&mut self, mut comparator: impl FnMut(&T, &T) -> Ordering) -> RivuletResult<Option<T>> {
    let evaluation = self.consume("min_by")?;
    // replace only on a strictly smaller element, so ties keep the earliest
    Self::extremal(evaluation, move |candidate, best| {
      comparator(candidate, best) == Ordering::Less
    })
  }

  /// The maximal element by `comparator`, or `Ok(None)` when nothing
  /// survives. Stable with respect to first occurrence on ties.
  pub fn max_by(&mut self, mut comparator: impl FnMut(&T, &T) -> Ordering) -> RivuletResult<Option<T>> {
    let evaluation = self.consume("max_by")?;
    Self::extremal(evaluation, move |candidate, best| {
      comparator(candidate, best) == Ordering::Greater
    })
  }

  /// The minimal element by natural order.
  pub fn min(&mut self) -> RivuletResult<Option<T>>
  where
    T: Ord,
  {
    let evaluation = self.consume("min")?;
    Self::extremal(evaluation, |candidate, best| candidate.cmp(best) == Ordering::Less)
  }

  /// The maximal element by natural order.
  pub fn max(&mut self) -> RivuletResult<Option<T>>
  where
    T: Ord,
  {
    let evaluation = self.consume("max")?;
    Self::extremal(evaluation, |candidate, best| candidate.cmp(best) == Ordering::Greater)
  }

  fn extremal(evaluation: Evaluation<T>, mut replaces: impl FnMut(&T, &T) -> bool) -> RivuletResult<Option<T>> {
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut best: Option<T> = None;
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          best = Some(match best.take() {
            None => item,
            Some(current) => {
              if replaces(&item, &current) {
                item
              } else {
                current
              }
            }
          });
          ControlFlow::Continue(())
        })?;
        Ok(best)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        let mut best: Option<T> = None;
        // chunk order is source order, so earliest occurrence wins ties
        for item in chunks.into_iter().flatten() {
          best = Some(match best.take() {
            None => item,
            Some(current) => {
              if replaces(&item, &current) {
                item
              } else {
                current
              }
            }
          });
        }
        Ok(best)
      }
    }
  }

  /// True if any surviving element satisfies `predicate`. The sequential
  /// evaluator stops pulling as soon as the answer is known.
  pub fn any_match(&mut self, mut predicate: impl FnMut(&T) -> bool) -> RivuletResult<bool> {
    let evaluation = self.consume("any_match")?;
    Self::matched(evaluation, &mut predicate)
  }

  /// True if every surviving element satisfies `predicate`; vacuously true
  /// on an empty yield. Short-circuits on the first counterexample.
  pub fn all_match(&mut self, mut predicate: impl FnMut(&T) -> bool) -> RivuletResult<bool> {
    let evaluation = self.consume("all_match")?;
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut holds = true;
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          if predicate(&item) {
            ControlFlow::Continue(())
          } else {
            holds = false;
            ControlFlow::Break(())
          }
        })?;
        Ok(holds)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        Ok(chunks.into_iter().flatten().all(|item| predicate(&item)))
      }
    }
  }

  /// True if no surviving element satisfies `predicate`. Short-circuits on
  /// the first witness.
  pub fn none_match(&mut self, mut predicate: impl FnMut(&T) -> bool) -> RivuletResult<bool> {
    let evaluation = self.consume("none_match")?;
    Ok(!Self::matched(evaluation, &mut predicate)?)
  }

  /// Scans for a witness element, short-circuiting on the first hit.
  fn matched<P: FnMut(&T) -> bool>(evaluation: Evaluation<T>, predicate: &mut P) -> RivuletResult<bool> {
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut found = false;
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          if predicate(&item) {
            found = true;
            ControlFlow::Break(())
          } else {
            ControlFlow::Continue(())
          }
        })?;
        Ok(found)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        Ok(chunks.into_iter().flatten().any(|item| predicate(&item)))
      }
    }
  }

  /// The first surviving element in encounter order, or `Ok(None)` when
  /// nothing survives. Short-circuits immediately.
  pub fn find_first(&mut self) -> RivuletResult<Option<T>> {
    let evaluation = self.consume("find_first")?;
    match evaluation.mode {
      ExecutionMode::Sequential => {
        let mut first: Option<T> = None;
        drive(evaluation.sequence, &evaluation.stages, &mut |item| {
          first = Some(item);
          ControlFlow::Break(())
        })?;
        Ok(first)
      }
      ExecutionMode::Parallel { workers } => {
        let chunks = parallel::evaluate(evaluation.sequence, &evaluation.stages, workers)?;
        Ok(chunks.into_iter().flatten().next())
      }
    }
  }
}

// --- Sequential engine ---

/// One run of elementwise stages, optionally ending at a sort barrier.
struct Phase<'a, T> {
  ops: &'a [Stage<T>],
  sort: Option<&'a SharedComparator<T>>,
}

/// Splits the chain at its sort stages. Every phase before the last ends in
/// a sort barrier; the trailing phase streams straight into the terminal.
fn split_phases<T>(stages: &[Stage<T>]) -> Vec<Phase<'_, T>> {
  let mut phases = Vec::new();
  let mut start = 0;
  for (index, stage) in stages.iter().enumerate() {
    if let StageOp::Sort(comparator) = &stage.op {
      phases.push(Phase {
        ops: &stages[start..index],
        sort: Some(comparator),
      });
      start = index + 1;
    }
  }
  phases.push(Phase {
    ops: &stages[start..],
    sort: None,
  });
  phases
}

/// Pulls elements one at a time through the full ordered stage chain into
/// `sink`. The sink answers `Break` to stop evaluation early (short-circuit
/// terminals); a sort barrier buffers, sorts, then resumes per-element flow.
pub(crate) fn drive<T>(
  sequence: Sequence<T>,
  stages: &[Stage<T>],
  sink: &mut dyn FnMut(T) -> ControlFlow<()>,
) -> RivuletResult<()> {
  let phases = split_phases(stages);
  drive_phases(sequence, &phases, sink).map(|_| ())
}

fn drive_phases<T, I>(
  items: I,
  phases: &[Phase<'_, T>],
  sink: &mut dyn FnMut(T) -> ControlFlow<()>,
) -> RivuletResult<ControlFlow<()>>
where
  I: IntoIterator<Item = T>,
{
  let Some((phase, rest)) = phases.split_first() else {
    // split_phases always emits a trailing phase
    return Ok(ControlFlow::Continue(()));
  };

  match phase.sort {
    Some(comparator) => {
      // Hard synchronization point: a sort cannot be lazy per-element, so
      // every upstream survivor is buffered before anything flows on.
      let mut buffer = Vec::new();
      for item in items {
        let flow = apply_ops(phase.ops, item, &mut |sorted_input| {
          buffer.push(sorted_input);
          ControlFlow::Continue(())
        })?;
        if flow.is_break() {
          break;
        }
      }
      buffer.sort_by(|a, b| (**comparator)(a, b));
      event!(Level::TRACE, buffered = buffer.len(), "Sort barrier released.");
      drive_phases(buffer, rest, sink)
    }
    None => {
      for item in items {
        if apply_ops(phase.ops, item, sink)?.is_break() {
          return Ok(ControlFlow::Break(()));
        }
      }
      Ok(ControlFlow::Continue(()))
    }
  }
}

/// Feeds one element through the elementwise stages in order, delivering the
/// survivors (possibly zero, possibly several for flat_map) to `sink`.
/// `Break` propagates upstream both from the sink and from an exhausted
/// limit stage.
pub(crate) fn apply_ops<T>(
  ops: &[Stage<T>],
  item: T,
  sink: &mut dyn FnMut(T) -> ControlFlow<()>,
) -> RivuletResult<ControlFlow<()>> {
  let Some((stage, rest)) = ops.split_first() else {
    return Ok(sink(item));
  };

  match &stage.op {
    StageOp::Filter(predicate) => {
      let keep = (*predicate.lock())(&item).map_err(|source| RivuletError::StageFailure {
        stage: stage.kind(),
        source,
      })?;
      if keep {
        apply_ops(rest, item, sink)
      } else {
        Ok(ControlFlow::Continue(()))
      }
    }
    StageOp::Map(mapper) => {
      let mapped = (*mapper.lock())(item).map_err(|source| RivuletError::StageFailure {
        stage: stage.kind(),
        source,
      })?;
      apply_ops(rest, mapped, sink)
    }
    StageOp::FlatMap(expander) => {
      let expanded = (*expander.lock())(item).map_err(|source| RivuletError::StageFailure {
        stage: stage.kind(),
        source,
      })?;
      for sub in expanded {
        if apply_ops(rest, sub, sink)?.is_break() {
          return Ok(ControlFlow::Break(()));
        }
      }
      Ok(ControlFlow::Continue(()))
    }
    StageOp::Peek(tap) => {
      (*tap.lock())(&item);
      apply_ops(rest, item, sink)
    }
    StageOp::Skip(remaining) => {
      if claim(remaining) {
        Ok(ControlFlow::Continue(()))
      } else {
        apply_ops(rest, item, sink)
      }
    }
    StageOp::Limit(remaining) => {
      if claim(remaining) {
        apply_ops(rest, item, sink)
      } else {
        // cap reached: nothing downstream can ever see another element
        Ok(ControlFlow::Break(()))
      }
    }
    StageOp::Sort(_) => unreachable!("sort stages are phase barriers, split out before element flow"),
  }
}

fn claim(remaining: &AtomicUsize) -> bool {
  remaining
    .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |n| n.checked_sub(1))
    .is_ok()
}
