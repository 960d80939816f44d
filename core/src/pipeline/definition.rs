// rivulet/src/pipeline/definition.rs

//! Contains the `Pipeline<T>` struct definition and the builder-style stage
//! appends. Appending a stage evaluates nothing: each append records a
//! deferred operation descriptor and hands the pipeline back, so a chain is
//! constructed incrementally and only runs when a terminal operation
//! (see `execution.rs`) consumes it.

use crate::core::mode::ExecutionMode;
use crate::core::sequence::Sequence;
use crate::core::stage::{
  SharedExpander, SharedMapper, SharedPredicate, SharedTap, Stage, StageKind, StageOp,
};
use crate::error::{RivuletError, RivuletResult};
use anyhow::Error as AnyhowError;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::{event, Level};

/// The core pipeline type, generic over an element type `T`.
///
/// A pipeline owns exactly one [`Sequence`] and one ordered stage chain, and
/// transitions from open to consumed exactly once, when a terminal operation
/// runs. Any terminal invocation or stage append after that point fails with
/// [`RivuletError::AlreadyConsumed`].
///
/// `T` must be `Send + 'static`: the parallel evaluator moves chunks of the
/// source onto scoped worker threads.
pub struct Pipeline<T: Send + 'static> {
  pub(crate) state: PipelineState<T>,
}

pub(crate) enum PipelineState<T> {
  Open {
    sequence: Sequence<T>,
    /// Ordered list of deferred stage descriptors; insertion order defines
    /// execution order per element.
    stages: Vec<Stage<T>>,
    mode: ExecutionMode,
  },
  Consumed,
}

impl<T: Send + 'static> Pipeline<T> {
  /// Creates a new open pipeline over the given sequence, with an empty
  /// stage chain and sequential execution.
  pub fn new(sequence: Sequence<T>) -> Self {
    Pipeline {
      state: PipelineState::Open {
        sequence,
        stages: Vec::new(),
        mode: ExecutionMode::default(),
      },
    }
  }

  /// Wraps an owned vector as the pipeline source.
  pub fn from_vec(items: Vec<T>) -> Self {
    Self::new(Sequence::from_vec(items))
  }

  /// Wraps any collection that can be turned into an iterator.
  pub fn from_iter<I>(items: I) -> Self
  where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
  {
    Self::new(Sequence::from_iter(items))
  }

  /// Wraps a collection of collections, flattened one level deep with
  /// relative order preserved between and within sub-sequences.
  pub fn from_nested<I, J>(nested: I) -> Self
  where
    I: IntoIterator<Item = J>,
    I::IntoIter: Send + 'static,
    J: IntoIterator<Item = T>,
    J::IntoIter: Send + 'static,
  {
    Self::new(Sequence::from_nested(nested))
  }

  /// A pipeline over no elements.
  pub fn empty() -> Self {
    Self::new(Sequence::empty())
  }

  // --- Introspection ---

  /// True once a terminal operation has run (successfully or not).
  pub fn is_consumed(&self) -> bool {
    matches!(self.state, PipelineState::Consumed)
  }

  /// Number of stages appended so far; `None` once consumed.
  pub fn stage_count(&self) -> Option<usize> {
    match &self.state {
      PipelineState::Open { stages, .. } => Some(stages.len()),
      PipelineState::Consumed => None,
    }
  }

  /// The currently selected execution mode; `None` once consumed.
  pub fn mode(&self) -> Option<ExecutionMode> {
    match &self.state {
      PipelineState::Open { mode, .. } => Some(*mode),
      PipelineState::Consumed => None,
    }
  }

  // --- Stage appends (lazy composition) ---

  fn append(self, stage: Stage<T>) -> RivuletResult<Self> {
    match self.state {
      PipelineState::Open { sequence, mut stages, mode } => {
        event!(Level::TRACE, stage = %stage.kind(), chain_len = stages.len() + 1, "Stage appended.");
        stages.push(stage);
        Ok(Pipeline {
          state: PipelineState::Open { sequence, stages, mode },
        })
      }
      PipelineState::Consumed => Err(RivuletError::AlreadyConsumed {
        operation: stage.kind().name(),
      }),
    }
  }

  /// Appends a filter stage: only elements for which `predicate` answers
  /// true survive.
  pub fn filter(self, mut predicate: impl FnMut(&T) -> bool + Send + 'static) -> RivuletResult<Self> {
    let shared: SharedPredicate<T> =
      Arc::new(Mutex::new(move |item: &T| -> Result<bool, AnyhowError> { Ok(predicate(item)) }));
    self.append(Stage::new(StageKind::Filter, StageOp::Filter(shared)))
  }

  /// Like [`filter`](Self::filter), but the predicate may fail; its error is
  /// surfaced as [`RivuletError::StageFailure`], aborting evaluation.
  pub fn try_filter(
    self,
    predicate: impl FnMut(&T) -> Result<bool, AnyhowError> + Send + 'static,
  ) -> RivuletResult<Self> {
    let shared: SharedPredicate<T> = Arc::new(Mutex::new(predicate));
    self.append(Stage::new(StageKind::Filter, StageOp::Filter(shared)))
  }

  /// Appends a map stage transforming each element.
  pub fn map(self, mut mapper: impl FnMut(T) -> T + Send + 'static) -> RivuletResult<Self> {
    let shared: SharedMapper<T> =
      Arc::new(Mutex::new(move |item: T| -> Result<T, AnyhowError> { Ok(mapper(item)) }));
    self.append(Stage::new(StageKind::Map, StageOp::Map(shared)))
  }

  /// Like [`map`](Self::map), but the mapper may fail.
  pub fn try_map(self, mapper: impl FnMut(T) -> Result<T, AnyhowError> + Send + 'static) -> RivuletResult<Self> {
    let shared: SharedMapper<T> = Arc::new(Mutex::new(mapper));
    self.append(Stage::new(StageKind::Map, StageOp::Map(shared)))
  }

  /// Appends a flatten stage: each element is replaced by zero or more
  /// output elements, depth-one (nested containers beyond one level are not
  /// recursed into). Relative order is preserved between and within the
  /// expansions.
  pub fn flat_map<I>(self, mut expander: impl FnMut(T) -> I + Send + 'static) -> RivuletResult<Self>
  where
    I: IntoIterator<Item = T>,
  {
    let shared: SharedExpander<T> = Arc::new(Mutex::new(move |item: T| -> Result<Vec<T>, AnyhowError> {
      Ok(expander(item).into_iter().collect())
    }));
    self.append(Stage::new(StageKind::FlatMap, StageOp::FlatMap(shared)))
  }

  /// Like [`flat_map`](Self::flat_map), but the expander may fail.
  pub fn try_flat_map(
    self,
    expander: impl FnMut(T) -> Result<Vec<T>, AnyhowError> + Send + 'static,
  ) -> RivuletResult<Self> {
    let shared: SharedExpander<T> = Arc::new(Mutex::new(expander));
    self.append(Stage::new(StageKind::FlatMap, StageOp::FlatMap(shared)))
  }

  /// Appends a dedup stage keeping the first occurrence of each element.
  /// Implemented as a stateful filter over a shared seen-set, so global
  /// dedup holds under parallel evaluation as well (which occurrence
  /// survives across chunk boundaries is unspecified there).
  pub fn distinct(self) -> RivuletResult<Self>
  where
    T: Clone + Eq + Hash,
  {
    let mut seen = HashSet::new();
    // insert() answers true on first occurrence
    let shared: SharedPredicate<T> = Arc::new(Mutex::new(move |item: &T| -> Result<bool, AnyhowError> {
      Ok(seen.insert(item.clone()))
    }));
    self.append(Stage::new(StageKind::Distinct, StageOp::Filter(shared)))
  }

  /// Appends a sort stage using the natural order of `T`.
  pub fn sorted(self) -> RivuletResult<Self>
  where
    T: Ord,
  {
    self.sorted_by(|a, b| a.cmp(b))
  }

  /// Appends a sort stage with an explicit comparator. The sort is stable:
  /// elements comparing equal keep their encounter order.
  ///
  /// A sort stage cannot be lazy per-element. It is a hard synchronization
  /// point: every upstream survivor is buffered, the buffer is sorted, and
  /// only then does per-element flow resume downstream. Taps placed around
  /// a sort observe buffer-then-emit order, never interleaved order.
  pub fn sorted_by(self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> RivuletResult<Self> {
    self.append(Stage::new(StageKind::Sort, StageOp::Sort(Arc::new(comparator))))
  }

  /// Appends a side-effect tap observing each surviving element. Under
  /// parallel evaluation taps run inside worker partitions with no ordering
  /// guarantee across partitions.
  pub fn peek(self, tap: impl FnMut(&T) + Send + 'static) -> RivuletResult<Self> {
    let shared: SharedTap<T> = Arc::new(Mutex::new(tap));
    self.append(Stage::new(StageKind::Peek, StageOp::Peek(shared)))
  }

  /// Truncates the sequence to the first `max_size` surviving elements in
  /// encounter order. Once the cap is reached the sequential evaluator stops
  /// pulling from the source; the parallel evaluator applies the cap at an
  /// ordered join of the chunk outputs, so both modes keep the same prefix.
  pub fn limit(self, max_size: usize) -> RivuletResult<Self> {
    self.append(Stage::new(
      StageKind::Limit,
      StageOp::Limit(Arc::new(AtomicUsize::new(max_size))),
    ))
  }

  /// Drops the first `count` surviving elements in encounter order, in both
  /// execution modes.
  pub fn skip(self, count: usize) -> RivuletResult<Self> {
    self.append(Stage::new(
      StageKind::Skip,
      StageOp::Skip(Arc::new(AtomicUsize::new(count))),
    ))
  }

  // --- Execution mode selection ---

  /// Selects parallel evaluation sized to the available hardware
  /// parallelism. The mode applies to the whole terminal evaluation; modes
  /// are never mixed mid-pipeline.
  pub fn parallel(self) -> RivuletResult<Self> {
    self.set_mode(ExecutionMode::parallel_detected(), "parallel")
  }

  /// Selects parallel evaluation with an explicit worker count.
  pub fn parallel_with(self, workers: usize) -> RivuletResult<Self> {
    if workers == 0 {
      return Err(RivuletError::Configuration {
        message: "parallel evaluation requires at least one worker".to_string(),
      });
    }
    self.set_mode(ExecutionMode::Parallel { workers }, "parallel_with")
  }

  /// Selects single-threaded pull-based evaluation (the default).
  pub fn sequential(self) -> RivuletResult<Self> {
    self.set_mode(ExecutionMode::Sequential, "sequential")
  }

  fn set_mode(self, new_mode: ExecutionMode, operation: &'static str) -> RivuletResult<Self> {
    match self.state {
      PipelineState::Open { sequence, stages, .. } => {
        event!(Level::DEBUG, mode = ?new_mode, "Execution mode selected.");
        Ok(Pipeline {
          state: PipelineState::Open {
            sequence,
            stages,
            mode: new_mode,
          },
        })
      }
      PipelineState::Consumed => Err(RivuletError::AlreadyConsumed { operation }),
    }
  }
}

impl<T: Send + 'static> std::fmt::Debug for Pipeline<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.state {
      PipelineState::Open { stages, mode, .. } => f
        .debug_struct("Pipeline")
        .field("state", &"open")
        .field("stages", stages)
        .field("mode", mode)
        .finish(),
      PipelineState::Consumed => f.debug_struct("Pipeline").field("state", &"consumed").finish(),
    }
  }
}
