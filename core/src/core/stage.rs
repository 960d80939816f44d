// rivulet/src/core/stage.rs

//! Defines the deferred stage descriptors accumulated by the pipeline
//! builder. A stage is immutable once appended; the chain is an ordered list
//! whose insertion order defines execution order per element.

use anyhow::Error as AnyhowError;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

// Type aliases for the shared stage closures.
// Behavior closures are FnMut (a distinct filter carries its seen-set, taps
// mutate captured state) and are shared behind a Mutex so the same chain can
// be driven from several parallel workers. Comparators are pure and shared
// without locking, since chunk-local sorts run concurrently.
pub type SharedPredicate<T> = Arc<Mutex<dyn FnMut(&T) -> Result<bool, AnyhowError> + Send>>;
pub type SharedMapper<T> = Arc<Mutex<dyn FnMut(T) -> Result<T, AnyhowError> + Send>>;
pub type SharedExpander<T> = Arc<Mutex<dyn FnMut(T) -> Result<Vec<T>, AnyhowError> + Send>>;
pub type SharedTap<T> = Arc<Mutex<dyn FnMut(&T) + Send>>;
pub type SharedComparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// The declared tag of a stage. Also used to label stage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
  Filter,
  Map,
  FlatMap,
  Distinct,
  Sort,
  Peek,
  Limit,
  Skip,
}

impl StageKind {
  pub fn name(self) -> &'static str {
    match self {
      StageKind::Filter => "filter",
      StageKind::Map => "map",
      StageKind::FlatMap => "flat_map",
      StageKind::Distinct => "distinct",
      StageKind::Sort => "sort",
      StageKind::Peek => "peek",
      StageKind::Limit => "limit",
      StageKind::Skip => "skip",
    }
  }
}

impl std::fmt::Display for StageKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// One deferred unary operation in the chain, tagged with its declared kind.
///
/// The kind and the behavior are kept separate: `distinct` is appended as a
/// stateful filter (a shared seen-set) but keeps its own tag for diagnostics.
pub struct Stage<T> {
  pub(crate) kind: StageKind,
  pub(crate) op: StageOp<T>,
}

pub(crate) enum StageOp<T> {
  /// Keeps the element when the predicate answers true.
  Filter(SharedPredicate<T>),
  /// Replaces the element with the mapped element.
  Map(SharedMapper<T>),
  /// Replaces one element with zero or more elements, depth-one.
  FlatMap(SharedExpander<T>),
  /// Observes the element without replacing it.
  Peek(SharedTap<T>),
  /// Full-buffer synchronization point: upstream survivors are collected,
  /// stable-sorted, then re-emitted one at a time downstream.
  Sort(SharedComparator<T>),
  /// Drops elements while the counter can be decremented. The parallel
  /// evaluator treats this as an ordered-join barrier instead, reading the
  /// count without decrementing it.
  Skip(Arc<AtomicUsize>),
  /// Passes elements while the counter can be decremented, then signals
  /// upstream exhaustion. Also an ordered-join barrier under parallel
  /// evaluation.
  Limit(Arc<AtomicUsize>),
}

impl<T> Stage<T> {
  pub(crate) fn new(kind: StageKind, op: StageOp<T>) -> Self {
    Stage { kind, op }
  }

  pub fn kind(&self) -> StageKind {
    self.kind
  }
}

// Stage closures don't implement Debug; report the tag only.
impl<T> std::fmt::Debug for Stage<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Stage").field("kind", &self.kind).finish()
  }
}
