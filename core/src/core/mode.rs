// rivulet/src/core/mode.rs

//! Defines how a pipeline's terminal evaluation executes: single-threaded
//! pull-based flow, or partitioned across a small pool of worker threads.
//! The mode is chosen explicitly by the caller before the terminal runs and
//! is never mixed mid-evaluation.

use std::num::NonZeroUsize;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
  /// Each element flows fully through the stage chain before the next
  /// element is pulled (except across a sort barrier, which buffers).
  Sequential,
  /// The source is partitioned into at most `workers` contiguous chunks,
  /// each processed by its own scoped worker thread.
  Parallel { workers: usize },
}

impl ExecutionMode {
  /// Parallel mode sized to the available hardware parallelism, falling
  /// back to a single worker when the platform cannot report it.
  pub fn parallel_detected() -> Self {
    let workers = thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1);
    ExecutionMode::Parallel { workers }
  }
}

impl Default for ExecutionMode {
  fn default() -> Self {
    ExecutionMode::Sequential
  }
}
