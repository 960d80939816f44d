// rivulet_core/src/error.rs
use crate::core::stage::StageKind;
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RivuletError {
  /// A terminal operation (or a stage append) was attempted on a pipeline
  /// that has already completed a terminal operation. A pipeline is consumed
  /// exactly once; afterwards it is dead and must not be reused.
  #[error("Pipeline already consumed; `{operation}` requires an open pipeline")]
  AlreadyConsumed { operation: &'static str },

  /// A user-provided stage closure (predicate, mapper, expander) raised an
  /// error while processing an element. Evaluation aborts immediately; under
  /// parallel evaluation the whole run fails and partial chunk results are
  /// discarded.
  #[error("Stage '{stage}' failed while processing an element. Source: {source}")]
  StageFailure {
    stage: StageKind,
    #[source]
    source: AnyhowError,
  },

  /// The pipeline was configured with values it cannot run with
  /// (e.g. a parallel worker count of zero).
  #[error("Pipeline configuration error: {message}")]
  Configuration { message: String },
}

// Empty scalar results (reduce/min/max/find_first over a sequence that yields
// no elements) are NOT errors: those terminals return `Ok(None)` and callers
// must check before unwrapping.

pub type RivuletResult<T, E = RivuletError> = std::result::Result<T, E>;
