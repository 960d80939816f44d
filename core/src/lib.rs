// src/lib.rs

//! Rivulet: a lazy, composable sequence-pipeline library for Rust.
//!
//! Rivulet lets you wrap an ordered, in-memory collection as a [`Sequence`],
//! chain deferred stages over it (filter, map, flat_map, distinct, sort,
//! peek, limit, skip), and consume the whole chain exactly once with a
//! terminal operation:
//!  - Stages are descriptors accumulated by a builder; nothing runs until a
//!    terminal operation is invoked.
//!  - Terminals either materialize a collection, fold to a scalar, answer a
//!    predicate question (short-circuiting), or find a single element.
//!  - A pipeline transitions from open to consumed exactly once; a second
//!    terminal (or a late stage append) fails with `AlreadyConsumed`.
//!  - An explicit parallel evaluator partitions the source across a small
//!    pool of scoped worker threads and merges chunk results; sequential
//!    multiset semantics are preserved for pure filter/map chains.

// Declare modules according to the planned structure
pub mod core;
pub mod pipeline;
pub mod error;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::mode::ExecutionMode;
pub use crate::core::sequence::Sequence;
pub use crate::core::stage::StageKind;

// The main Pipeline struct: builder-style stage appends plus the terminal
// operations that trigger evaluation.
pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{RivuletError, RivuletResult};

// --- General Crate-Level Items ---

/*
    Core Workflow:
    1. Wrap a collection: `Pipeline::from_vec(vec![2, 1, 4, 7, 5])`.
    2. Chain stages; each append is deferred and returns the pipeline:
       `.filter(|v| *v >= 3)?.map(|v| -v)?.sorted()?`
    3. Optionally pick the execution mode up front: `.parallel()?`.
    4. Invoke exactly one terminal: `.to_vec()`, `.reduce(op)`, `.count()`,
       `.any_match(pred)`, `.find_first()`, ...
    5. Scalar terminals return `Ok(None)` when the sequence yields nothing;
       a second terminal on the same pipeline returns `AlreadyConsumed`.
*/
