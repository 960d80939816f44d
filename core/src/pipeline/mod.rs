// rivulet/src/pipeline/mod.rs

//! Defines the `Pipeline<T>` struct, its construction, stage chaining, and
//! the sequential and parallel terminal evaluators.

pub mod definition;
pub mod execution;
pub mod parallel;

// Re-export the main Pipeline struct
pub use definition::Pipeline;
