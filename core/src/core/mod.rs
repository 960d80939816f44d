pub mod mode;
pub mod sequence;
pub mod stage;

// Re-export key types for easier access from other rivulet modules (and lib.rs)
pub use mode::ExecutionMode;
pub use sequence::Sequence;
pub use stage::{Stage, StageKind};
