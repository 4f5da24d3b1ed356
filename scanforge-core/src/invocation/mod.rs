//! Building, running and classifying external tool invocations

mod artifact;
mod builder;
mod classify;
mod pipeline;
mod runner;

pub use artifact::ScratchArtifact;
pub use builder::{CommandBuilder, ConflictRule, Invocation, TargetPlacement};
pub use classify::classify;
pub use pipeline::{BuildContext, ScanEngine, ToolSpec};
pub use runner::{ExecutionOutcome, ProcessRunner};
