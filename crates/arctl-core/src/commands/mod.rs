//! High-level commands for arctl operations.
//!
//! These tie the pipeline stages together and are what the CLI calls.

pub mod local;
pub mod run;

pub use local::ComposeLocalExecutor;
pub use run::{RunCommand, RunOptions, RunSource, RunSummary};
