//! APKForge Runner
//!
//! Everything needed to take one build request through the external toolchain:
//!
//! - [`tool`]: launching the toolchain and streaming its output
//! - [`progress`]: turning free-text tool output into progress checkpoints
//! - [`repository`]: the shared job registry
//! - [`pipeline`]: the ordered build stages of one job
//!
//! The orchestrator owns the HTTP surface and decides when a pipeline runs;
//! this crate does not spawn anything on its own.

pub mod config;
pub mod pipeline;
pub mod progress;
pub mod repository;
pub mod tool;

pub use config::{BuilderConfig, ToolchainConfig};
pub use pipeline::{BuildPipeline, PipelineError};
pub use progress::{ProgressEstimator, ProgressRule, ProgressRules, ProgressWindow};
pub use repository::{InMemoryJobRegistry, JobRegistry, RegistryError};
pub use tool::{ExternalToolRunner, ToolCommand, ToolError, ToolOutput, ToolStream};
