use std::path::PathBuf;

use thiserror::Error;

use crate::repository::RegistryError;
use crate::tool::ToolError;

/// Message shown to users when the toolchain itself failed
pub const TOOL_FAILURE_MESSAGE: &str = "Build failed. Check console for details.";

/// Failures that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("APK build failed: {} was not produced", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid zip archive: {0}")]
    InvalidArchive(String),

    #[error("No index.html found in zip")]
    NoEntryPoint,

    #[error("Invalid repository URL: {0}")]
    InvalidRepository(String),

    #[error("no build slot available")]
    SlotUnavailable,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short text for the job's `message` field
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Tool(ToolError::Failure { .. }) => TOOL_FAILURE_MESSAGE.to_string(),
            other => format!("Error: {}", other),
        }
    }

    /// Full text for the job's `error_detail` field
    pub fn diagnostic(&self) -> String {
        match self {
            PipelineError::Tool(ToolError::Failure {
                command, output, ..
            }) => format!("Command failed: {}\nOutput:\n{}", command, output),
            other => other.to_string(),
        }
    }
}
