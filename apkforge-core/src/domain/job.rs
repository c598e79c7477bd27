//! Job domain types
//!
//! A [`Job`] is the lifecycle record of one build request. It is only ever
//! changed through [`Job::apply`], which enforces the state machine:
//!
//! ```text
//! pending -> in_progress -> complete
//!    |            |
//!    +------------+-------> error
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Opaque job identifier, issued once per submission
pub type JobId = Uuid;

/// Build job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<ArtifactRef>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Complete,
    Error,
}

/// Reference to a produced artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Location of the artifact on the build host
    pub path: PathBuf,
    /// Suggested download name
    pub filename: String,
}

/// Partial update merged into a [`Job`]
///
/// Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<ArtifactRef>,
    pub error_detail: Option<String>,
}

/// Reasons an update is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateRejected {
    #[error("job is already {0} and can no longer change")]
    Terminal(JobStatus),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("progress {0} is out of range (0-100)")]
    ProgressOutOfRange(u8),

    #[error("a result can only be recorded together with the complete status")]
    UnexpectedResult,

    #[error("a completed job needs an artifact reference")]
    MissingResult,

    #[error("error detail can only be recorded together with the error status")]
    UnexpectedErrorDetail,
}

impl JobStatus {
    /// Whether no further transition can happen from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether `next` is a legal successor of this status
    ///
    /// Staying in the same non-terminal status is allowed so that progress and
    /// message updates can carry the status along.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, InProgress)
                | (Pending, Error)
                | (InProgress, InProgress)
                | (InProgress, Complete)
                | (InProgress, Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Job {
    /// Creates a fresh pending job
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Starting...".to_string(),
            result: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges an update into this job
    ///
    /// The whole update is validated before any field changes, so a rejected
    /// update leaves the job exactly as it was. Progress only ever ratchets up:
    /// a lower value than the current one is ignored rather than applied.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), UpdateRejected> {
        if self.status.is_terminal() {
            return Err(UpdateRejected::Terminal(self.status));
        }

        let next_status = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next_status) {
            return Err(UpdateRejected::InvalidTransition {
                from: self.status,
                to: next_status,
            });
        }

        if let Some(progress) = update.progress {
            if progress > 100 {
                return Err(UpdateRejected::ProgressOutOfRange(progress));
            }
        }

        if update.result.is_some() && next_status != JobStatus::Complete {
            return Err(UpdateRejected::UnexpectedResult);
        }
        if next_status == JobStatus::Complete && update.result.is_none() {
            return Err(UpdateRejected::MissingResult);
        }
        if update.error_detail.is_some() && next_status != JobStatus::Error {
            return Err(UpdateRejected::UnexpectedErrorDetail);
        }

        self.status = next_status;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress);
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error_detail.is_some() {
            self.error_detail = update.error_detail;
        }
        self.updated_at = Utc::now();

        Ok(())
    }
}

impl JobUpdate {
    /// Advances progress and replaces the message
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Replaces the message only
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Moves the job into `in_progress`
    pub fn started(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::InProgress),
            ..Self::progress(progress, message)
        }
    }

    /// Terminal success carrying the produced artifact
    pub fn complete(artifact: ArtifactRef, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Complete),
            progress: Some(100),
            message: Some(message.into()),
            result: Some(artifact),
            error_detail: None,
        }
    }

    /// Terminal failure; progress is left where it was
    pub fn failed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            message: Some(message.into()),
            error_detail: Some(detail.into()),
            ..Default::default()
        }
    }

    /// Sets the status carried by this update
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }
}
