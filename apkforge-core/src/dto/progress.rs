//! Progress stream DTOs
//!
//! Every server-push event carries a [`ProgressPayload`] as its JSON body.
//! Terminal events are distinguished by their event name.

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};

/// Message and error text sent for an id the registry does not know
pub const UNKNOWN_JOB_MESSAGE: &str = "Invalid ID";

/// JSON body of a progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEventKind {
    Progress,
    Complete,
    Error,
}

/// One event of a progress stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: ProgressEventKind,
    pub payload: ProgressPayload,
}

impl ProgressEventKind {
    /// SSE event name; `None` means the default `message` event
    pub fn event_name(self) -> Option<&'static str> {
        match self {
            ProgressEventKind::Progress => None,
            ProgressEventKind::Complete => Some("complete"),
            ProgressEventKind::Error => Some("error"),
        }
    }

    /// Inverse of [`ProgressEventKind::event_name`]
    pub fn from_event_name(name: Option<&str>) -> Option<Self> {
        match name {
            None | Some("message") => Some(ProgressEventKind::Progress),
            Some("complete") => Some(ProgressEventKind::Complete),
            Some("error") => Some(ProgressEventKind::Error),
            Some(_) => None,
        }
    }
}

impl ProgressPayload {
    /// Visible state of a job, without terminal extras
    pub fn from_job(job: &Job) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            build_id: None,
            error: None,
        }
    }
}

impl ProgressEvent {
    /// Event for a job snapshot; terminal jobs yield their terminal event
    pub fn from_job(job: &Job) -> Self {
        let mut payload = ProgressPayload::from_job(job);

        let kind = match job.status {
            JobStatus::Complete => {
                payload.build_id = Some(job.id);
                ProgressEventKind::Complete
            }
            JobStatus::Error => {
                payload.error = Some(
                    job.error_detail
                        .clone()
                        .unwrap_or_else(|| job.message.clone()),
                );
                ProgressEventKind::Error
            }
            JobStatus::Pending | JobStatus::InProgress => ProgressEventKind::Progress,
        };

        Self { kind, payload }
    }

    /// Single terminal event for an unknown job id
    pub fn unknown_job() -> Self {
        Self {
            kind: ProgressEventKind::Error,
            payload: ProgressPayload {
                status: JobStatus::Error,
                progress: 0,
                message: UNKNOWN_JOB_MESSAGE.to_string(),
                build_id: None,
                error: Some(UNKNOWN_JOB_MESSAGE.to_string()),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != ProgressEventKind::Progress
    }
}
