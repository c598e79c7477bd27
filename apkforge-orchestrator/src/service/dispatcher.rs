//! Dispatcher Service
//!
//! Accepts build submissions and starts their pipelines in the background.

use apkforge_core::domain::build::{BuildRequest, BuildRequestDraft, ValidationError};
use apkforge_core::domain::job::JobId;
use apkforge_runner::{BuildPipeline, RegistryError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Turns submissions into running jobs
#[derive(Clone)]
pub struct JobDispatcher {
    pipeline: BuildPipeline,
}

impl JobDispatcher {
    pub fn new(pipeline: BuildPipeline) -> Self {
        Self { pipeline }
    }

    /// Validates a raw submission and schedules it
    ///
    /// An invalid submission is rejected before any job exists.
    pub fn submit(&self, draft: BuildRequestDraft) -> Result<JobId, DispatchError> {
        let request = BuildRequest::try_from(draft)?;
        self.submit_request(request)
    }

    /// Registers a pending job and spawns its pipeline
    ///
    /// Returns as soon as the job is registered; the pipeline keeps running
    /// after the caller goes away. Must be called from within a Tokio runtime.
    pub fn submit_request(&self, request: BuildRequest) -> Result<JobId, DispatchError> {
        let id = Uuid::new_v4();
        self.pipeline.registry().create(id)?;

        tracing::info!(
            job_id = %id,
            app_id = %request.app_id,
            source = request.source.kind(),
            "Build accepted"
        );

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            pipeline.run(id, request).await;
        });

        Ok(id)
    }
}
