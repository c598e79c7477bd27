//! Artifact Service
//!
//! Resolves the package produced by a finished build.

use apkforge_core::domain::job::{ArtifactRef, JobId, JobStatus};
use apkforge_runner::{JobRegistry, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("build {0} not found")]
    NotFound(JobId),

    #[error("build {id} is not ready (status: {status})")]
    NotReady { id: JobId, status: JobStatus },
}

/// Returns the artifact of a completed build
pub fn locate(registry: &dyn JobRegistry, id: JobId) -> Result<ArtifactRef, ArtifactError> {
    let job = registry.get(id).map_err(|e| match e {
        RegistryError::NotFound(id) => ArtifactError::NotFound(id),
        other => {
            tracing::error!("Unexpected registry error: {}", other);
            ArtifactError::NotFound(id)
        }
    })?;

    match (job.status, job.result) {
        (JobStatus::Complete, Some(artifact)) => Ok(artifact),
        (status, _) => Err(ArtifactError::NotReady { id, status }),
    }
}
