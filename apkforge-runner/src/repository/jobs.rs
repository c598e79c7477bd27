//! Jobs repository
//!
//! Holds every job record for the lifetime of the process:
//! - Creating a pending record when a build is accepted
//! - Merging stage updates from the pipeline
//! - Serving snapshots to progress streams and downloads

use apkforge_core::domain::job::{Job, JobId, JobUpdate, UpdateRejected};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} already exists")]
    AlreadyExists(JobId),

    #[error("update for job {id} rejected: {reason}")]
    Rejected {
        id: JobId,
        #[source]
        reason: UpdateRejected,
    },
}

/// Registry of build jobs
///
/// Every method is synchronous and returns owned snapshots, so no caller can
/// hold a registry lock across an await point.
pub trait JobRegistry: Send + Sync {
    /// Inserts a fresh pending job
    ///
    /// # Arguments
    /// * `id` - Identifier issued by the dispatcher; must not be in use
    fn create(&self, id: JobId) -> Result<Job, RegistryError>;

    /// Merges an update into an existing job and returns the new snapshot
    ///
    /// The update is validated as a whole; a rejected update changes nothing.
    ///
    /// # Arguments
    /// * `id` - The job to update
    /// * `update` - Fields to merge
    fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, RegistryError>;

    /// Returns a consistent snapshot of one job
    fn get(&self, id: JobId) -> Result<Job, RegistryError>;

    /// Number of jobs ever created
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry backed by a sharded concurrent map
///
/// Updates to different ids only contend when they land in the same shard.
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, id: JobId) -> Result<Job, RegistryError> {
        match self.jobs.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                let job = Job::new(id);
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, RegistryError> {
        let mut job = self.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        job.apply(update)
            .map_err(|reason| RegistryError::Rejected { id, reason })?;
        Ok(job.clone())
    }

    fn get(&self, id: JobId) -> Result<Job, RegistryError> {
        self.jobs
            .get(&id)
            .map(|job| job.clone())
            .ok_or(RegistryError::NotFound(id))
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}
