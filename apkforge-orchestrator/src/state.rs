//! Shared handler state

use std::sync::Arc;
use std::time::Duration;

use apkforge_runner::{BuildPipeline, JobRegistry};

use crate::service::{JobDispatcher, ProgressStream};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: JobDispatcher,
    pub progress: ProgressStream,
    pub registry: Arc<dyn JobRegistry>,
}

impl AppState {
    /// Wires the services around the pipeline's registry
    pub fn new(pipeline: BuildPipeline, poll_interval: Duration) -> Self {
        let registry = pipeline.registry().clone();
        Self {
            progress: ProgressStream::new(registry.clone(), poll_interval),
            dispatcher: JobDispatcher::new(pipeline),
            registry,
        }
    }
}
