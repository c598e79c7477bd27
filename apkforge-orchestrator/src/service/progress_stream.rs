//! Progress Stream Service
//!
//! Follows one job by polling the registry and emits an event whenever the
//! visible state changes. Every subscription starts from the current state,
//! so a client that reconnects simply subscribes again.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use apkforge_core::domain::job::JobId;
use apkforge_core::dto::progress::{ProgressEvent, ProgressPayload};
use apkforge_runner::JobRegistry;
use tokio_stream::Stream;

/// Default delay between registry polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Finite sequence of progress events ending in exactly one terminal event
pub type EventStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

#[derive(Clone)]
pub struct ProgressStream {
    registry: Arc<dyn JobRegistry>,
    poll_interval: Duration,
}

impl ProgressStream {
    pub fn new(registry: Arc<dyn JobRegistry>, poll_interval: Duration) -> Self {
        Self {
            registry,
            poll_interval,
        }
    }

    /// Subscribes to one job
    ///
    /// An unknown id yields a single error event. Unchanged snapshots are
    /// suppressed; intermediate states between two polls may be skipped.
    pub fn subscribe(&self, id: JobId) -> EventStream {
        let registry = self.registry.clone();
        let poll_interval = self.poll_interval;

        Box::pin(async_stream::stream! {
            let mut last: Option<ProgressPayload> = None;

            loop {
                let job = match registry.get(id) {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::debug!("Progress requested for unknown job: {}", e);
                        yield ProgressEvent::unknown_job();
                        break;
                    }
                };

                let event = ProgressEvent::from_job(&job);
                if event.is_terminal() {
                    yield event;
                    break;
                }

                if last.as_ref() != Some(&event.payload) {
                    last = Some(event.payload.clone());
                    yield event;
                }

                tokio::time::sleep(poll_interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkforge_core::domain::job::{ArtifactRef, JobStatus, JobUpdate};
    use apkforge_core::dto::progress::ProgressEventKind;
    use apkforge_runner::InMemoryJobRegistry;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    fn stream() -> (ProgressStream, Arc<InMemoryJobRegistry>) {
        let registry = Arc::new(InMemoryJobRegistry::new());
        (
            ProgressStream::new(registry.clone(), DEFAULT_POLL_INTERVAL),
            registry,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_yields_single_error() {
        let (progress, _registry) = stream();

        let events: Vec<ProgressEvent> = progress.subscribe(Uuid::new_v4()).collect().await;

        assert_eq!(events, vec![ProgressEvent::unknown_job()]);
        assert_eq!(events[0].payload.error.as_deref(), Some("Invalid ID"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_job_yields_only_terminal_event() {
        let (progress, registry) = stream();
        let id = Uuid::new_v4();
        registry.create(id).unwrap();
        registry.update(id, JobUpdate::started(98, "Finalizing...")).unwrap();
        registry
            .update(
                id,
                JobUpdate::complete(
                    ArtifactRef {
                        path: "/tmp/demo.apk".into(),
                        filename: "demo_release.apk".to_string(),
                    },
                    "Done!",
                ),
            )
            .unwrap();

        let events: Vec<ProgressEvent> = progress.subscribe(id).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ProgressEventKind::Complete);
        assert_eq!(events[0].payload.build_id, Some(id));
        assert_eq!(events[0].payload.progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_are_suppressed() {
        let (progress, registry) = stream();
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        let writer = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            writer.update(id, JobUpdate::message("Starting...")).unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            writer
                .update(id, JobUpdate::started(5, "Preparing assets..."))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            writer
                .update(id, JobUpdate::failed("Error: boom", "boom"))
                .unwrap();
        });

        let events: Vec<ProgressEvent> = progress.subscribe(id).collect().await;

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProgressEventKind::Progress,
                ProgressEventKind::Progress,
                ProgressEventKind::Error
            ]
        );
        assert_eq!(events[0].payload.status, JobStatus::Pending);
        assert_eq!(events[1].payload.progress, 5);
        assert_eq!(events[1].payload.message, "Preparing assets...");
        assert_eq!(events[2].payload.error.as_deref(), Some("boom"));
        assert_eq!(events[2].payload.progress, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_starts_from_current_state() {
        let (progress, registry) = stream();
        let id = Uuid::new_v4();
        registry.create(id).unwrap();
        registry.update(id, JobUpdate::started(45, "Injecting source code...")).unwrap();

        let mut first = progress.subscribe(id);
        assert_eq!(first.next().await.unwrap().payload.progress, 45);
        drop(first);

        registry.update(id, JobUpdate::progress(50, "Building APK...")).unwrap();

        let mut second = progress.subscribe(id);
        let event = second.next().await.unwrap();
        assert_eq!(event.payload.progress, 50);
        assert_eq!(event.payload.message, "Building APK...");
    }
}
