//! Progress stream consumption

use apkforge_core::dto::progress::{ProgressEvent, ProgressEventKind};
use uuid::Uuid;

use crate::BuildClient;
use crate::error::{ClientError, Result};
use crate::sse::{SseFrame, SseParser};

impl BuildClient {
    /// Follow a build until it finishes
    ///
    /// `on_event` sees every event, the terminal one included.
    ///
    /// # Returns
    /// The terminal `complete` or `error` event. A failed build is not an
    /// `Err`; check the returned event's kind.
    pub async fn stream_progress<F>(&self, build_id: Uuid, mut on_event: F) -> Result<ProgressEvent>
    where
        F: FnMut(&ProgressEvent),
    {
        let url = format!("{}/build-progress/{}", self.base_url, build_id);
        let response = self.client.get(&url).send().await?;
        let mut response = self.check_status(response).await?;

        let mut parser = SseParser::new();
        while let Some(chunk) = response.chunk().await? {
            for frame in parser.push(&chunk) {
                let Some(event) = decode(frame)? else {
                    continue;
                };

                on_event(&event);
                if event.is_terminal() {
                    return Ok(event);
                }
            }
        }

        Err(ClientError::StreamEnded)
    }
}

/// Frames with an unrecognized event name are skipped
fn decode(frame: SseFrame) -> Result<Option<ProgressEvent>> {
    let Some(kind) = ProgressEventKind::from_event_name(frame.event.as_deref()) else {
        tracing::debug!("Skipping unknown event: {:?}", frame.event);
        return Ok(None);
    };

    let payload = serde_json::from_str(&frame.data)
        .map_err(|e| ClientError::ParseError(format!("Invalid progress event: {}", e)))?;

    Ok(Some(ProgressEvent { kind, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkforge_core::domain::job::JobStatus;
    use std::io::Write;

    /// Serves `chunks` as a chunked event stream for one build
    async fn event_stream(
        server: &mut mockito::ServerGuard,
        build_id: Uuid,
        chunks: Vec<String>,
    ) -> mockito::Mock {
        server
            .mock("GET", format!("/build-progress/{}", build_id).as_str())
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(move |w| {
                for chunk in &chunks {
                    w.write_all(chunk.as_bytes())?;
                    w.flush()?;
                }
                Ok(())
            })
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_stream_until_terminal_event() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        let mock = event_stream(
            &mut server,
            id,
            vec![
                "data: {\"status\":\"pending\",\"progress\":0,\"message\":\"Starting...\"}\n\n".to_string(),
                ": keep-alive\n\ndata: {\"status\":\"in_progress\",\"pro".to_string(),
                "gress\":55,\"message\":\"Building: preBuild\"}\n\n".to_string(),
                format!(
                    "event: complete\ndata: {{\"status\":\"complete\",\"progress\":100,\"message\":\"Done!\",\"build_id\":\"{}\"}}\n\n",
                    id
                ),
            ],
        )
        .await;

        let mut seen = Vec::new();
        let last = BuildClient::new(server.url())
            .stream_progress(id, |event| seen.push(event.payload.progress))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(seen, vec![0, 55, 100]);
        assert_eq!(last.kind, ProgressEventKind::Complete);
        assert_eq!(last.payload.status, JobStatus::Complete);
        assert_eq!(last.payload.build_id, Some(id));
    }

    #[tokio::test]
    async fn test_error_event_is_returned() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        event_stream(
            &mut server,
            id,
            vec![
                "event: error\ndata: {\"status\":\"error\",\"progress\":0,\"message\":\"Invalid ID\",\"error\":\"Invalid ID\"}\n\n".to_string(),
            ],
        )
        .await;

        let last = BuildClient::new(server.url())
            .stream_progress(id, |_| {})
            .await
            .unwrap();

        assert_eq!(last.kind, ProgressEventKind::Error);
        assert_eq!(last.payload.error.as_deref(), Some("Invalid ID"));
    }

    #[tokio::test]
    async fn test_stream_closed_early() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        event_stream(
            &mut server,
            id,
            vec![
                "data: {\"status\":\"pending\",\"progress\":0,\"message\":\"Starting...\"}\n\n".to_string(),
            ],
        )
        .await;

        let err = BuildClient::new(server.url())
            .stream_progress(id, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::StreamEnded));
    }

    #[test]
    fn test_unknown_event_is_skipped() {
        let frame = SseFrame {
            event: Some("ping".to_string()),
            data: "{}".to_string(),
        };
        assert!(decode(frame).unwrap().is_none());

        let frame = SseFrame {
            event: None,
            data: "not json".to_string(),
        };
        assert!(matches!(decode(frame), Err(ClientError::ParseError(_))));
    }
}
