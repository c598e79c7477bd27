//! Build submission and artifact download

use apkforge_core::domain::build::ContentSource;
use apkforge_core::dto::build::BuildAccepted;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use uuid::Uuid;

use crate::BuildClient;
use crate::error::Result;

/// Everything needed to request a build
#[derive(Debug, Clone)]
pub struct BuildSubmission {
    pub app_id: String,
    pub name: String,
    /// PNG bytes
    pub icon: Vec<u8>,
    pub source: ContentSource,
}

impl BuildSubmission {
    /// Multipart form in the shape the orchestrator expects
    fn into_form(self) -> Form {
        let form = Form::new()
            .text("app_id", self.app_id)
            .text("name", self.name)
            .part("icon", Part::bytes(self.icon).file_name("icon.png"));

        match self.source {
            ContentSource::Url(url) => form.text("main_url", url),
            ContentSource::Archive(bytes) => {
                form.part("zip_file", Part::bytes(bytes).file_name("site.zip"))
            }
            ContentSource::Git(git) => form
                .text("git_url", git.url)
                .text("git_branch", git.branch)
                .text("git_entry", git.entry),
        }
    }
}

impl BuildClient {
    /// Submit a build
    ///
    /// # Returns
    /// The id to follow with [`BuildClient::stream_progress`]
    pub async fn submit_build(&self, submission: BuildSubmission) -> Result<BuildAccepted> {
        let url = format!("{}/build-app", self.base_url);
        tracing::debug!(
            app_id = %submission.app_id,
            source = submission.source.kind(),
            "Submitting build"
        );

        let response = self
            .client
            .post(&url)
            .multipart(submission.into_form())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Download the package of a completed build
    ///
    /// # Returns
    /// The suggested filename and the package bytes
    pub async fn download_artifact(&self, build_id: Uuid) -> Result<(String, Vec<u8>)> {
        let url = format!("{}/download-apk/{}", self.base_url, build_id);
        let response = self.client.get(&url).send().await?;
        let response = self.check_status(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("{}.apk", build_id));

        let bytes = response.bytes().await?;
        Ok((filename, bytes.to_vec()))
    }
}

/// Extracts `filename` from a `Content-Disposition` value
fn attachment_filename(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }

        let value = value.trim().trim_matches('"');
        // never let the server pick a path
        let name = value.rsplit(['/', '\\']).next().unwrap_or(value);
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use mockito::Matcher;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename("attachment; filename=\"demo_release.apk\""),
            Some("demo_release.apk".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; FILENAME=plain.apk"),
            Some("plain.apk".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=\"../../etc/evil.apk\""),
            Some("evil.apk".to_string())
        );
        assert_eq!(attachment_filename("attachment"), None);
        assert_eq!(attachment_filename("attachment; filename=\"\""), None);
    }

    #[tokio::test]
    async fn test_submit_build() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/build-app")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="app_id"\r\n\r\ndemo"#.to_string()),
                Matcher::Regex(r#"name="main_url"\r\n\r\nhttps://example.com"#.to_string()),
                Matcher::Regex(r#"name="icon"; filename="icon.png""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"build_id":"{}"}}"#, id))
            .create_async()
            .await;

        let accepted = BuildClient::new(server.url())
            .submit_build(BuildSubmission {
                app_id: "demo".to_string(),
                name: "Demo".to_string(),
                icon: b"png".to_vec(),
                source: ContentSource::Url("https://example.com".to_string()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(accepted.build_id, id);
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/build-app")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Invalid app_id"}"#)
            .create_async()
            .await;

        let err = BuildClient::new(server.url())
            .submit_build(BuildSubmission {
                app_id: "Bad-Id".to_string(),
                name: "Demo".to_string(),
                icon: Vec::new(),
                source: ContentSource::Url("https://example.com".to_string()),
            })
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(matches!(
            err,
            ClientError::ApiError { status: 400, ref message } if message == "Invalid app_id"
        ));
    }

    #[tokio::test]
    async fn test_download_artifact() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/download-apk/{}", id).as_str())
            .with_status(200)
            .with_header("content-type", "application/vnd.android.package-archive")
            .with_header("content-disposition", "attachment; filename=\"demo_release.apk\"")
            .with_body("PK-fake-apk")
            .create_async()
            .await;

        let (filename, bytes) = BuildClient::new(server.url())
            .download_artifact(id)
            .await
            .unwrap();

        assert_eq!(filename, "demo_release.apk");
        assert_eq!(bytes, b"PK-fake-apk");
    }

    #[tokio::test]
    async fn test_download_without_disposition_uses_id() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/download-apk/{}", id).as_str())
            .with_status(200)
            .with_body("PK")
            .create_async()
            .await;

        let (filename, _) = BuildClient::new(server.url())
            .download_artifact(id)
            .await
            .unwrap();

        assert_eq!(filename, format!("{}.apk", id));
    }

    #[tokio::test]
    async fn test_download_not_ready() {
        let id = Uuid::new_v4();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/download-apk/{}", id).as_str())
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"build is not ready"}"#)
            .create_async()
            .await;

        let err = BuildClient::new(server.url())
            .download_artifact(id)
            .await
            .unwrap_err();

        assert!(err.is_not_ready());
        assert!(matches!(
            err,
            ClientError::ApiError { ref message, .. } if message == "build is not ready"
        ));
    }
}
