//! Build API Handlers
//!
//! Submission of new builds and download of finished packages.

use apkforge_core::domain::build::BuildRequestDraft;
use apkforge_core::dto::build::BuildAccepted;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::Field},
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::artifact;
use crate::state::AppState;

pub const APK_CONTENT_TYPE: &str = "application/vnd.android.package-archive";

/// POST /build-app
/// Accept a multipart submission and start its build
///
/// Fields: `app_id`, `name`, `icon` (file) and exactly one of `main_url`,
/// `zip_file` (file) or `git_url` (with optional `git_branch`, `git_entry`).
/// Unknown fields are ignored.
pub async fn submit_build(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<BuildAccepted>> {
    let mut draft = BuildRequestDraft::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "app_id" => draft.app_id = Some(text(field).await?),
            "name" => draft.name = Some(text(field).await?),
            "main_url" => draft.main_url = Some(text(field).await?),
            "git_url" => draft.git_url = Some(text(field).await?),
            "git_branch" => draft.git_branch = Some(text(field).await?),
            "git_entry" => draft.git_entry = Some(text(field).await?),
            "icon" => draft.icon = Some(bytes(field).await?),
            "zip_file" => draft.archive = Some(bytes(field).await?),
            other => tracing::debug!("Ignoring unknown form field: {}", other),
        }
    }

    let build_id = state.dispatcher.submit(draft)?;

    Ok(Json(BuildAccepted { build_id }))
}

/// GET /download-apk/{id}
/// Stream the package of a completed build
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::NotFound(format!("build {} not found", id)))?;

    let artifact = artifact::locate(&*state.registry, id)?;
    tracing::debug!(job_id = %id, path = %artifact.path.display(), "Serving artifact");

    let file = tokio::fs::File::open(&artifact.path).await.map_err(|e| {
        tracing::error!(job_id = %id, "Artifact file unavailable: {}", e);
        ApiError::NotFound(format!("artifact of build {} is no longer available", id))
    })?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .len();

    let headers = [
        (header::CONTENT_TYPE, APK_CONTENT_TYPE.to_string()),
        (header::CONTENT_LENGTH, length.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

async fn text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

async fn bytes(field: Field<'_>) -> ApiResult<Vec<u8>> {
    field
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
