//! Build request types
//!
//! A submission arrives as a [`BuildRequestDraft`] (every field optional, as
//! decoded from a multipart form) and is turned into a [`BuildRequest`] only if
//! it names exactly one content source.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default git branch when none is given
pub const DEFAULT_GIT_BRANCH: &str = "main";

/// Default entry page inside a git repository
pub const DEFAULT_GIT_ENTRY: &str = "index.html";

/// Raw submission fields, before validation
#[derive(Debug, Clone, Default)]
pub struct BuildRequestDraft {
    pub app_id: Option<String>,
    pub name: Option<String>,
    pub icon: Option<Vec<u8>>,
    pub main_url: Option<String>,
    pub archive: Option<Vec<u8>>,
    pub git_url: Option<String>,
    pub git_branch: Option<String>,
    pub git_entry: Option<String>,
}

/// A validated build request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub app_id: String,
    pub name: String,
    pub icon: Vec<u8>,
    pub source: ContentSource,
}

/// Where the application's web content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A live web page loaded at runtime
    Url(String),
    /// A zip of static files bundled into the package
    Archive(Vec<u8>),
    /// A git repository fetched by the app at runtime
    Git(GitReference),
}

/// Git repository reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitReference {
    pub url: String,
    pub branch: String,
    pub entry: String,
}

/// Request validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(
        "invalid app id '{0}': use lowercase letters, digits and underscores, starting with a letter"
    )]
    InvalidAppId(String),

    #[error("no content source: provide one of main_url, zip_file or git_url")]
    NoContentSource,

    #[error("only one content source may be provided, got: {}", .0.join(", "))]
    MultipleContentSources(Vec<&'static str>),

    #[error("invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}

impl ContentSource {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ContentSource::Url(_) => "url",
            ContentSource::Archive(_) => "archive",
            ContentSource::Git(_) => "git",
        }
    }
}

impl TryFrom<BuildRequestDraft> for BuildRequest {
    type Error = ValidationError;

    fn try_from(draft: BuildRequestDraft) -> Result<Self, Self::Error> {
        let app_id = present(draft.app_id).ok_or(ValidationError::MissingField("app_id"))?;
        validate_app_id(&app_id)?;

        let name = present(draft.name).ok_or(ValidationError::MissingField("name"))?;
        let icon = draft
            .icon
            .filter(|bytes| !bytes.is_empty())
            .ok_or(ValidationError::MissingField("icon"))?;

        let main_url = present(draft.main_url);
        let archive = draft.archive.filter(|bytes| !bytes.is_empty());
        let git_url = present(draft.git_url);

        let supplied: Vec<&'static str> = [
            main_url.as_ref().map(|_| "main_url"),
            archive.as_ref().map(|_| "zip_file"),
            git_url.as_ref().map(|_| "git_url"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if supplied.len() > 1 {
            return Err(ValidationError::MultipleContentSources(supplied));
        }

        let source = match (main_url, archive, git_url) {
            (Some(url), None, None) => {
                validate_web_url("main_url", &url)?;
                ContentSource::Url(url)
            }
            (None, Some(bytes), None) => ContentSource::Archive(bytes),
            (None, None, Some(url)) => {
                validate_web_url("git_url", &url)?;
                ContentSource::Git(GitReference {
                    url,
                    branch: present(draft.git_branch)
                        .unwrap_or_else(|| DEFAULT_GIT_BRANCH.to_string()),
                    entry: present(draft.git_entry)
                        .unwrap_or_else(|| DEFAULT_GIT_ENTRY.to_string()),
                })
            }
            _ => return Err(ValidationError::NoContentSource),
        };

        Ok(BuildRequest {
            app_id,
            name,
            icon,
            source,
        })
    }
}

/// Treats blank strings as absent and trims the rest
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The id becomes both a Java package segment and a directory name
fn validate_app_id(app_id: &str) -> Result<(), ValidationError> {
    let mut chars = app_id.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_valid = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if starts_with_letter && rest_valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidAppId(app_id.to_string()))
    }
}

fn validate_web_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(value).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
