//! Content-source preparation
//!
//! Each [`ContentSource`] variant resolves to the [`AppEntry`] the generated
//! activity loads. This is the only step of the pipeline that differs between
//! URL, archive and git builds.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apkforge_core::domain::build::{ContentSource, GitReference};
use async_trait::async_trait;
use tracing::{debug, info};

use super::error::PipelineError;
use super::Stage;

/// Origin the packaged app serves bundled assets from
pub const ASSET_ORIGIN: &str = "https://appassets.androidplatform.net/assets";

/// What the generated activity opens on launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEntry {
    /// Load this URL directly
    Url(String),
    /// Download the repository at runtime and open `entry` from it
    Git {
        user: String,
        repo: String,
        branch: String,
        entry: String,
    },
}

/// Prepares the web content of one build
#[async_trait]
pub trait ContentPreparer: Send + Sync {
    /// Extra stage reported before preparation starts
    fn stage(&self) -> Option<Stage> {
        None
    }

    /// Resolves the entry point, staging files under `assets_dir` if needed
    ///
    /// # Arguments
    /// * `assets_dir` - Asset directory of the shared native project
    async fn prepare(&self, assets_dir: &Path) -> Result<AppEntry, PipelineError>;
}

/// Picks the preparer for a content source
pub fn preparer_for(source: ContentSource) -> Box<dyn ContentPreparer> {
    match source {
        ContentSource::Url(url) => Box::new(UrlContent { url }),
        ContentSource::Archive(bytes) => Box::new(ArchiveContent {
            bytes: Arc::from(bytes),
        }),
        ContentSource::Git(reference) => Box::new(GitContent { reference }),
    }
}

/// A live page loaded at runtime
pub struct UrlContent {
    url: String,
}

#[async_trait]
impl ContentPreparer for UrlContent {
    async fn prepare(&self, _assets_dir: &Path) -> Result<AppEntry, PipelineError> {
        Ok(AppEntry::Url(self.url.clone()))
    }
}

/// Static files bundled into the package
pub struct ArchiveContent {
    bytes: Arc<[u8]>,
}

#[async_trait]
impl ContentPreparer for ArchiveContent {
    async fn prepare(&self, assets_dir: &Path) -> Result<AppEntry, PipelineError> {
        let bytes = self.bytes.clone();
        let assets_dir = assets_dir.to_path_buf();

        let index = tokio::task::spawn_blocking(move || {
            replace_assets(&bytes, &assets_dir)?;
            find_index(&assets_dir)
        })
        .await
        .map_err(|e| PipelineError::InvalidArchive(format!("extraction task failed: {}", e)))??;

        info!(entry = %index, "Resolved archive entry point");
        Ok(AppEntry::Url(format!("{}/{}", ASSET_ORIGIN, index)))
    }
}

/// A repository the packaged app fetches itself
pub struct GitContent {
    reference: GitReference,
}

#[async_trait]
impl ContentPreparer for GitContent {
    fn stage(&self) -> Option<Stage> {
        Some(Stage::ConfigureGit)
    }

    async fn prepare(&self, _assets_dir: &Path) -> Result<AppEntry, PipelineError> {
        let (user, repo) = parse_repository(&self.reference.url)?;
        info!(%user, %repo, branch = %self.reference.branch, "Git mode configured");

        Ok(AppEntry::Git {
            user,
            repo,
            branch: self.reference.branch.clone(),
            entry: self.reference.entry.trim_start_matches('/').to_string(),
        })
    }
}

/// Reduces a repository URL to its `(user, repo)` pair
fn parse_repository(repo_url: &str) -> Result<(String, String), PipelineError> {
    let invalid = || PipelineError::InvalidRepository(repo_url.to_string());

    let parsed = url::Url::parse(repo_url).map_err(|_| invalid())?;
    let path = parsed.path().trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(user), Some(repo)) => Ok((user.to_string(), repo.to_string())),
        _ => Err(invalid()),
    }
}

/// Swaps the project's asset directory for the archive contents
fn replace_assets(bytes: &[u8], assets_dir: &Path) -> Result<(), PipelineError> {
    if assets_dir.exists() {
        std::fs::remove_dir_all(assets_dir)
            .map_err(|e| PipelineError::io("Failed to clear assets directory", e))?;
    }
    std::fs::create_dir_all(assets_dir)
        .map_err(|e| PipelineError::io("Failed to create assets directory", e))?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::InvalidArchive(e.to_string()))?;

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| PipelineError::InvalidArchive(e.to_string()))?;

        // Entries escaping the target directory are skipped
        let Some(relative) = file.enclosed_name() else {
            debug!(name = %file.name(), "Skipping unsafe archive entry");
            continue;
        };
        let target = assets_dir.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| PipelineError::io("Failed to create directory", e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io("Failed to create directory", e))?;
        }
        let mut out = std::fs::File::create(&target)
            .map_err(|e| PipelineError::io(format!("Failed to create {}", target.display()), e))?;
        std::io::copy(&mut file, &mut out)
            .map_err(|e| PipelineError::io(format!("Failed to extract {}", target.display()), e))?;
    }

    Ok(())
}

/// Relative path of the shallowest `index.htm*` file, `/`-separated
fn find_index(assets_dir: &Path) -> Result<String, PipelineError> {
    let mut candidates = Vec::new();
    collect_index_files(assets_dir, assets_dir, &mut candidates)?;

    candidates
        .into_iter()
        .min_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        })
        .map(|path| {
            path.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .ok_or(PipelineError::NoEntryPoint)
}

fn collect_index_files(
    root: &Path,
    dir: &Path,
    found: &mut Vec<PathBuf>,
) -> Result<(), PipelineError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| PipelineError::io("Failed to read assets", e))?;

    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io("Failed to read assets", e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| PipelineError::io("Failed to read assets", e))?;

        if file_type.is_dir() {
            collect_index_files(root, &path, found)?;
        } else if entry.file_name().to_string_lossy().starts_with("index.htm") {
            if let Ok(relative) = path.strip_prefix(root) {
                found.push(relative.to_path_buf());
            }
        }
    }

    Ok(())
}
