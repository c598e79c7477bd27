//! Download command handler

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apkforge_client::BuildClient;
use colored::*;
use uuid::Uuid;

use crate::config::Config;

pub async fn handle_download_command(
    id: Uuid,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let client = BuildClient::new(&config.orchestrator_url);
    fetch(&client, id, output.as_deref()).await?;
    Ok(())
}

/// Downloads the package and writes it to disk
///
/// # Returns
/// The path written
pub(super) async fn fetch(client: &BuildClient, id: Uuid, output: Option<&Path>) -> Result<PathBuf> {
    let (filename, bytes) = client.download_artifact(id).await.map_err(|e| {
        if e.is_not_ready() {
            anyhow::anyhow!("build {} has not completed yet", id)
        } else if e.is_not_found() {
            anyhow::anyhow!("build {} not found", id)
        } else {
            e.into()
        }
    })?;

    let path = destination(output, &filename);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} {} ({} bytes)",
        "Saved".green(),
        path.display().to_string().cyan(),
        bytes.len()
    );

    Ok(path)
}

/// An explicit output wins; a directory receives the suggested filename
fn destination(output: Option<&Path>, filename: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            destination(None, "demo_release.apk"),
            PathBuf::from("demo_release.apk")
        );
        assert_eq!(
            destination(Some(dir.path()), "demo_release.apk"),
            dir.path().join("demo_release.apk")
        );
        assert_eq!(
            destination(Some(Path::new("/tmp/custom.apk")), "demo_release.apk"),
            PathBuf::from("/tmp/custom.apk")
        );
    }
}
