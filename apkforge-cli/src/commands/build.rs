//! Build command handler
//!
//! Submits a build and, unless told otherwise, follows it to the end and
//! downloads the package.

use std::path::PathBuf;

use anyhow::{Context, Result};
use apkforge_client::{BuildClient, BuildSubmission};
use apkforge_core::domain::build::{
    ContentSource, DEFAULT_GIT_BRANCH, DEFAULT_GIT_ENTRY, GitReference,
};
use clap::Args;
use colored::*;

use crate::config::Config;

#[derive(Args)]
pub struct BuildArgs {
    /// Application id: lowercase letters, digits and underscores
    #[arg(long)]
    pub app_id: String,

    /// Display name shown on the launcher
    #[arg(long)]
    pub name: String,

    /// PNG launcher icon
    #[arg(long)]
    pub icon: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Branch to load from the git repository (with --git-url)
    #[arg(long)]
    pub git_branch: Option<String>,

    /// Entry page inside the git repository (with --git-url)
    #[arg(long)]
    pub git_entry: Option<String>,

    /// Where to save the package (file or directory)
    #[arg(short, long, conflicts_with = "no_follow")]
    pub output: Option<PathBuf>,

    /// Print the build id and exit without waiting
    #[arg(long)]
    pub no_follow: bool,
}

/// Exactly one content source
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Web page the app loads at runtime
    #[arg(long)]
    pub url: Option<String>,

    /// Zip of static files bundled into the app
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Git repository the app loads its pages from
    #[arg(long)]
    pub git_url: Option<String>,
}

pub async fn handle_build_command(args: BuildArgs, config: &Config) -> Result<()> {
    let client = BuildClient::new(&config.orchestrator_url);
    let no_follow = args.no_follow;
    let output = args.output.clone();

    let submission = submission(args).await?;
    let accepted = client.submit_build(submission).await?;

    println!(
        "{} {}",
        "Build accepted:".bold(),
        accepted.build_id.to_string().cyan()
    );

    if no_follow {
        return Ok(());
    }

    super::watch::follow(&client, accepted.build_id).await?;
    super::download::fetch(&client, accepted.build_id, output.as_deref()).await?;

    Ok(())
}

async fn submission(args: BuildArgs) -> Result<BuildSubmission> {
    let icon = tokio::fs::read(&args.icon)
        .await
        .with_context(|| format!("Failed to read icon {}", args.icon.display()))?;

    Ok(BuildSubmission {
        app_id: args.app_id,
        name: args.name,
        icon,
        source: content_source(args.source, args.git_branch, args.git_entry).await?,
    })
}

async fn content_source(
    source: SourceArgs,
    git_branch: Option<String>,
    git_entry: Option<String>,
) -> Result<ContentSource> {
    if source.git_url.is_none() && (git_branch.is_some() || git_entry.is_some()) {
        anyhow::bail!("--git-branch and --git-entry can only be used with --git-url");
    }

    if let Some(url) = source.url {
        return Ok(ContentSource::Url(url));
    }

    if let Some(path) = source.archive {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read archive {}", path.display()))?;
        return Ok(ContentSource::Archive(bytes));
    }

    match source.git_url {
        Some(url) => Ok(ContentSource::Git(GitReference {
            url,
            branch: git_branch.unwrap_or_else(|| DEFAULT_GIT_BRANCH.to_string()),
            entry: git_entry.unwrap_or_else(|| DEFAULT_GIT_ENTRY.to_string()),
        })),
        None => anyhow::bail!("one of --url, --archive or --git-url is required"),
    }
}
