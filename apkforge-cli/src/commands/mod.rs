//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod build;
mod download;
mod watch;

pub use build::BuildArgs;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a build, follow it and download the package
    Build(BuildArgs),
    /// Follow the progress of a build
    Watch {
        /// Build ID
        id: Uuid,
    },
    /// Download the package of a completed build
    Download {
        /// Build ID
        id: Uuid,

        /// Destination file (default: the name suggested by the server)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Build(args) => build::handle_build_command(args, config).await,
        Commands::Watch { id } => watch::handle_watch_command(id, config).await,
        Commands::Download { id, output } => {
            download::handle_download_command(id, output, config).await
        }
    }
}
