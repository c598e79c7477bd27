//! APK Forge CLI
//!
//! Command-line interface for submitting builds to the orchestrator and
//! collecting the packages they produce.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "apkforge")]
#[command(about = "Package web content as an Android app", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "APKFORGE_URL", default_value = "http://localhost:9741")]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_url_flag() {
        let cli = Cli::try_parse_from([
            "apkforge",
            "--orchestrator-url",
            "http://forge:9000",
            "watch",
            "0b7c5f8e-4a8f-4c9e-9a51-0c2f61f0a1de",
        ])
        .unwrap();

        assert_eq!(cli.orchestrator_url, "http://forge:9000");
        assert!(matches!(cli.command, Commands::Watch { .. }));
    }
}
