//! Watch command handler
//!
//! Follows a build's progress stream on a single, continuously rewritten
//! terminal line.

use std::io::Write;

use anyhow::{Result, bail};
use apkforge_client::BuildClient;
use apkforge_core::dto::progress::{ProgressEvent, ProgressEventKind};
use colored::*;
use uuid::Uuid;

use crate::config::Config;

const BAR_WIDTH: usize = 24;

pub async fn handle_watch_command(id: Uuid, config: &Config) -> Result<()> {
    let client = BuildClient::new(&config.orchestrator_url);
    follow(&client, id).await
}

/// Prints progress until the build ends
///
/// Fails when the build ends with an `error` event.
pub(super) async fn follow(client: &BuildClient, id: Uuid) -> Result<()> {
    println!("{} {}", "Following build".bold(), id.to_string().cyan());

    let mut line = ProgressLine::default();
    let last = client
        .stream_progress(id, |event| line.update(event))
        .await?;
    line.finish();

    match last.kind {
        ProgressEventKind::Complete => {
            println!("{} {}", "✓".green(), last.payload.message.green());
            Ok(())
        }
        _ => {
            let detail = last.payload.error.unwrap_or_default();
            eprintln!("{} {}", "✗".red(), last.payload.message.red());
            if !detail.is_empty() && detail != last.payload.message {
                eprintln!("{}", "─".repeat(80).dimmed());
                eprintln!("{}", detail.dimmed());
                eprintln!("{}", "─".repeat(80).dimmed());
            }
            bail!("build {} failed", id)
        }
    }
}

/// Single status line rewritten in place
#[derive(Default)]
struct ProgressLine {
    width: usize,
}

impl ProgressLine {
    fn update(&mut self, event: &ProgressEvent) {
        let text = render(event.payload.progress, &event.payload.message);
        let padding = self.width.saturating_sub(text.chars().count());
        self.width = text.chars().count();

        print!("\r{}{}", text, " ".repeat(padding));
        let _ = std::io::stdout().flush();
    }

    fn finish(&mut self) {
        if self.width > 0 {
            println!();
        }
        self.width = 0;
    }
}

/// `[######------------------]  25% message`
fn render(progress: u8, message: &str) -> String {
    let progress = usize::from(progress.min(100));
    let filled = progress * BAR_WIDTH / 100;

    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress,
        message
    )
}
