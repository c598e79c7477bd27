//! Generated native sources
//!
//! Every build fully rewrites the request-specific files of the shared native
//! project so nothing from a previous build survives into this one.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::PipelineError;
use super::source::AppEntry;

const BUILD_GRADLE_TEMPLATE: &str = include_str!("../../templates/build.gradle.tmpl");
const MAIN_ACTIVITY_TEMPLATE: &str = include_str!("../../templates/MainActivity.java.tmpl");
const MAIN_ACTIVITY_GIT_TEMPLATE: &str =
    include_str!("../../templates/MainActivityGit.java.tmpl");

const ACTIVITY_FILE: &str = "MainActivity.java";

/// Request-specific values substituted into the templates
#[derive(Debug, Clone, Copy)]
pub struct SourceValues<'a> {
    pub app_id: &'a str,
    pub name: &'a str,
    pub entry: &'a AppEntry,
}

/// Rewrites `build.gradle`, the main activity and `strings.xml`
///
/// Blocking; run it off the async executor.
pub fn write_sources(project_root: &Path, values: SourceValues<'_>) -> Result<(), PipelineError> {
    let app_dir = project_root.join("app");

    write_file(
        &app_dir.join("build.gradle"),
        &render_gradle(values.app_id),
    )?;

    let java_root = app_dir.join("src/main/java");
    let package_dir = java_root.join("com").join(values.app_id).join("htpk");
    let activity = package_dir.join(ACTIVITY_FILE);

    remove_stale_activities(&java_root, &activity)?;
    write_file(&activity, &render_activity(values.app_id, values.entry))?;

    write_file(
        &app_dir.join("src/main/res/values/strings.xml"),
        &render_strings(values.name),
    )?;

    Ok(())
}

pub fn render_gradle(app_id: &str) -> String {
    BUILD_GRADLE_TEMPLATE.replace("{{APP_ID}}", app_id)
}

pub fn render_activity(app_id: &str, entry: &AppEntry) -> String {
    match entry {
        AppEntry::Url(url) => MAIN_ACTIVITY_TEMPLATE
            .replace("{{APP_ID}}", app_id)
            .replace("{{MAIN_URL}}", &java_escape(url)),
        AppEntry::Git {
            user,
            repo,
            branch,
            entry,
        } => MAIN_ACTIVITY_GIT_TEMPLATE
            .replace("{{APP_ID}}", app_id)
            .replace("{{GIT_USER}}", &java_escape(user))
            .replace("{{GIT_REPO}}", &java_escape(repo))
            .replace("{{GIT_BRANCH}}", &java_escape(branch))
            .replace("{{GIT_ENTRY}}", &java_escape(entry)),
    }
}

pub fn render_strings(name: &str) -> String {
    format!(
        "<resources>\n    <string name=\"app_name\">{}</string>\n</resources>",
        xml_escape(name)
    )
}

fn write_file(path: &Path, contents: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io(format!("Failed to create {}", parent.display()), e))?;
    }
    std::fs::write(path, contents)
        .map_err(|e| PipelineError::io(format!("Failed to write {}", path.display()), e))
}

/// Deletes every main activity except `keep`, avoiding duplicate classes
fn remove_stale_activities(java_root: &Path, keep: &Path) -> Result<(), PipelineError> {
    if !java_root.exists() {
        return Ok(());
    }

    let mut found = Vec::new();
    collect_activities(java_root, &mut found)?;

    for path in found.into_iter().filter(|p| p != keep) {
        debug!(path = %path.display(), "Removing stale activity");
        std::fs::remove_file(&path)
            .map_err(|e| PipelineError::io(format!("Failed to remove {}", path.display()), e))?;
    }

    Ok(())
}

fn collect_activities(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PipelineError::io(format!("Failed to read {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| PipelineError::io(format!("Failed to read {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_activities(&path, found)?;
        } else if entry.file_name() == ACTIVITY_FILE {
            found.push(path);
        }
    }

    Ok(())
}

/// Escapes a value for a Java string literal
///
/// Control characters use octal escapes since `\u` escapes are decoded before
/// lexing.
fn java_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            other => out.push(other),
        }
    }
    out
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}
