//! Builder configuration
//!
//! Where the toolchain lives, which directories it works in, and how many
//! builds may use it at once.

use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::progress::{ProgressRules, ProgressWindow};

/// How the external toolchain is invoked: `<program> <script> <subcommand> ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Interpreter or binary, e.g. `bash`
    pub program: String,

    /// Toolchain entry script passed as the first argument
    pub script: PathBuf,
}

/// Builder configuration
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Directory everything else defaults relative to
    pub base_dir: PathBuf,

    /// Native project the toolchain builds (`PROJECT_ROOT`)
    pub project_root: PathBuf,

    /// Root of the per-job output directories
    pub output_dir: PathBuf,

    /// Toolchain download cache (`CACHE_DIR`)
    pub cache_dir: PathBuf,

    pub toolchain: ToolchainConfig,

    /// Optional JSON file replacing the built-in progress rules
    pub rules_path: Option<PathBuf>,

    /// Share of overall progress the build stage reports into
    pub build_window: ProgressWindow,

    /// Pipelines allowed to use the shared project at once
    pub max_parallel_builds: usize,
}

impl BuilderConfig {
    /// Creates a configuration with every directory under `base_dir`
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            project_root: base_dir.join("android_source"),
            output_dir: base_dir.join("output"),
            cache_dir: base_dir.join("cache"),
            toolchain: ToolchainConfig {
                program: "bash".to_string(),
                script: base_dir.join("make.sh"),
            },
            rules_path: None,
            build_window: ProgressWindow::BUILD_STAGE,
            max_parallel_builds: 1,
            base_dir,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - APKFORGE_BASE_DIR (optional, default: current directory)
    /// - APKFORGE_PROJECT_DIR (optional, default: <base>/android_source)
    /// - APKFORGE_OUTPUT_DIR (optional, default: <base>/output)
    /// - APKFORGE_CACHE_DIR (optional, default: <base>/cache)
    /// - APKFORGE_TOOL_PROGRAM (optional, default: bash)
    /// - APKFORGE_TOOL_SCRIPT (optional, default: <base>/make.sh)
    /// - APKFORGE_PROGRESS_RULES (optional, path to a JSON rules file)
    /// - APKFORGE_MAX_PARALLEL_BUILDS (optional, default: 1)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BuilderConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = match lookup("APKFORGE_BASE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        let mut config = Self::from_base_dir(base_dir);

        if let Some(dir) = lookup("APKFORGE_PROJECT_DIR") {
            config.project_root = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("APKFORGE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("APKFORGE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(program) = lookup("APKFORGE_TOOL_PROGRAM") {
            config.toolchain.program = program;
        }
        if let Some(script) = lookup("APKFORGE_TOOL_SCRIPT") {
            config.toolchain.script = PathBuf::from(script);
        }
        config.rules_path = lookup("APKFORGE_PROGRESS_RULES").map(PathBuf::from);

        if let Some(value) = lookup("APKFORGE_MAX_PARALLEL_BUILDS") {
            config.max_parallel_builds = value
                .parse()
                .with_context(|| format!("Invalid APKFORGE_MAX_PARALLEL_BUILDS: {}", value))?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.toolchain.program.trim().is_empty() {
            anyhow::bail!("toolchain program cannot be empty");
        }

        if self.max_parallel_builds == 0 {
            anyhow::bail!("max_parallel_builds must be greater than 0");
        }

        if self.output_dir == self.project_root {
            anyhow::bail!("output_dir must differ from project_root");
        }

        Ok(())
    }

    /// Loads the progress rules, falling back to the built-in Gradle table
    pub fn load_rules(&self) -> anyhow::Result<ProgressRules> {
        match &self.rules_path {
            Some(path) => ProgressRules::load(path)
                .with_context(|| format!("Failed to load progress rules from {}", path.display())),
            None => Ok(ProgressRules::gradle_release()),
        }
    }

    /// Creates the output and cache directories if missing
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.output_dir, &self.cache_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Output directory of one application
    pub fn app_output_dir(&self, app_id: &str) -> PathBuf {
        self.output_dir.join(app_id)
    }

    /// Root of the generated Java sources
    pub fn java_root(&self) -> PathBuf {
        self.project_root.join("app/src/main/java")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.project_root.join("app/src/main/assets")
    }

    pub fn script(&self) -> &Path {
        &self.toolchain.script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_follow_base_dir() {
        let config = BuilderConfig::from_lookup(lookup(&[("APKFORGE_BASE_DIR", "/srv/forge")]))
            .unwrap();

        assert_eq!(config.project_root, PathBuf::from("/srv/forge/android_source"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/forge/output"));
        assert_eq!(config.cache_dir, PathBuf::from("/srv/forge/cache"));
        assert_eq!(config.toolchain.program, "bash");
        assert_eq!(config.script(), Path::new("/srv/forge/make.sh"));
        assert_eq!(config.max_parallel_builds, 1);
        assert_eq!(config.build_window, ProgressWindow::new(50, 95).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = BuilderConfig::from_lookup(lookup(&[
            ("APKFORGE_BASE_DIR", "/srv/forge"),
            ("APKFORGE_PROJECT_DIR", "/opt/project"),
            ("APKFORGE_TOOL_PROGRAM", "sh"),
            ("APKFORGE_TOOL_SCRIPT", "/opt/toolchain.sh"),
            ("APKFORGE_PROGRESS_RULES", "/etc/rules.json"),
            ("APKFORGE_MAX_PARALLEL_BUILDS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.project_root, PathBuf::from("/opt/project"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/forge/output"));
        assert_eq!(config.toolchain.program, "sh");
        assert_eq!(config.script(), Path::new("/opt/toolchain.sh"));
        assert_eq!(config.rules_path, Some(PathBuf::from("/etc/rules.json")));
        assert_eq!(config.max_parallel_builds, 3);
    }

    #[test]
    fn test_invalid_parallelism() {
        assert!(
            BuilderConfig::from_lookup(lookup(&[("APKFORGE_MAX_PARALLEL_BUILDS", "many")]))
                .is_err()
        );

        let mut config = BuilderConfig::from_base_dir("/srv/forge");
        config.max_parallel_builds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuilderConfig::from_base_dir(dir.path());
        assert_eq!(config.load_rules().unwrap().len(), 20);

        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"[{"marker": "step", "checkpoint": 50}]"#).unwrap();
        config.rules_path = Some(path);
        assert_eq!(config.load_rules().unwrap().len(), 1);

        config.rules_path = Some(dir.path().join("missing.json"));
        assert!(config.load_rules().is_err());
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuilderConfig::from_base_dir(dir.path());
        config.ensure_dirs().unwrap();

        assert!(config.output_dir.is_dir());
        assert!(config.cache_dir.is_dir());
        assert_eq!(config.app_output_dir("demo"), dir.path().join("output/demo"));
    }
}
