//! Build pipeline
//!
//! Takes one [`BuildRequest`] through the ordered stages of a build:
//!
//! 1. prepare the web content and icon
//! 2. clean previous build output (failures ignored)
//! 3. write the app descriptor and fold it into the native project
//! 4. rewrite the generated sources
//! 5. run the build, estimating progress from its output
//! 6. verify the package exists
//!
//! Every stage reports to the [`JobRegistry`]; the first failing stage ends
//! the job in `error`. All pipelines share one native project, so runs are
//! gated by a build-slot semaphore.

mod error;
mod generate;
mod source;

pub use error::{PipelineError, TOOL_FAILURE_MESSAGE};
pub use generate::{SourceValues, render_activity, render_gradle, render_strings, write_sources};
pub use source::{AppEntry, ContentPreparer, preparer_for};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use apkforge_core::domain::build::BuildRequest;
use apkforge_core::domain::job::{ArtifactRef, JobId, JobUpdate};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::BuilderConfig;
use crate::progress::{ProgressEstimator, ProgressRules};
use crate::repository::JobRegistry;
use crate::tool::{ExternalToolRunner, ToolCommand, ToolError};

pub const ICON_FILENAME: &str = "icon.png";
pub const DESCRIPTOR_FILENAME: &str = "webapk.conf";
pub const WAITING_MESSAGE: &str = "Waiting for a build slot...";
pub const DONE_MESSAGE: &str = "Done!";

/// Fixed stages of a build, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    ConfigureGit,
    Clean,
    Configure,
    Generate,
    Build,
    Verify,
    Finalize,
}

impl Stage {
    /// Overall progress reported when the stage starts
    pub fn progress(self) -> u8 {
        match self {
            Stage::Prepare => 5,
            Stage::ConfigureGit => 10,
            Stage::Clean => 20,
            Stage::Configure => 30,
            Stage::Generate => 45,
            Stage::Build => 50,
            Stage::Verify => 96,
            Stage::Finalize => 98,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Prepare => "Preparing assets...",
            Stage::ConfigureGit => "Configuring Git repository...",
            Stage::Clean => "Cleaning previous builds...",
            Stage::Configure => "Configuring project...",
            Stage::Generate => "Injecting source code...",
            Stage::Build => "Building APK...",
            Stage::Verify => "Verifying APK...",
            Stage::Finalize => "Finalizing...",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::ConfigureGit => "configure_git",
            Stage::Clean => "clean",
            Stage::Configure => "configure",
            Stage::Generate => "generate",
            Stage::Build => "build",
            Stage::Verify => "verify",
            Stage::Finalize => "finalize",
        }
    }
}

/// Runs build requests through the toolchain
#[derive(Clone)]
pub struct BuildPipeline {
    config: Arc<BuilderConfig>,
    rules: Arc<ProgressRules>,
    registry: Arc<dyn JobRegistry>,
    tool: ExternalToolRunner,
    slots: Arc<Semaphore>,
}

impl BuildPipeline {
    pub fn new(
        config: Arc<BuilderConfig>,
        rules: Arc<ProgressRules>,
        registry: Arc<dyn JobRegistry>,
        tool: ExternalToolRunner,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_parallel_builds.max(1)));
        Self {
            config,
            rules,
            registry,
            tool,
            slots,
        }
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    /// Runs one job to a terminal state
    ///
    /// Never returns an error: every failure is recorded on the job itself.
    pub async fn run(&self, job_id: JobId, request: BuildRequest) {
        let span = info_span!("build", %job_id, app_id = %request.app_id, source = request.source.kind());
        self.run_job(job_id, request).instrument(span).await
    }

    async fn run_job(&self, job_id: JobId, request: BuildRequest) {
        self.report(job_id, JobUpdate::message(WAITING_MESSAGE));

        let outcome = match self.slots.clone().acquire_owned().await {
            Ok(_permit) => {
                debug!("Acquired build slot");
                self.execute(job_id, request).await
            }
            Err(_) => Err(PipelineError::SlotUnavailable),
        };

        match outcome {
            Ok(artifact) => info!(path = %artifact.path.display(), "Build complete"),
            Err(e) => {
                error!("Build failed: {}", e);
                self.report(job_id, JobUpdate::failed(e.user_message(), e.diagnostic()));
            }
        }
    }

    async fn execute(
        &self,
        job_id: JobId,
        request: BuildRequest,
    ) -> Result<ArtifactRef, PipelineError> {
        let BuildRequest {
            app_id,
            name,
            icon,
            source,
        } = request;
        let app_dir = self.config.app_output_dir(&app_id);

        self.advance(job_id, Stage::Prepare, true)?;
        tokio::fs::create_dir_all(&app_dir)
            .await
            .map_err(|e| PipelineError::io("Failed to create output directory", e))?;
        tokio::fs::write(app_dir.join(ICON_FILENAME), &icon)
            .await
            .map_err(|e| PipelineError::io("Failed to write icon", e))?;

        let preparer = preparer_for(source);
        if let Some(stage) = preparer.stage() {
            self.advance(job_id, stage, false)?;
        }
        let entry = preparer.prepare(&self.config.assets_dir()).await?;

        self.advance(job_id, Stage::Clean, false)?;
        if let Err(e) = self.tool.run(&self.toolchain("clean")).await {
            debug!("Ignoring clean failure: {}", e);
        }

        self.advance(job_id, Stage::Configure, false)?;
        let descriptor = app_dir.join(DESCRIPTOR_FILENAME);
        tokio::fs::write(&descriptor, render_descriptor(&app_id, &name))
            .await
            .map_err(|e| PipelineError::io("Failed to write app descriptor", e))?;
        self.tool
            .run(&self.toolchain("apply_config").arg(descriptor.display().to_string()))
            .await?;

        self.advance(job_id, Stage::Generate, false)?;
        let project_root = self.config.project_root.clone();
        let generate_app_id = app_id.clone();
        tokio::task::spawn_blocking(move || {
            write_sources(
                &project_root,
                SourceValues {
                    app_id: &generate_app_id,
                    name: &name,
                    entry: &entry,
                },
            )
        })
        .await
        .map_err(|e| PipelineError::io("Source generation task failed", std::io::Error::other(e)))??;

        self.advance(job_id, Stage::Build, false)?;
        self.build(job_id, &app_dir).await?;

        self.advance(job_id, Stage::Verify, false)?;
        let apk = artifact_path(&self.config.output_dir, &app_id);
        if !tokio::fs::try_exists(&apk).await.unwrap_or(false) {
            return Err(PipelineError::ArtifactMissing(apk));
        }

        self.advance(job_id, Stage::Finalize, false)?;
        let artifact = ArtifactRef {
            path: apk,
            filename: format!("{}_release.apk", app_id),
        };
        self.registry
            .update(job_id, JobUpdate::complete(artifact.clone(), DONE_MESSAGE))?;

        Ok(artifact)
    }

    /// Streams the build through the estimator
    async fn build(&self, job_id: JobId, app_dir: &Path) -> Result<(), PipelineError> {
        let command = self
            .toolchain("apk")
            .env("OUTPUT_DIR", app_dir.display().to_string());
        let mut stream = self.tool.stream(&command)?;
        let mut transcript = self.tool.transcript();
        let mut estimator = ProgressEstimator::new(&self.rules, self.config.build_window);

        while let Some(line) = stream.next_line().await {
            if let Some(update) = estimator.observe(&line) {
                self.registry.update(job_id, update.into_job_update())?;
            }
            transcript.push(line);
        }

        let command = stream.command().to_string();
        let status = stream.wait().await?;
        if !status.success() {
            warn!(code = ?status.code(), "Build tool failed");
            return Err(ToolError::Failure {
                command,
                code: status.code(),
                output: transcript.into_string(),
            }
            .into());
        }

        Ok(())
    }

    /// `<program> <script> <subcommand>` with the toolchain environment
    fn toolchain(&self, subcommand: &str) -> ToolCommand {
        ToolCommand::new(&self.config.toolchain.program)
            .arg(self.config.script().display().to_string())
            .arg(subcommand)
            .current_dir(&self.config.base_dir)
            .env("PROJECT_ROOT", self.config.project_root.display().to_string())
            .env("CACHE_DIR", self.config.cache_dir.display().to_string())
    }

    fn advance(&self, job_id: JobId, stage: Stage, first: bool) -> Result<(), PipelineError> {
        info!(stage = stage.name(), "Entering stage");
        let update = if first {
            JobUpdate::started(stage.progress(), stage.message())
        } else {
            JobUpdate::progress(stage.progress(), stage.message())
        };
        self.registry.update(job_id, update)?;
        Ok(())
    }

    /// Best-effort registry write outside the stage sequence
    fn report(&self, job_id: JobId, update: JobUpdate) {
        if let Err(e) = self.registry.update(job_id, update) {
            warn!("Failed to record job update: {}", e);
        }
    }
}

/// `webapk.conf` contents consumed by `apply_config`
pub fn render_descriptor(app_id: &str, name: &str) -> String {
    format!(
        "id = {}\nname = {}\nicon = {}\n",
        app_id, name, ICON_FILENAME
    )
}

/// Package the build stage is expected to produce
pub fn artifact_path(output_dir: &Path, app_id: &str) -> PathBuf {
    output_dir.join(app_id).join(format!("{}.apk", app_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryJobRegistry;
    use apkforge_core::domain::build::ContentSource;
    use apkforge_core::domain::job::JobStatus;
    use uuid::Uuid;

    const APK_OK: &str = r#"
echo "> Task :app:preBuild"
echo "Download https://dl.google.com/dl/android/maven2/x.pom"
echo "> Task :app:mergeDexRelease"
echo "BUILD SUCCESSFUL in 3s"
while read -r key sep value; do
  if [ "$key" = "id" ]; then APP="$value"; fi
done < "$OUTPUT_DIR/webapk.conf"
touch "$OUTPUT_DIR/$APP.apk"
"#;

    const APK_FAILS: &str = r#"
echo "> Task :app:preBuild"
echo "> Task :app:compileReleaseJavaWithJavac"
echo "error: cannot find symbol" >&2
exit 1
"#;

    const APK_NO_OUTPUT: &str = r#"
echo "BUILD SUCCESSFUL in 1s"
"#;

    /// Writes a toolchain script whose `apk` subcommand runs `apk_body`
    fn toolchain_script(dir: &Path, apk_body: &str) -> PathBuf {
        let script = format!(
            r#"
case "$1" in
  clean)
    echo "nothing to clean"
    exit 1
    ;;
  apply_config)
    test -f "$2" || exit 2
    test -n "$PROJECT_ROOT" || exit 3
    ;;
  apk)
{apk_body}
    ;;
esac
"#
        );
        let path = dir.join("make.sh");
        std::fs::write(&path, script).unwrap();
        path
    }

    fn pipeline(dir: &Path, apk_body: &str) -> (BuildPipeline, Arc<InMemoryJobRegistry>) {
        let mut config = BuilderConfig::from_base_dir(dir);
        config.toolchain.program = "sh".to_string();
        config.toolchain.script = toolchain_script(dir, apk_body);
        config.ensure_dirs().unwrap();

        let registry = Arc::new(InMemoryJobRegistry::new());
        let pipeline = BuildPipeline::new(
            Arc::new(config),
            Arc::new(ProgressRules::gradle_release()),
            registry.clone(),
            ExternalToolRunner::new(),
        );
        (pipeline, registry)
    }

    fn request() -> BuildRequest {
        BuildRequest {
            app_id: "demo".to_string(),
            name: "Demo".to_string(),
            icon: vec![0x89, b'P', b'N', b'G'],
            source: ContentSource::Url("https://example.com".to_string()),
        }
    }

    #[test]
    fn test_stages_ascend() {
        let stages = [
            Stage::Prepare,
            Stage::ConfigureGit,
            Stage::Clean,
            Stage::Configure,
            Stage::Generate,
            Stage::Build,
            Stage::Verify,
            Stage::Finalize,
        ];
        assert!(stages.windows(2).all(|w| w[0].progress() < w[1].progress()));
    }

    #[test]
    fn test_descriptor() {
        assert_eq!(
            render_descriptor("demo", "Demo App"),
            "id = demo\nname = Demo App\nicon = icon.png\n"
        );
        assert_eq!(
            artifact_path(Path::new("/out"), "demo"),
            PathBuf::from("/out/demo/demo.apk")
        );
    }

    #[tokio::test]
    async fn test_successful_build_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, registry) = pipeline(dir.path(), APK_OK);
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        pipeline.run(id, request()).await;

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Complete, "{:?}", job);
        assert_eq!(job.progress, 100);
        assert_eq!(job.message, "Done!");

        let artifact = job.result.unwrap();
        assert_eq!(artifact.filename, "demo_release.apk");
        assert_eq!(artifact.path, artifact_path(&dir.path().join("output"), "demo"));
        assert!(artifact.path.exists());
        assert!(dir.path().join("output/demo/icon.png").exists());
        assert!(
            dir.path()
                .join("android_source/app/src/main/java/com/demo/htpk/MainActivity.java")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_tool_failure_freezes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, registry) = pipeline(dir.path(), APK_FAILS);
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        pipeline.run(id, request()).await;

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.message, TOOL_FAILURE_MESSAGE);
        // compileReleaseJavaWithJavac: 50 + 45 * 45 / 100
        assert_eq!(job.progress, 70);

        let detail = job.error_detail.unwrap();
        assert!(detail.starts_with("Command failed: sh "), "{}", detail);
        assert!(detail.contains("error: cannot find symbol"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, registry) = pipeline(dir.path(), APK_NO_OUTPUT);
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        pipeline.run(id, request()).await;

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.message.starts_with("Error: APK build failed"));
        assert_eq!(job.progress, 96);
    }

    #[tokio::test]
    async fn test_missing_toolchain_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, registry) = pipeline(dir.path(), APK_OK);
        let mut config = (*pipeline.config).clone();
        config.toolchain.program = "apkforge-no-such-program".to_string();
        let pipeline = BuildPipeline::new(
            Arc::new(config),
            pipeline.rules.clone(),
            registry.clone(),
            ExternalToolRunner::new(),
        );
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        pipeline.run(id, request()).await;

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.message.starts_with("Error: failed to launch"));
        // clean is best-effort, so the launch failure surfaces at configure
        assert_eq!(job.progress, Stage::Configure.progress());
    }

    #[tokio::test]
    async fn test_invalid_git_url_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, registry) = pipeline(dir.path(), APK_OK);
        let id = Uuid::new_v4();
        registry.create(id).unwrap();

        let mut request = request();
        request.source = ContentSource::Git(apkforge_core::domain::build::GitReference {
            url: "https://github.com/lonely".to_string(),
            branch: "main".to_string(),
            entry: "index.html".to_string(),
        });
        pipeline.run(id, request).await;

        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_detail.as_deref(), Some("Invalid repository URL: https://github.com/lonely"));
        assert_eq!(job.progress, Stage::ConfigureGit.progress());
    }
}
