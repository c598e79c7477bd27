//! Shared fixtures: a throwaway workspace with a fake toolchain script

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use apkforge_core::domain::job::{Job, JobId};
use apkforge_runner::{
    BuildPipeline, BuilderConfig, ExternalToolRunner, InMemoryJobRegistry, JobRegistry,
    ProgressRules,
};
use tempfile::TempDir;

use crate::state::AppState;

/// `apk` reads the app id from the descriptor and produces `<id>.apk`
pub const APK_OK: &str = r#"
echo "> Task :app:preBuild"
echo "> Task :app:packageRelease"
echo "BUILD SUCCESSFUL in 2s"
while read -r key sep value; do
  if [ "$key" = "id" ]; then APP="$value"; fi
done < "$OUTPUT_DIR/webapk.conf"
printf 'PK-fake-apk' > "$OUTPUT_DIR/$APP.apk"
"#;

pub const APK_FAILS: &str = r#"
echo "> Task :app:preBuild"
echo "FAILURE: Build failed with an exception." >&2
exit 1
"#;

pub struct Workspace {
    pub dir: TempDir,
    pub registry: Arc<InMemoryJobRegistry>,
    pub state: AppState,
}

pub fn workspace(apk_body: &str) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let config = builder_config(dir.path(), apk_body);

    let registry = Arc::new(InMemoryJobRegistry::new());
    let pipeline = BuildPipeline::new(
        Arc::new(config),
        Arc::new(ProgressRules::gradle_release()),
        registry.clone(),
        ExternalToolRunner::new(),
    );
    let state = AppState::new(pipeline, Duration::from_millis(20));

    Workspace {
        dir,
        registry,
        state,
    }
}

pub fn builder_config(dir: &Path, apk_body: &str) -> BuilderConfig {
    let script = format!(
        r#"
case "$1" in
  clean) exit 1 ;;
  apply_config) test -f "$2" || exit 2 ;;
  apk)
{apk_body}
    ;;
esac
"#
    );
    let script_path = dir.join("make.sh");
    std::fs::write(&script_path, script).unwrap();

    let mut config = BuilderConfig::from_base_dir(dir);
    config.toolchain.program = "sh".to_string();
    config.toolchain.script = script_path;
    config.ensure_dirs().unwrap();
    config
}

/// Polls until the job reaches a terminal status
pub async fn wait_terminal(registry: &dyn JobRegistry, id: JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let job = registry.get(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("build did not finish in time")
}
