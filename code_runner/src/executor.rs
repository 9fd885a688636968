use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use util::execution_config::{ExecutionConfig, RunnerKind};
use util::paths::StoragePaths;
use uuid::Uuid;

use crate::build_report::BuildReport;
use crate::error::RunnerError;
use crate::materialize::{CopyPolicy, materialize};
use crate::validate_files::ValidationPolicy;

/// Runs an isolated build+test of a project directory.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Returns `Ok(None)` when the run exceeded its time limit. That is an
    /// expected outcome, not an error.
    async fn check_assignment(
        &self,
        project_dir: &Path,
        policy: &ValidationPolicy,
        acting_user: Option<&str>,
    ) -> Result<Option<BuildReport>, RunnerError>;
}

/// Maven-driven executor. Each check works on a fresh mavenized copy of the
/// project that is deleted once the run is over.
pub struct MavenExecutor {
    config: ExecutionConfig,
    paths: StoragePaths,
}

impl MavenExecutor {
    pub fn new(config: ExecutionConfig, paths: StoragePaths) -> Self {
        Self { config, paths }
    }

    async fn run_local(&self, workdir: &Path) -> Result<Option<Output>, RunnerError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.config.build_command)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group so the whole tree (mvn, forked JVMs) can be killed at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| RunnerError::Spawn(e.to_string()))?;
        let pid = child.id();

        match timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(output) => Ok(Some(output?)),
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                Ok(None)
            }
        }
    }

    async fn run_docker(&self, workdir: &Path) -> Result<Option<Output>, RunnerError> {
        let container = format!("assignment-check-{}", Uuid::new_v4());
        let owner = fs::metadata(workdir).await?;
        let args = docker_run_args(&self.config, workdir, &container, (owner.uid(), owner.gid()));

        let child = Command::new("docker")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Spawn(e.to_string()))?;

        match timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(output) => Ok(Some(output?)),
            Err(_) => {
                let killed = Command::new("docker")
                    .arg("kill")
                    .arg(&container)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                if let Err(e) = killed {
                    warn!("Failed to kill container {}: {}", container, e);
                }
                Ok(None)
            }
        }
    }
}

/// Arguments for `docker run`. The container runs as the owner of the
/// mounted directory so everything the build writes stays removable.
fn docker_run_args(config: &ExecutionConfig, workdir: &Path, container: &str, owner: (u32, u32)) -> Vec<String> {
    vec![
        "run".into(),
        "--rm".into(),
        "--network=none".into(),
        "--security-opt=no-new-privileges".into(),
        "--user".into(),
        format!("{}:{}", owner.0, owner.1),
        "--env".into(),
        "HOME=/tmp".into(),
        "--env".into(),
        "MAVEN_OPTS=-Duser.home=/tmp".into(),
        "--name".into(),
        container.to_string(),
        "-v".into(),
        format!("{}:/project", workdir.display()),
        "-w".into(),
        "/project".into(),
        config.docker_image.clone(),
        "sh".into(),
        "-c".into(),
        config.build_command.clone(),
    ]
}

#[async_trait]
impl BuildExecutor for MavenExecutor {
    async fn check_assignment(
        &self,
        project_dir: &Path,
        policy: &ValidationPolicy,
        acting_user: Option<&str>,
    ) -> Result<Option<BuildReport>, RunnerError> {
        let mavenized = self.paths.assignment_mavenized_dir(&policy.folder);
        materialize(project_dir, &mavenized, CopyPolicy::TeacherValidation).await?;

        info!(
            "[{}] Checking assignment in {} ({:?} runner, requested by {})",
            policy.assignment_id,
            mavenized.display(),
            self.config.runner,
            acting_user.unwrap_or("system")
        );

        let started = Instant::now();
        let result = match self.config.runner {
            RunnerKind::Local => self.run_local(&mavenized).await,
            RunnerKind::Docker => self.run_docker(&mavenized).await,
        };

        if let Err(e) = discard(&mavenized).await {
            warn!(
                "[{}] Could not remove {}: {}",
                policy.assignment_id,
                mavenized.display(),
                e
            );
        }

        let Some(output) = result? else {
            warn!(
                "[{}] Build aborted after {}s timeout",
                policy.assignment_id, self.config.timeout_secs
            );
            return Ok(None);
        };

        debug!(
            "[{}] Build exited with {:?} after {:?}",
            policy.assignment_id,
            output.status.code(),
            started.elapsed()
        );

        let report = BuildReport::parse(combined_output(&output), policy.language);
        info!(
            "[{}] Build finished: {} compilation errors, {} checkstyle errors, tests {:?}",
            policy.assignment_id,
            report.compilation_errors.len(),
            report.checkstyle_errors.len(),
            report.unit_tests
        );
        Ok(Some(report))
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

async fn discard(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn kill_process_group(pgid: u32) {
    let result = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        warn!("Failed to kill process group {}: {}", pgid, e);
    }
}
