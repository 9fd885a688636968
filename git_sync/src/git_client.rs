use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use util::paths::is_empty_dir;

use crate::{GitError, GitSync};

/// Settings for the git command line client.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Wall-clock limit for a single clone or pull.
    pub timeout: Duration,
    /// Program to invoke, `git` unless overridden.
    pub git_program: String,
}

impl GitConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            git_program: "git".to_string(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

/// Head commit of a working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for CommitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.sha.get(..7).unwrap_or(&self.sha);
        write!(
            f,
            "{} by {} on {}: {}",
            short,
            self.author_name,
            self.date.format("%Y-%m-%d %H:%M"),
            self.message
        )
    }
}

const FIELD_SEP: char = '\u{1f}';

/// Git client backed by the `git` executable.
///
/// Every invocation runs with terminal prompts, credential helpers, the SSH
/// agent and user SSH configuration disabled. When a private key is given it
/// is the only identity offered to the remote.
#[derive(Debug, Clone, Default)]
pub struct GitClient {
    config: GitConfig,
}

/// Temporary home for a private key; removed on drop.
struct SshIdentity {
    _dir: TempDir,
    key_path: PathBuf,
}

impl SshIdentity {
    fn write(private_key: &[u8]) -> Result<Self, GitError> {
        let dir = tempfile::Builder::new().prefix("git-key-").tempdir()?;
        let key_path = dir.path().join("id_assignment");

        let mut contents = private_key.to_vec();
        if !contents.ends_with(b"\n") {
            contents.push(b'\n');
        }
        std::fs::write(&key_path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self { _dir: dir, key_path })
    }
}

impl GitClient {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    fn ssh_command(identity: Option<&SshIdentity>) -> String {
        let identity_opt = match identity {
            Some(id) => format!(
                "-i {} -o IdentitiesOnly=yes",
                shell_escape::escape(id.key_path.to_string_lossy())
            ),
            None => "-o IdentityFile=none -o IdentitiesOnly=yes".to_string(),
        };
        format!(
            "ssh {identity_opt} -o IdentityAgent=none -o BatchMode=yes -F /dev/null \
             -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null -o ConnectTimeout=30"
        )
    }

    fn command(&self, identity: Option<&SshIdentity>) -> Command {
        let mut cmd = Command::new(&self.config.git_program);
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_SSH_COMMAND", Self::ssh_command(identity))
            .env_remove("SSH_AUTH_SOCK")
            .env_remove("SSH_ASKPASS")
            .arg("-c")
            .arg("credential.helper=")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Output, GitError> {
        let child = cmd.spawn()?;
        match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(GitError::RepositoryUnreachable(format!(
                "git did not finish within {}s",
                self.config.timeout.as_secs()
            ))),
        }
    }

    async fn head_commit(&self, destination: &Path) -> Result<Option<CommitInfo>, GitError> {
        let mut verify = self.command(None);
        verify
            .arg("-C")
            .arg(destination)
            .args(["rev-parse", "--verify", "--quiet", "HEAD"]);
        if !self.run(verify).await?.status.success() {
            return Ok(None);
        }

        let mut log = self.command(None);
        log.arg("-C")
            .arg(destination)
            .args(["log", "-1", "--format=%H%x1f%an%x1f%ae%x1f%at%x1f%s"]);
        let output = self.run(log).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        Ok(parse_commit_line(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl GitSync for GitClient {
    async fn clone_repository(
        &self,
        remote_url: &str,
        destination: &Path,
        private_key: Option<&[u8]>,
    ) -> Result<Option<CommitInfo>, GitError> {
        if !is_empty_dir(destination)? {
            return Err(GitError::AlreadyExists(destination.to_path_buf()));
        }
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let identity = private_key.map(SshIdentity::write).transpose()?;
        let mut cmd = self.command(identity.as_ref());
        cmd.arg("clone").arg("--").arg(remote_url).arg(destination);

        debug!("Cloning {} into {}", remote_url, destination.display());
        let output = self.run(cmd).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Clone of {} failed: {}", remote_url, stderr.trim());
            // git leaves an empty or partial directory behind on failure
            util::paths::remove_dir_if_exists(destination)?;
            return Err(classify_failure(&stderr));
        }

        let head = self.head_commit(destination).await?;
        info!(
            "Cloned {} to {} ({})",
            remote_url,
            destination.display(),
            head.as_ref().map(|c| c.sha.as_str()).unwrap_or("no commits")
        );
        Ok(head)
    }

    async fn pull(&self, destination: &Path, private_key: &[u8]) -> Result<CommitInfo, GitError> {
        if !destination.join(".git").exists() {
            return Err(GitError::MissingWorkingCopy(destination.to_path_buf()));
        }

        let identity = SshIdentity::write(private_key)?;
        let mut cmd = self.command(Some(&identity));
        cmd.arg("-C")
            .arg(destination)
            .args(["pull", "--ff-only", "origin", "HEAD"]);

        let output = self.run(cmd).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Pull in {} failed: {}", destination.display(), stderr.trim());
            return Err(classify_failure(&stderr));
        }

        self.head_commit(destination).await?.ok_or(GitError::NoCommitsYet)
    }

    async fn last_commit_info(&self, destination: &Path) -> Result<Option<CommitInfo>, GitError> {
        if !destination.join(".git").exists() {
            return Ok(None);
        }
        self.head_commit(destination).await
    }
}

/// Maps git's stderr to an error kind. The unborn-branch case is checked
/// first since it is also reported as a failed fetch.
pub fn classify_failure(stderr: &str) -> GitError {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().to_string();

    const UNBORN: &[&str] = &[
        "couldn't find remote ref",
        "no such ref was fetched",
        "does not have any commits yet",
        "unknown revision or path not in the working tree",
    ];
    const AUTH: &[&str] = &[
        "permission denied",
        "authentication failed",
        "auth fail",
        "could not read from remote repository",
        "could not read username",
        "repository not found",
        "host key verification failed",
        "invalid remote",
    ];
    const UNREACHABLE: &[&str] = &[
        "could not resolve hostname",
        "could not resolve host",
        "connection refused",
        "connection timed out",
        "operation timed out",
        "network is unreachable",
        "no route to host",
        "does not appear to be a git repository",
    ];

    if UNBORN.iter().any(|p| lower.contains(p)) {
        GitError::NoCommitsYet
    } else if UNREACHABLE.iter().any(|p| lower.contains(p)) && !lower.contains("permission denied") {
        GitError::RepositoryUnreachable(message)
    } else if AUTH.iter().any(|p| lower.contains(p)) {
        GitError::AuthenticationRequired(message)
    } else {
        GitError::Transport(message)
    }
}

fn parse_commit_line(stdout: &str) -> Option<CommitInfo> {
    let line = stdout.lines().next()?;
    let mut parts = line.splitn(5, FIELD_SEP);
    let sha = parts.next()?.to_string();
    let author_name = parts.next()?.to_string();
    let author_email = parts.next()?.to_string();
    let timestamp: i64 = parts.next()?.parse().ok()?;
    let message = parts.next().unwrap_or_default().to_string();
    let date = Utc.timestamp_opt(timestamp, 0).single()?;

    Some(CommitInfo {
        sha,
        author_name,
        author_email,
        date,
        message,
    })
}
