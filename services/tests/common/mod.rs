#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use code_runner::{BuildExecutor, BuildReport, RunnerError, UnitTestOutcome, ValidationPolicy};
use db::models::assignment::{Language, SubmissionMethod};
use db::test_utils::setup_test_db;
use git_sync::{CommitInfo, GitError, GitSync};
use sea_orm::DatabaseConnection;
use services::{AssignmentForm, AssignmentService};
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};
use util::paths::{StoragePaths, is_empty_dir};
use util::test_helpers::{setup_test_storage, write_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneBehavior {
    Succeed,
    NeedsAuth,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullBehavior {
    Succeed,
    NoCommits,
}

/// In-memory stand-in for the git CLI. A successful clone writes `files`
/// plus an empty `.git` directory into the destination.
pub struct FakeGit {
    clone_behavior: Mutex<CloneBehavior>,
    pull_behavior: Mutex<PullBehavior>,
    files: Mutex<Vec<(String, String)>>,
    keys_seen: Mutex<Vec<Option<Vec<u8>>>>,
    clone_calls: AtomicUsize,
    pull_calls: AtomicUsize,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            clone_behavior: Mutex::new(CloneBehavior::Succeed),
            pull_behavior: Mutex::new(PullBehavior::Succeed),
            files: Mutex::new(vec![
                ("pom.xml".into(), "<project/>".into()),
                ("src/main/java/org/example/Main.java".into(), "class Main {}".into()),
                ("src/test/java/org/example/TestTeacherMain.java".into(), "class T {}".into()),
            ]),
            keys_seen: Mutex::new(Vec::new()),
            clone_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_clone(&self, behavior: CloneBehavior) {
        *self.clone_behavior.lock().unwrap() = behavior;
    }

    pub fn set_pull(&self, behavior: PullBehavior) {
        *self.pull_behavior.lock().unwrap() = behavior;
    }

    pub fn add_file(&self, path: &str, contents: &str) {
        self.files.lock().unwrap().push((path.into(), contents.into()));
    }

    pub fn clone_calls(&self) -> usize {
        self.clone_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn last_key(&self) -> Option<Vec<u8>> {
        self.keys_seen.lock().unwrap().last().cloned().flatten()
    }
}

pub fn commit(message: &str) -> CommitInfo {
    CommitInfo {
        sha: "0123456789abcdef0123456789abcdef01234567".into(),
        author_name: "Teacher".into(),
        author_email: "teacher@example.com".into(),
        date: Utc::now(),
        message: message.into(),
    }
}

#[async_trait]
impl GitSync for FakeGit {
    async fn clone_repository(
        &self,
        _remote_url: &str,
        destination: &Path,
        private_key: Option<&[u8]>,
    ) -> Result<Option<CommitInfo>, GitError> {
        self.clone_calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen
            .lock()
            .unwrap()
            .push(private_key.map(<[u8]>::to_vec));

        if !is_empty_dir(destination)? {
            return Err(GitError::AlreadyExists(destination.to_path_buf()));
        }

        let behavior = *self.clone_behavior.lock().unwrap();
        match behavior {
            CloneBehavior::NeedsAuth => Err(GitError::AuthenticationRequired(
                "git@github.com: Permission denied (publickey).".into(),
            )),
            CloneBehavior::Unreachable => Err(GitError::RepositoryUnreachable(
                "ssh: Could not resolve hostname nowhere".into(),
            )),
            CloneBehavior::Succeed => {
                let files = self.files.lock().unwrap().clone();
                for (path, contents) in files {
                    write_file(destination, &path, &contents);
                }
                std::fs::create_dir_all(destination.join(".git"))?;
                Ok(Some(commit("Initial commit")))
            }
        }
    }

    async fn pull(&self, destination: &Path, _private_key: &[u8]) -> Result<CommitInfo, GitError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if !destination.join(".git").exists() {
            return Err(GitError::MissingWorkingCopy(destination.to_path_buf()));
        }

        let behavior = *self.pull_behavior.lock().unwrap();
        match behavior {
            PullBehavior::NoCommits => Err(GitError::NoCommitsYet),
            PullBehavior::Succeed => Ok(commit("Update tests")),
        }
    }

    async fn last_commit_info(&self, destination: &Path) -> Result<Option<CommitInfo>, GitError> {
        if destination.join(".git").exists() {
            Ok(Some(commit("Initial commit")))
        } else {
            Ok(None)
        }
    }
}

/// Returns a canned report. `None` simulates a timed out build. After
/// [`FakeExecutor::hold`] builds park until [`FakeExecutor::release`].
pub struct FakeExecutor {
    report: Mutex<Option<BuildReport>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    started: Notify,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            report: Mutex::new(Some(clean_report())),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            started: Notify::new(),
        }
    }

    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    /// Resolves once a build has started.
    pub async fn build_started(&self) {
        self.started.notified().await;
    }

    pub fn set_report(&self, report: Option<BuildReport>) {
        *self.report.lock().unwrap() = report;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for FakeExecutor {
    async fn check_assignment(
        &self,
        _project_dir: &Path,
        _policy: &ValidationPolicy,
        _acting_user: Option<&str>,
    ) -> Result<Option<BuildReport>, RunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // closed on release, which wakes every parked build
            let _ = gate.acquire().await;
        }

        let report = self.report.lock().unwrap().clone();
        Ok(report)
    }
}

pub fn clean_report() -> BuildReport {
    BuildReport {
        output: "[INFO] Tests run: 2, Failures: 0, Errors: 0, Skipped: 0\n[INFO] BUILD SUCCESS".into(),
        compilation_errors: Vec::new(),
        checkstyle_errors: Vec::new(),
        unit_tests: UnitTestOutcome::Passed,
    }
}

pub fn form(id: &str) -> AssignmentForm {
    AssignmentForm {
        assignment_id: id.into(),
        name: format!("Assignment {id}"),
        package_name: Some("org.example".into()),
        language: Language::Java,
        due_date: None,
        submission_method: SubmissionMethod::Upload,
        git_repository_url: format!("git@github.com:teacher/{id}.git"),
        accepts_student_tests: false,
        min_student_tests: None,
        cooloff_period: None,
        acl: None,
        assignees: None,
    }
}

pub struct Harness {
    pub service: AssignmentService,
    pub git: Arc<FakeGit>,
    pub executor: Arc<FakeExecutor>,
    pub db: DatabaseConnection,
    pub paths: StoragePaths,
    _tmp: TempDir,
}

pub async fn harness() -> Harness {
    let db = setup_test_db().await;
    let (tmp, paths) = setup_test_storage();
    let git = Arc::new(FakeGit::new());
    let executor = Arc::new(FakeExecutor::new());
    let service = AssignmentService::new(db.clone(), paths.clone(), git.clone(), executor.clone());

    Harness {
        service,
        git,
        executor,
        db,
        paths,
        _tmp: tmp,
    }
}
