use std::path::{Path, PathBuf};
use std::sync::Arc;

use code_runner::{
    BuildExecutor, CopyPolicy, MavenExecutor, Validation, ValidationPolicy, build_package_tree, instructions_fragment,
    materialize, validate,
};
use db::models::assignment::AccessLists;
use db::models::{assignee, assignment, assignment_acl, build_report, git_submission, submission};
use git_sync::key_pair::generate_key_pair;
use git_sync::repo_url::{github_deploy_keys_url, is_ssh_url};
use git_sync::{CommitInfo, GitClient, GitConfig, GitError, GitSync};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};
use util::config::AppConfig;
use util::paths::{StoragePaths, remove_dir_if_exists};

use crate::access::{can_access, can_manage, is_owner};
use crate::error::AppError;
use crate::forms::AssignmentForm;
use crate::state::AssignmentState;
use crate::sync_lock::SyncLocks;

/// Result of registering a new assignment.
#[derive(Debug)]
pub enum RegisterOutcome {
    /// The repository was cloned without credentials.
    Connected {
        assignment: assignment::Model,
        head: Option<CommitInfo>,
    },
    /// The remote wants credentials: run [`AssignmentService::setup_git`] and
    /// add the public key to the repository before connecting.
    NeedsGitSetup { assignment: assignment::Model },
}

#[derive(Debug, Clone)]
pub struct GitSetup {
    pub public_key: String,
    /// Where the deploy key must be added, for GitHub repositories.
    pub deploy_keys_url: Option<String>,
}

#[derive(Debug)]
pub struct ConnectOutcome {
    pub head: Option<CommitInfo>,
    pub validation: Validation,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub head: CommitInfo,
    /// Git submissions whose cached report was invalidated.
    pub cleared_submissions: u64,
}

#[derive(Debug, Clone)]
pub struct AssignmentSummary {
    pub assignment: assignment::Model,
    pub state: AssignmentState,
    pub num_submissions: u64,
    pub num_unique_submitters: u64,
    pub public: bool,
}

#[derive(Debug, Clone)]
pub struct AssignmentDetail {
    pub assignment: assignment::Model,
    pub state: AssignmentState,
    pub assignees: Vec<assignee::Model>,
    pub acl: Vec<assignment_acl::Model>,
    /// `None` until git access is configured and the repository is on disk.
    pub last_commit: Option<String>,
    pub build_report: Option<build_report::Model>,
    pub package_tree: String,
    pub instructions: String,
}

/// Registration, git synchronization and validation of teacher assignments.
///
/// Every flow that touches an assignment's working directory holds that
/// assignment's sync lock for its whole duration.
pub struct AssignmentService {
    db: DatabaseConnection,
    paths: StoragePaths,
    git: Arc<dyn GitSync>,
    executor: Arc<dyn BuildExecutor>,
    locks: SyncLocks,
}

impl AssignmentService {
    pub fn new(
        db: DatabaseConnection,
        paths: StoragePaths,
        git: Arc<dyn GitSync>,
        executor: Arc<dyn BuildExecutor>,
    ) -> Self {
        Self {
            db,
            paths,
            git,
            executor,
            locks: SyncLocks::new(),
        }
    }

    /// Wires the `git` CLI client and the Maven executor from configuration.
    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> Self {
        let paths = config.storage_paths();
        let git = GitClient::new(GitConfig::new(config.git_timeout()));
        let executor = MavenExecutor::new(config.execution_config(), paths.clone());
        Self::new(db, paths, Arc::new(git), Arc::new(executor))
    }

    pub async fn register_assignment(
        &self,
        principal: &str,
        form: AssignmentForm,
    ) -> Result<RegisterOutcome, AppError> {
        form.check()?;
        let id = form.assignment_id.clone();
        let _guard = self.locks.acquire(&id).await;

        if assignment::Model::exists(&self.db, &id).await? {
            warn!("An assignment already exists with this ID: {}", id);
            return Err(AppError::validation(
                "assignment_id",
                "An assignment already exists with this ID",
            ));
        }

        let url = form.git_repository_url.trim();
        if !is_ssh_url(url) {
            warn!("[{}] Invalid git repository url: {}", id, url);
            return Err(AppError::validation(
                "git_repository_url",
                "Only SSH style urls are accepted (must start with 'git@')",
            ));
        }

        let directory = self.paths.assignment_dir(&id);
        let cloned = match self.git.clone_repository(url, &directory, None).await {
            Ok(head) => {
                info!("[{}] Successfully cloned {} to {}", id, url, directory.display());
                Some(head)
            }
            Err(GitError::AuthenticationRequired(reason)) | Err(GitError::Transport(reason)) => {
                info!("[{}] Cloning {} needs git credentials: {}", id, url, reason);
                None
            }
            Err(e) => {
                warn!("[{}] Error cloning {} - {}", id, url, e);
                return Err(AppError::validation(
                    "git_repository_url",
                    "Error cloning git repository. Are you sure the url is right?",
                ));
            }
        };

        let acl = form.acl_user_ids();
        let assignees = form.assignee_ids();
        let assignment = assignment::Model::create_with_access_lists(
            &self.db,
            &id,
            principal,
            url,
            form.details(),
            AccessLists {
                acl: acl.as_deref(),
                assignees: &assignees,
            },
        )
        .await?;
        info!("[{}] Assignment created by {}", id, principal);

        Ok(match cloned {
            Some(head) => RegisterOutcome::Connected { assignment, head },
            None => RegisterOutcome::NeedsGitSetup { assignment },
        })
    }

    /// Edits everything except the repository url, which is fixed at creation.
    pub async fn update_assignment(
        &self,
        principal: &str,
        form: AssignmentForm,
    ) -> Result<assignment::Model, AppError> {
        form.check()?;
        let _guard = self.locks.acquire(&form.assignment_id).await;
        let (existing, _) = self.load_managed(principal, &form.assignment_id).await?;

        if existing.git_repository_url != form.git_repository_url.trim() {
            warn!("[{}] Git repository cannot be changed", existing.id);
            return Err(AppError::Integrity("Git repository cannot be changed.".into()));
        }

        let acl = form.acl_user_ids();
        let assignees = form.assignee_ids();
        let updated = assignment::Model::update_with_access_lists(
            &self.db,
            &existing.id,
            form.details(),
            AccessLists {
                acl: acl.as_deref(),
                assignees: &assignees,
            },
        )
        .await?;
        info!("[{}] Assignment updated by {}", existing.id, principal);
        Ok(updated)
    }

    /// Generates the assignment's key-pair unless it already has one.
    pub async fn setup_git(&self, principal: &str, id: &str) -> Result<GitSetup, AppError> {
        let _guard = self.locks.acquire(id).await;
        let mut assignment = self.load(id).await?;
        Self::require_owner(principal, &assignment)?;

        if !assignment.has_key_pair() {
            let pair = generate_key_pair()?;
            let private_key = String::from_utf8_lossy(&pair.private_key).into_owned();
            let public_key = String::from_utf8_lossy(&pair.public_key).into_owned();
            assignment = assignment::Model::set_key_pair(&self.db, id, &private_key, &public_key).await?;
            info!("[{}] Generated git key pair", id);
        }

        Ok(GitSetup {
            public_key: assignment.git_repository_pub_key.clone().unwrap_or_default(),
            deploy_keys_url: github_deploy_keys_url(&assignment.git_repository_url),
        })
    }

    /// Fresh clone with the assignment's key, followed by a validation run.
    pub async fn connect_git_repository(&self, principal: &str, id: &str) -> Result<ConnectOutcome, AppError> {
        let _guard = self.locks.acquire(id).await;
        let assignment = self.load(id).await?;
        Self::require_owner(principal, &assignment)?;

        let url = assignment.git_repository_url.clone();
        if !is_ssh_url(&url) {
            return Err(AppError::validation(
                "git_repository_url",
                "Only SSH style urls are accepted (must start with 'git@')",
            ));
        }
        let Some(private_key) = assignment.private_key_bytes() else {
            warn!("[{}] Connect requested before key generation", id);
            return Err(AppError::MissingKeyPair(id.to_string()));
        };

        let directory = self.working_dir(&assignment);
        remove_dir_if_exists(&directory)?;

        let head = self
            .git
            .clone_repository(&url, &directory, Some(private_key))
            .await
            .map_err(|source| {
                info!("[{}] Error cloning {} - {}", id, url, source);
                AppError::Clone {
                    url: url.clone(),
                    source,
                }
            })?;
        info!("[{}] Successfully cloned {} to {}", id, url, directory.display());

        let validation = self.run_validation(&assignment, principal).await?;
        Ok(ConnectOutcome { head, validation })
    }

    /// Pulls the latest teacher commits and marks every git submission's
    /// cached report as stale. Validation is not re-run.
    pub async fn refresh_git_repository(&self, principal: &str, id: &str) -> Result<RefreshOutcome, AppError> {
        let _guard = self.locks.acquire(id).await;
        let (assignment, _) = self.load_managed(principal, id).await?;
        let Some(private_key) = assignment.private_key_bytes() else {
            return Err(AppError::MissingKeyPair(id.to_string()));
        };

        info!("[{}] Pulling git repository", id);
        let head = self
            .git
            .pull(&self.working_dir(&assignment), private_key)
            .await
            .map_err(|source| {
                if matches!(source, GitError::NoCommitsYet) {
                    warn!("[{}] Couldn't pull git repository: head is invalid", id);
                } else {
                    warn!("[{}] Couldn't pull git repository: {}", id, source);
                }
                AppError::Pull {
                    url: assignment.git_repository_url.clone(),
                    source,
                }
            })?;

        let cleared = git_submission::Model::clear_last_submission(&self.db, id).await?;
        if cleared > 0 {
            info!("[{}] Reset report for {} git submissions", id, cleared);
        }

        Ok(RefreshOutcome {
            head,
            cleared_submissions: cleared,
        })
    }

    pub async fn validate_assignment_files(&self, principal: &str, id: &str) -> Result<Validation, AppError> {
        let _guard = self.locks.acquire(id).await;
        let (assignment, _) = self.load_managed(principal, id).await?;
        self.run_validation(&assignment, principal).await
    }

    /// Flips the active flag and returns the new value. Activation re-validates
    /// the repository first and is refused unless it passes.
    pub async fn toggle_active(&self, principal: &str, id: &str) -> Result<bool, AppError> {
        let _guard = self.locks.acquire(id).await;
        let (assignment, _) = self.load_managed(principal, id).await?;

        if !assignment.active {
            if !self.working_dir(&assignment).is_dir() {
                return Err(AppError::NotConnected(id.to_string()));
            }

            let validation = self.run_validation(&assignment, principal).await?;
            if let Some(rejection) = validation.rejection {
                info!("[{}] Assignment has problems: {}", id, rejection);
                return Err(AppError::Rejected(rejection));
            }
        }

        let updated = assignment::Model::set_active(&self.db, id, !assignment.active).await?;
        info!(
            "[{}] Assignment was marked {}",
            id,
            if updated.active { "active" } else { "inactive" }
        );
        Ok(updated.active)
    }

    /// Archiving leaves the working directory and the active flag alone.
    pub async fn archive_assignment(&self, principal: &str, id: &str) -> Result<assignment::Model, AppError> {
        let _guard = self.locks.acquire(id).await;
        self.load_managed(principal, id).await?;
        let archived = assignment::Model::set_archived(&self.db, id).await?;
        info!("[{}] Assignment archived by {}", id, principal);
        Ok(archived)
    }

    pub async fn delete_assignment(&self, principal: &str, id: &str) -> Result<(), AppError> {
        let _guard = self.locks.acquire(id).await;
        let assignment = self.load(id).await?;
        Self::require_owner(principal, &assignment)?;

        if submission::Model::count_by_assignment_id(&self.db, id).await? > 0 {
            return Err(AppError::Integrity(
                "Assignment can't be deleted because it has submissions".into(),
            ));
        }

        assignment::Model::delete_with_access_lists(&self.db, id).await?;
        remove_dir_if_exists(self.working_dir(&assignment))?;

        info!("[{}] Assignment deleted by {}", id, principal);
        Ok(())
    }

    /// Assignments owned by `user` or shared with them through the ACL.
    pub async fn list_assignments_for(&self, user: &str, archived: bool) -> Result<Vec<AssignmentSummary>, AppError> {
        let mut assignments = assignment::Model::find_by_owner(&self.db, user).await?;

        let shared_ids: Vec<String> = assignment_acl::Model::find_by_user_id(&self.db, user)
            .await?
            .into_iter()
            .map(|entry| entry.assignment_id)
            .filter(|shared| !assignments.iter().any(|owned| &owned.id == shared))
            .collect();
        assignments.extend(assignment::Model::find_by_ids(&self.db, shared_ids).await?);

        let mut summaries = Vec::new();
        for assignment in assignments.into_iter().filter(|a| a.archived == archived) {
            let num_submissions = submission::Model::count_by_assignment_id(&self.db, &assignment.id).await?;
            let num_unique_submitters = submission::Model::count_unique_submitters(&self.db, &assignment.id).await?;
            let public = !assignee::Model::exists_by_assignment_id(&self.db, &assignment.id).await?;
            let state = AssignmentState::derive(&assignment, self.working_dir(&assignment).is_dir());

            summaries.push(AssignmentSummary {
                assignment,
                state,
                num_submissions,
                num_unique_submitters,
                public,
            });
        }
        Ok(summaries)
    }

    pub async fn assignment_detail(&self, principal: &str, id: &str) -> Result<AssignmentDetail, AppError> {
        let (assignment, acl) = self.load_managed(principal, id).await?;
        let assignees = assignee::Model::find_by_assignment_id(&self.db, id).await?;
        let directory = self.working_dir(&assignment);
        let connected = directory.is_dir();

        let last_commit = if assignment.has_key_pair() && connected {
            let commit = self.git.last_commit_info(&directory).await?;
            Some(commit.map_or_else(|| "No commits".to_string(), |c| c.to_string()))
        } else {
            None
        };

        let build_report = match assignment.build_report_id {
            Some(report_id) => build_report::Model::get_by_id(&self.db, report_id).await?,
            None => None,
        };

        Ok(AssignmentDetail {
            state: AssignmentState::derive(&assignment, connected),
            package_tree: build_package_tree(
                assignment.package_name.as_deref(),
                assignment.language,
                assignment.accepts_student_tests,
            ),
            instructions: instructions_fragment(&directory),
            assignment,
            assignees,
            acl,
            last_commit,
            build_report,
        })
    }

    /// Copies the repository as handed out to students, production sources
    /// left behind, into `destination`. Returns the number of files copied.
    pub async fn export_student_template(
        &self,
        principal: &str,
        id: &str,
        destination: &Path,
    ) -> Result<u64, AppError> {
        let _guard = self.locks.acquire(id).await;
        let assignment = self.load(id).await?;
        let acl = assignment_acl::Model::find_by_assignment_id(&self.db, id).await?;
        let assignees = assignee::Model::find_by_assignment_id(&self.db, id).await?;
        if !can_manage(principal, &assignment, &acl) && !can_access(principal, &assignment, &assignees) {
            warn!("[{}][{}] Template requested without access", id, principal);
            return Err(AppError::AccessDenied(id.to_string()));
        }

        let copied = materialize(&self.working_dir(&assignment), destination, CopyPolicy::StudentTemplate).await?;
        info!("[{}] Exported student template ({} files) for {}", id, copied, principal);
        Ok(copied)
    }

    /// Validates the working copy and stores the verdict. The build report is
    /// kept whatever the verdict.
    async fn run_validation(&self, assignment: &assignment::Model, principal: &str) -> Result<Validation, AppError> {
        let directory = self.working_dir(assignment);
        let policy = ValidationPolicy::from(assignment);
        let validation = validate(&directory, &policy, self.executor.as_ref(), Some(principal)).await?;

        let report_id = match &validation.report {
            Some(report) => Some(
                build_report::Model::create(
                    &self.db,
                    &report.output,
                    &report.compilation_errors,
                    &report.checkstyle_errors,
                    report.unit_tests.failed_flag(),
                )
                .await?
                .id,
            ),
            None => None,
        };

        assignment::Model::record_validation(&self.db, &assignment.id, report_id, validation.is_valid()).await?;
        Ok(validation)
    }

    async fn load(&self, id: &str) -> Result<assignment::Model, AppError> {
        assignment::Model::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    async fn load_managed(
        &self,
        principal: &str,
        id: &str,
    ) -> Result<(assignment::Model, Vec<assignment_acl::Model>), AppError> {
        let assignment = self.load(id).await?;
        let acl = assignment_acl::Model::find_by_assignment_id(&self.db, id).await?;
        if !can_manage(principal, &assignment, &acl) {
            warn!("[{}][{}] Not the owner or an authorized teacher", id, principal);
            return Err(AppError::AccessDenied(id.to_string()));
        }
        Ok((assignment, acl))
    }

    fn require_owner(principal: &str, assignment: &assignment::Model) -> Result<(), AppError> {
        if is_owner(principal, assignment) {
            Ok(())
        } else {
            warn!("[{}][{}] Only the owner may do this", assignment.id, principal);
            Err(AppError::OwnerOnly(assignment.id.clone()))
        }
    }

    fn working_dir(&self, assignment: &assignment::Model) -> PathBuf {
        self.paths.assignment_dir(&assignment.git_repository_folder)
    }
}
