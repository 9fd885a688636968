use std::fmt;
use std::path::{Path, PathBuf};

use db::models::assignment::{self, Language};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::build_report::BuildReport;
use crate::error::RunnerError;
use crate::executor::BuildExecutor;

/// Build manifest every assignment repository must carry at its root.
pub const MANIFEST_FILE: &str = "pom.xml";
pub const TEST_SOURCE_DIR: &str = "src/test";
pub const TEST_NAME_PREFIX: &str = "Test";
pub const TEACHER_TEST_NAME_PREFIX: &str = "TestTeacher";

/// The assignment attributes validation depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub assignment_id: String,
    pub folder: String,
    pub language: Language,
    pub accepts_student_tests: bool,
}

impl From<&assignment::Model> for ValidationPolicy {
    fn from(model: &assignment::Model) -> Self {
        Self {
            assignment_id: model.id.clone(),
            folder: model.git_repository_folder.clone(),
            language: model.language,
            accepts_student_tests: model.accepts_student_tests,
        }
    }
}

/// Why an assignment repository was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingManifest,
    BuildTimedOut,
    CompilationFailed(Vec<String>),
    StyleCheckFailed(Vec<String>),
    UnitTestsFailed,
    /// Path of the offending test file, relative to the repository root.
    InvalidTeacherTestNaming(PathBuf),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingManifest => {
                write!(f, "Assignment must have a {MANIFEST_FILE}. Please fix this!")
            }
            Rejection::BuildTimedOut => write!(
                f,
                "Assignment checking (run tests) was aborted by timeout! Why is it taking so long to run?"
            ),
            Rejection::CompilationFailed(_) => {
                write!(f, "Assignment has compilation errors. Please fix this!")
            }
            Rejection::StyleCheckFailed(_) => {
                write!(f, "Assignment has checkstyle errors. Please fix this!")
            }
            Rejection::UnitTestsFailed => {
                write!(f, "Assignment is failing some JUnit tests. Please fix this!")
            }
            Rejection::InvalidTeacherTestNaming(file) => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());
                let stem = name.strip_prefix(TEST_NAME_PREFIX).unwrap_or(&name);
                let stem = stem.split('.').next().unwrap_or(stem);
                write!(
                    f,
                    "{} is not valid for assignments which accept student tests. \
                     All teacher tests must be prefixed with {} (e.g., {}{} instead of {}{})",
                    file.display(),
                    TEACHER_TEST_NAME_PREFIX,
                    TEACHER_TEST_NAME_PREFIX,
                    stem,
                    TEST_NAME_PREFIX,
                    stem
                )
            }
        }
    }
}

/// Outcome of a validation run. Persisting it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub report: Option<BuildReport>,
    pub rejection: Option<Rejection>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

pub fn has_manifest(assignment_dir: &Path) -> bool {
    assignment_dir.join(MANIFEST_FILE).is_file()
}

/// Applies the acceptance rules in order and returns the first violation,
/// or `None` when the repository is accepted.
///
/// A report whose unit test outcome is `Unknown` (no tests ran) is accepted.
pub fn check_assignment_files(
    assignment_dir: &Path,
    policy: &ValidationPolicy,
    report: Option<&BuildReport>,
) -> Option<Rejection> {
    if !has_manifest(assignment_dir) {
        return Some(Rejection::MissingManifest);
    }

    let Some(report) = report else {
        return Some(Rejection::BuildTimedOut);
    };

    if !report.compilation_errors.is_empty() {
        return Some(Rejection::CompilationFailed(report.compilation_errors.clone()));
    }

    if !report.checkstyle_errors.is_empty() {
        return Some(Rejection::StyleCheckFailed(report.checkstyle_errors.clone()));
    }

    if report.has_unit_test_failures() {
        return Some(Rejection::UnitTestsFailed);
    }

    if policy.accepts_student_tests {
        if let Some(file) = first_misnamed_teacher_test(assignment_dir) {
            return Some(Rejection::InvalidTeacherTestNaming(file));
        }
    }

    None
}

// Teacher tests must not look like student tests, otherwise they would be
// mixed up when student submissions are graded.
fn first_misnamed_teacher_test(assignment_dir: &Path) -> Option<PathBuf> {
    let test_root = assignment_dir.join(TEST_SOURCE_DIR);
    if !test_root.is_dir() {
        return None;
    }

    WalkDir::new(&test_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(TEST_NAME_PREFIX) && !name.starts_with(TEACHER_TEST_NAME_PREFIX)
        })
        .map(|entry| {
            entry
                .path()
                .strip_prefix(assignment_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf())
        })
}

/// Builds the repository with `executor` and applies [`check_assignment_files`].
/// Nothing is persisted here.
pub async fn validate(
    assignment_dir: &Path,
    policy: &ValidationPolicy,
    executor: &dyn BuildExecutor,
    acting_user: Option<&str>,
) -> Result<Validation, RunnerError> {
    if !has_manifest(assignment_dir) {
        warn!("[{}] No {} found, skipping build", policy.assignment_id, MANIFEST_FILE);
        return Ok(Validation {
            report: None,
            rejection: Some(Rejection::MissingManifest),
        });
    }

    let report = executor
        .check_assignment(assignment_dir, policy, acting_user)
        .await?;
    let rejection = check_assignment_files(assignment_dir, policy, report.as_ref());

    match &rejection {
        None => info!("[{}] Assignment is valid", policy.assignment_id),
        Some(reason) => info!("[{}] Assignment rejected: {}", policy.assignment_id, reason),
    }

    Ok(Validation { report, rejection })
}
