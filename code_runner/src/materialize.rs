use std::fs;
use std::path::Path;

use db::models::assignment::Language;
use tokio::task;
use tracing::{debug, warn};
use util::paths::{ensure_dir, remove_dir_if_exists};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::RunnerError;

/// Optional HTML fragment teachers keep at the repository root.
pub const INSTRUCTIONS_FILE: &str = "instructions.html";

/// Which parts of a teacher repository make it into a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPolicy {
    /// Everything the build needs, reference solution included.
    TeacherValidation,
    /// Scaffold handed to students: the production sources stay behind.
    StudentTemplate,
}

impl CopyPolicy {
    fn excluded_prefixes(self) -> &'static [&'static str] {
        match self {
            CopyPolicy::TeacherValidation => &[".git", "target"],
            CopyPolicy::StudentTemplate => &[".git", "target", "src/main"],
        }
    }

    /// `relative` is matched component-wise, so `targets/` is not excluded by `target`.
    pub fn excludes(self, relative: &Path) -> bool {
        self.excluded_prefixes()
            .iter()
            .any(|prefix| relative.starts_with(prefix))
    }
}

/// Copies `source` into `destination` according to `policy` and returns the
/// number of files written. Any previous content of `destination` is removed
/// first. Symlinks are not followed or copied.
///
/// The copy runs on the blocking thread pool.
pub async fn materialize(source: &Path, destination: &Path, policy: CopyPolicy) -> Result<u64, RunnerError> {
    let source = source.to_path_buf();
    let destination = destination.to_path_buf();
    task::spawn_blocking(move || copy_tree(&source, &destination, policy)).await?
}

fn copy_tree(source: &Path, destination: &Path, policy: CopyPolicy) -> Result<u64, RunnerError> {
    if !source.is_dir() {
        return Err(RunnerError::MissingSource(source.to_path_buf()));
    }

    clear_destination(destination)?;
    ensure_dir(destination)?;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(source)
                .map(|relative| !policy.excludes(relative))
                .unwrap_or(false)
        });

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(|source_err| RunnerError::Walk {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    debug!(
        "Materialized {} files from {} into {} ({:?})",
        copied,
        source.display(),
        destination.display(),
        policy
    );
    Ok(copied)
}

// A leftover that cannot be deleted (foreign ownership, not a directory) is
// renamed aside so the next run still starts from an empty destination.
fn clear_destination(destination: &Path) -> Result<(), RunnerError> {
    let Err(e) = remove_dir_if_exists(destination) else {
        return Ok(());
    };

    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let aside = destination.with_file_name(format!("{}.stale-{}", name, Uuid::new_v4()));
    warn!(
        "Could not remove {} ({}), moving it to {}",
        destination.display(),
        e,
        aside.display()
    );
    fs::rename(destination, &aside).map_err(|_| RunnerError::Io(e))
}

/// Renders the folder layout a submission is expected to follow. Purely
/// textual: one line per entry, each terminated by `\n`.
pub fn build_package_tree(package_name: Option<&str>, language: Language, has_student_tests: bool) -> String {
    let mut tree = String::new();
    tree.push_str("AUTHORS.txt  (contains lines STUDENT_NUMBER;STUDENT_NAME, one per group member)\n");
    tree.push_str("+ src\n");

    let mut indent = 3;
    let segments = package_name
        .unwrap_or_default()
        .split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty());
    for segment in segments {
        tree.push_str(&format!("|{} {}\n", "-".repeat(indent), segment));
        indent += 3;
    }

    tree.push_str(&format!("|{} {}\n", "-".repeat(indent), language.main_file_name()));
    tree.push_str(&format!(
        "|{} ...   (other project source files)\n",
        "-".repeat(indent)
    ));

    if has_student_tests {
        tree.push_str("+ test-files\n");
        tree.push_str("|--- somefile1.txt\n");
        tree.push_str("|--- ...   (other input files for the unit tests)\n");
    }

    tree
}

/// Contents of `instructions.html` at the repository root, or an empty string.
pub fn instructions_fragment(assignment_dir: &Path) -> String {
    fs::read_to_string(assignment_dir.join(INSTRUCTIONS_FILE)).unwrap_or_default()
}
