use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Create a directory (and all parents) if it doesn't exist, and return the path.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let p = path.as_ref();
    fs::create_dir_all(p)?;
    Ok(p.to_path_buf())
}

/// Remove a directory tree if present. Missing directories are not an error.
pub fn remove_dir_if_exists<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match fs::remove_dir_all(path.as_ref()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// True when `path` is missing or is a directory with no entries.
pub fn is_empty_dir<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    match fs::read_dir(path.as_ref()) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

fn absolutize(root: &str) -> PathBuf {
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

// ─── Storage roots ──────────────────────────────────────────────────

/// The two filesystem roots owned by the core.
///
/// ```text
/// {assignments_root}/{assignment_folder}/                     synced teacher repository
/// {mavenized_root}/{project_folder}-mavenized/                validation / grading copy
/// {mavenized_root}/{project_folder}-mavenized-for-rebuild/    copy used when rebuilding
/// ```
#[derive(Debug, Clone)]
pub struct StoragePaths {
    assignments_root: PathBuf,
    mavenized_root: PathBuf,
}

impl StoragePaths {
    /// Relative roots are resolved against the current directory.
    pub fn new(assignments_root: &str, mavenized_root: &str) -> Self {
        Self {
            assignments_root: absolutize(assignments_root),
            mavenized_root: absolutize(mavenized_root),
        }
    }

    pub fn assignments_root(&self) -> &Path {
        &self.assignments_root
    }

    pub fn mavenized_root(&self) -> &Path {
        &self.mavenized_root
    }

    // {assignments_root}/{assignment_folder}
    pub fn assignment_dir(&self, assignment_folder: &str) -> PathBuf {
        self.assignments_root.join(assignment_folder)
    }

    // {mavenized_root}/{project_folder}-mavenized[-for-rebuild]
    pub fn mavenized_dir(&self, project_folder: &str, rebuild: bool) -> PathBuf {
        let suffix = if rebuild {
            "-mavenized-for-rebuild"
        } else {
            "-mavenized"
        };
        self.mavenized_root.join(format!("{project_folder}{suffix}"))
    }

    /// The validation copy of a teacher repository. Prefixed so it never
    /// collides with a student submission's project folder.
    pub fn assignment_mavenized_dir(&self, assignment_folder: &str) -> PathBuf {
        self.mavenized_dir(&format!("assignment-{assignment_folder}"), false)
    }
}
