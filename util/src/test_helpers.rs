use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::paths::StoragePaths;

/// Creates a temporary directory holding fresh `assignments/` and
/// `mavenized/` roots. Keep the returned `TempDir` in scope for as long as
/// the files are needed.
pub fn setup_test_storage() -> (TempDir, StoragePaths) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let abs = tmp
        .path()
        .canonicalize()
        .unwrap_or_else(|_| tmp.path().to_path_buf());

    let assignments = abs.join("assignments");
    let mavenized = abs.join("mavenized");
    fs::create_dir_all(&assignments).expect("failed to create assignments root");
    fs::create_dir_all(&mavenized).expect("failed to create mavenized root");

    let paths = StoragePaths::new(
        assignments.to_str().expect("utf-8 temp path"),
        mavenized.to_str().expect("utf-8 temp path"),
    );
    (tmp, paths)
}

/// Writes `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    fs::write(path, contents).expect("failed to write test file");
}
