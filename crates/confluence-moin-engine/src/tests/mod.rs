//! Helpers shared by the unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Write `content` to `dir/name`, creating `dir` if needed.
pub fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create test directory");
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}
