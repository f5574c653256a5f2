#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_insight::data::Value;
use csv_insight::dataset::Dataset;
use csv_insight::io_utils;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads a CSV fixture through the same typed reader the CLI uses.
pub fn load_fixture(name: &str) -> Dataset {
    io_utils::read_dataset(&fixture_path(name), None).expect("load fixture")
}

/// Builds a dataset from raw text cells, typed the way CSV input is.
pub fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
    Dataset::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| Value::from_raw(cell)).collect())
            .collect(),
    )
    .expect("valid dataset")
}

/// A single numeric column named `v`.
pub fn numbers(values: &[f64]) -> Dataset {
    Dataset::new(
        vec!["v".to_string()],
        values.iter().map(|v| vec![Value::Number(*v)]).collect(),
    )
    .expect("valid dataset")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}
