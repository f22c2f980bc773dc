// file: src/models/archive.rs
// description: files written by the archive extractor
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub is_artifact: bool,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub root: PathBuf,
    /// Every regular file written, in archive order.
    pub files: Vec<ExtractedFile>,
    pub directories: usize,
    pub skipped: usize,
}

impl ExtractionReport {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|file| file.is_artifact)
            .map(|file| file.path.clone())
            .collect()
    }

    pub fn bytes_written(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    pub fn summary(&self, archive_name: &str) -> String {
        format!(
            "Successfully extracted {} artifact(s) from {}",
            self.artifacts().len(),
            archive_name
        )
    }
}
