// file: src/utils/validation.rs
// description: input path validation for command-line selections
// reference: input validation patterns

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Validator;

impl Validator {
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            PipelineError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(PipelineError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(PipelineError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// A non-empty list of existing regular files, in the order given.
    pub fn validate_selection(files: &[PathBuf], what: &str) -> Result<()> {
        if files.is_empty() {
            return Err(PipelineError::Validation(format!(
                "Please select at least one file to {}",
                what
            )));
        }

        files
            .iter()
            .try_for_each(|file| Self::validate_file_path(file))
    }
}
