// file: src/backends/local.rs
// description: copies files into a directory on the local filesystem
// reference: https://docs.rs/tokio/latest/tokio/fs

use super::{UploadBackend, base_name};
use crate::error::{PipelineError, Result};
use crate::models::{BackendKind, Destination, UploadRequest};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct LocalBackend {
    default_dir: PathBuf,
    staged: bool,
}

impl LocalBackend {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
            staged: false,
        }
    }

    /// Write through a temp file in the destination directory and rename it into place.
    pub fn staged(mut self, staged: bool) -> Self {
        self.staged = staged;
        self
    }

    /// Writes straight to the final name; a crash mid-copy leaves a truncated file.
    async fn copy_direct(source: &Path, target: &Path) -> Result<()> {
        let mut input = File::open(source)
            .await
            .map_err(|e| PipelineError::file_operation(source, e))?;
        let mut output = File::create(target)
            .await
            .map_err(|e| PipelineError::file_operation(target, e))?;

        tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| PipelineError::file_operation(target, e))?;
        output
            .flush()
            .await
            .map_err(|e| PipelineError::file_operation(target, e))?;
        output
            .sync_all()
            .await
            .map_err(|e| PipelineError::file_operation(target, e))
    }

    /// A missing target is never the same file.
    async fn same_file(source: &Path, target: &Path) -> bool {
        match (fs::canonicalize(source).await, fs::canonicalize(target).await) {
            (Ok(source), Ok(target)) => source == target,
            _ => false,
        }
    }

    async fn copy_staged(source: &Path, target: &Path) -> Result<()> {
        let source = source.to_path_buf();
        let target = target.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = target.parent().unwrap_or_else(|| Path::new("."));
            let mut staging =
                NamedTempFile::new_in(dir).map_err(|e| PipelineError::file_operation(dir, e))?;
            let mut input = std::fs::File::open(&source)
                .map_err(|e| PipelineError::file_operation(&source, e))?;

            std::io::copy(&mut input, staging.as_file_mut())
                .map_err(|e| PipelineError::file_operation(staging.path(), e))?;
            staging
                .as_file()
                .sync_all()
                .map_err(|e| PipelineError::file_operation(staging.path(), e))?;
            staging
                .persist(&target)
                .map_err(|e| PipelineError::file_operation(&target, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| PipelineError::Task(format!("local copy task failed: {}", e)))?
    }
}

#[async_trait]
impl UploadBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn resolve(&self, file: &Path, request: &UploadRequest) -> Result<Destination> {
        let dir = request
            .target
            .as_deref()
            .filter(|target| !target.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_dir.clone());

        Ok(Destination::Local {
            path: dir.join(base_name(file)),
        })
    }

    fn status_line(&self, file_name: &str, destination: &Destination, _size: u64) -> String {
        let dir = destination
            .local_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| destination.to_string());
        format!("Copying {} to local filesystem: {}", file_name, dir)
    }

    async fn transfer(&self, file: &Path, destination: &Destination) -> Result<()> {
        let Destination::Local { path } = destination else {
            return Err(PipelineError::Validation(format!(
                "Local backend cannot write to {}",
                destination
            )));
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::file_operation(dir, e))?;
        }

        if Self::same_file(file, path).await {
            return Err(PipelineError::Validation(format!(
                "{} is already at {}; refusing to copy a file onto itself",
                file.display(),
                path.display()
            )));
        }

        debug!("Copying {} -> {}", file.display(), path.display());
        if self.staged {
            Self::copy_staged(file, path).await
        } else {
            Self::copy_direct(file, path).await
        }
    }
}
