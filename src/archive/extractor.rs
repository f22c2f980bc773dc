// file: src/archive/extractor.rs
// description: streams tar entries to disk and reports the disk-image artifacts found
// reference: https://docs.rs/tar

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::models::{ExtractedFile, ExtractionReport};
use crate::storage::ResourceGuard;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

pub struct ArchiveExtractor {
    guard: ResourceGuard,
    artifact_suffix: String,
    min_free_bytes: u64,
}

impl ArchiveExtractor {
    pub fn new(guard: ResourceGuard, artifact_suffix: impl Into<String>, min_free_bytes: u64) -> Self {
        Self {
            guard,
            artifact_suffix: artifact_suffix.into(),
            min_free_bytes,
        }
    }

    pub fn from_config(config: &Config, guard: ResourceGuard) -> Self {
        Self::new(
            guard,
            config.extraction.artifact_suffix.clone(),
            config.resources.min_free_bytes(),
        )
    }

    pub fn artifact_suffix(&self) -> &str {
        &self.artifact_suffix
    }

    /// Entries are consumed strictly in order; nothing is buffered beyond one copy chunk.
    ///
    /// Files written before a failure are left in place.
    pub fn extract<R: Read>(&self, reader: R, root: &Path) -> Result<ExtractionReport> {
        if !self.guard.has_free_space(root, self.min_free_bytes) {
            return Err(PipelineError::InsufficientSpace {
                path: root.to_path_buf(),
                required: self.min_free_bytes,
            });
        }

        fs::create_dir_all(root).map_err(|source| PipelineError::ExtractionIo {
            path: root.to_path_buf(),
            source,
        })?;

        let mut report = ExtractionReport::new(root.to_path_buf());
        let mut archive = Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| PipelineError::Extraction(format!("Cannot read archive: {}", e)))?;

        for entry in entries {
            let mut entry = entry
                .map_err(|e| PipelineError::Extraction(format!("Invalid archive entry: {}", e)))?;

            let declared = entry
                .path()
                .map_err(|e| PipelineError::Extraction(format!("Invalid entry name: {}", e)))?
                .into_owned();
            let relative = sanitize_entry_path(&declared)?;
            let target = root.join(&relative);

            let entry_type = entry.header().entry_type();
            let mode = entry.header().mode().ok();

            if entry_type.is_dir() {
                create_dir_with_mode(&target, mode)?;
                report.directories += 1;
                continue;
            }

            if !entry_type.is_file() {
                debug!(
                    "Skipping {:?} entry {}",
                    entry_type,
                    declared.display()
                );
                report.skipped += 1;
                continue;
            }

            if relative.as_os_str().is_empty() {
                return Err(PipelineError::Extraction(format!(
                    "File entry has no name: {}",
                    declared.display()
                )));
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| PipelineError::ExtractionIo {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            let size = write_entry(&mut entry, &target)?;
            let is_artifact = declared
                .to_string_lossy()
                .ends_with(self.artifact_suffix.as_str());

            if is_artifact {
                info!("Extracted artifact: {}", target.display());
            } else {
                debug!("Extracted {}", target.display());
            }

            report.files.push(ExtractedFile {
                path: target,
                is_artifact,
                size,
            });
        }

        info!(
            "Extraction completed: {} file(s), {} artifact(s)",
            report.files.len(),
            report.artifacts().len()
        );

        Ok(report)
    }
}

/// Overwrites any existing file at `target`.
fn write_entry<R: Read>(entry: &mut R, target: &Path) -> Result<u64> {
    let mut file = File::create(target).map_err(|source| PipelineError::ExtractionIo {
        path: target.to_path_buf(),
        source,
    })?;

    io::copy(entry, &mut file).map_err(|source| PipelineError::ExtractionIo {
        path: target.to_path_buf(),
        source,
    })
}

fn create_dir_with_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        if let Some(mode) = mode {
            builder.mode(mode);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(path)
        .map_err(|source| PipelineError::ExtractionIo {
            path: path.to_path_buf(),
            source,
        })
}

/// Declared names must stay below the extraction root.
fn sanitize_entry_path(declared: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in declared.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PipelineError::Extraction(format!(
                    "Entry escapes extraction root: {}",
                    declared.display()
                )));
            }
        }
    }
    Ok(clean)
}
