// file: src/pipeline/orchestrator.rs
// description: coordinates extraction, conversion and upload stages
// reference: each stage runs to completion inside the caller's request

use crate::archive::ArchiveExtractor;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, SystemRunner};
use crate::models::{BatchResult, ConversionJob, ExtractionReport, UploadRequest};
use crate::pipeline::converter::ConversionDriver;
use crate::pipeline::dispatcher::UploadDispatcher;
use crate::pipeline::progress::{BatchId, ProgressHandle, ProgressRegistry, ProgressSnapshot};
use crate::storage::ResourceGuard;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of an extract, convert and upload sequence.
#[derive(Debug)]
pub struct RunReport {
    pub extraction: ExtractionReport,
    pub conversions: Vec<ConversionJob>,
    pub upload: BatchResult,
}

pub struct PipelineOrchestrator {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    extractor: Arc<ArchiveExtractor>,
    converter: ConversionDriver,
    dispatcher: UploadDispatcher,
    registry: Arc<ProgressRegistry>,
}

impl PipelineOrchestrator {
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Arc::new(SystemRunner::new()), ResourceGuard::system())
    }

    pub fn with_parts(config: Config, runner: Arc<dyn CommandRunner>, guard: ResourceGuard) -> Self {
        let extractor = Arc::new(ArchiveExtractor::from_config(&config, guard.clone()));
        let converter = ConversionDriver::new(Arc::clone(&runner), guard, &config);
        let dispatcher = UploadDispatcher::from_config(&config, Arc::clone(&runner));

        Self {
            config,
            runner,
            extractor,
            converter,
            dispatcher,
            registry: Arc::new(ProgressRegistry::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn registry(&self) -> Arc<ProgressRegistry> {
        Arc::clone(&self.registry)
    }

    /// Registers a new batch; pollers read it through the returned handle or its id.
    pub fn begin_batch(&self, total: usize) -> ProgressHandle {
        self.registry.begin(total)
    }

    pub fn progress(&self, id: &BatchId) -> Option<ProgressSnapshot> {
        self.registry.snapshot(id)
    }

    /// Streams `archive` into `dest`, or the configured extraction directory.
    pub async fn extract_file(&self, archive: &Path, dest: Option<&Path>) -> Result<ExtractionReport> {
        let root = dest
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.paths.extract_dir.clone());
        let archive_path = archive.to_path_buf();
        let extractor = Arc::clone(&self.extractor);

        info!(
            "Extracting {} into {}",
            archive_path.display(),
            root.display()
        );

        let report = tokio::task::spawn_blocking(move || -> Result<ExtractionReport> {
            let file = File::open(&archive_path)
                .map_err(|e| PipelineError::file_operation(&archive_path, e))?;
            extractor.extract(BufReader::new(file), &root)
        })
        .await
        .map_err(|e| PipelineError::Task(format!("Extraction task failed: {}", e)))??;

        let name = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.display().to_string());
        info!("{}", report.summary(&name));
        if report.artifacts().is_empty() {
            warn!(
                "No {} files found in {}",
                self.extractor.artifact_suffix(),
                name
            );
        }

        Ok(report)
    }

    pub async fn convert(
        &self,
        inputs: &[PathBuf],
        format: &str,
        progress: &ProgressHandle,
    ) -> Result<Vec<ConversionJob>> {
        self.converter
            .convert(inputs, format, Some(progress.tracker()))
            .await
    }

    pub async fn upload(
        &self,
        files: &[PathBuf],
        request: &UploadRequest,
        progress: &ProgressHandle,
    ) -> Result<BatchResult> {
        self.dispatcher
            .dispatch(files, request, progress.tracker())
            .await
    }

    /// All three stages in sequence, each stage reporting into its own batch.
    pub async fn run(
        &self,
        archive: &Path,
        format: &str,
        request: &UploadRequest,
    ) -> Result<RunReport> {
        let extraction = self.extract_file(archive, None).await?;
        let artifacts = extraction.artifacts();
        if artifacts.is_empty() {
            return Err(PipelineError::Validation(format!(
                "No {} files found in {}",
                self.extractor.artifact_suffix(),
                archive.display()
            )));
        }

        let conversion_batch = self.begin_batch(artifacts.len());
        let conversions = self.convert(&artifacts, format, &conversion_batch).await?;

        let outputs: Vec<PathBuf> = conversions.iter().map(|job| job.output.clone()).collect();
        let upload_batch = self.begin_batch(outputs.len());
        let upload = self.upload(&outputs, request, &upload_batch).await?;

        Ok(RunReport {
            extraction,
            conversions,
            upload,
        })
    }
}
