// file: src/pipeline/converter.rs
// description: sequential disk image conversion through the external converter
// reference: abort-on-first-failure batch driver

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, Invocation};
use crate::models::{ConversionJob, TargetFormat};
use crate::pipeline::progress::ProgressTracker;
use crate::storage::ResourceGuard;
use crate::utils::logging::format_step;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

pub struct ConversionDriver {
    runner: Arc<dyn CommandRunner>,
    guard: ResourceGuard,
    program: String,
    source_format: String,
    output_dir: PathBuf,
    min_free_bytes: u64,
}

impl ConversionDriver {
    pub fn new(runner: Arc<dyn CommandRunner>, guard: ResourceGuard, config: &Config) -> Self {
        Self {
            runner,
            guard,
            program: config.tools.qemu_img.clone(),
            source_format: config.extraction.source_format.clone(),
            output_dir: config.paths.convert_dir.clone(),
            min_free_bytes: config.resources.min_free_bytes(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Converts `inputs` one after another.
    ///
    /// The first failing input aborts the batch; later inputs are not attempted and the
    /// jobs that already succeeded travel inside [`PipelineError::ConversionAborted`].
    pub async fn convert(
        &self,
        inputs: &[PathBuf],
        format: &str,
        progress: Option<&ProgressTracker>,
    ) -> Result<Vec<ConversionJob>> {
        let format: TargetFormat = format.parse()?;

        if inputs.is_empty() {
            return Err(PipelineError::Validation(
                "No files selected for conversion".to_string(),
            ));
        }

        if !self.guard.has_free_space(&self.output_dir, self.min_free_bytes) {
            return Err(PipelineError::InsufficientSpace {
                path: self.output_dir.clone(),
                required: self.min_free_bytes,
            });
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PipelineError::file_operation(&self.output_dir, e))?;

        info!(
            "Starting conversion of {} file(s) to {} format",
            inputs.len(),
            format
        );
        if let Some(progress) = progress {
            progress.reset(inputs.len());
        }

        let mut jobs = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let output = format.output_path(input, &self.output_dir);
            let label = display_name(input);

            info!(
                "{}",
                format_step(
                    index + 1,
                    inputs.len(),
                    &format!("Converting {} to {} format", input.display(), format)
                )
            );
            if let Some(progress) = progress {
                progress.update(index, format!("Converting {} to {}", label, format.display_name()));
            }

            if let Err(diagnostic) = self.convert_one(input, &output, format).await {
                error!("Conversion failed for {}: {}", input.display(), diagnostic);
                if let Some(progress) = progress {
                    progress.update(index, format!("Conversion failed for {}", label));
                }
                return Err(PipelineError::ConversionAborted {
                    input: input.clone(),
                    diagnostic,
                    completed: jobs,
                });
            }

            let size = match fs::metadata(&output).await {
                Ok(metadata) => {
                    info!(
                        "Converted {} to {} ({:.2} MB)",
                        input.display(),
                        output.display(),
                        metadata.len() as f64 / (1024.0 * 1024.0)
                    );
                    Some(metadata.len())
                }
                Err(e) => {
                    warn!(
                        "Converted {} to {} (size unknown: {})",
                        input.display(),
                        output.display(),
                        e
                    );
                    None
                }
            };

            jobs.push(ConversionJob {
                input: input.clone(),
                format,
                output,
                size,
            });
        }

        let summary = conversion_summary(&jobs, format);
        info!("{}", summary);
        if let Some(progress) = progress {
            progress.finish(summary);
        }

        Ok(jobs)
    }

    /// `Err` carries the diagnostic text.
    async fn convert_one(
        &self,
        input: &Path,
        output: &Path,
        format: TargetFormat,
    ) -> std::result::Result<(), String> {
        let invocation = Invocation::new(&self.program)
            .args(["convert", "-f", self.source_format.as_str(), "-O", format.tool_name()])
            .arg(input.to_string_lossy())
            .arg(output.to_string_lossy());

        match self.runner.run(&invocation).await {
            Ok(result) if result.is_success() => Ok(()),
            Ok(result) => Err(result.diagnostic()),
            Err(e) => Err(e.to_string()),
        }
    }
}

pub fn conversion_summary(jobs: &[ConversionJob], format: TargetFormat) -> String {
    format!(
        "Successfully converted {} file(s) to {} format",
        jobs.len(),
        format.display_name()
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ToolOutput;
    use crate::exec::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_for(dir: &Path) -> Config {
        let mut config = Config::default_config();
        config.paths.convert_dir = dir.to_path_buf();
        config.resources.min_free_gb = 1;
        config
    }

    fn driver(runner: Arc<ScriptedRunner>, dir: &Path, space: Option<u64>) -> ConversionDriver {
        ConversionDriver::new(runner, ResourceGuard::with_fixed(space), &config_for(dir))
    }

    /// Writes the output file named by the last argument.
    fn writing_runner() -> ScriptedRunner {
        ScriptedRunner::new(|invocation| {
            let output = invocation.args.last().cloned().unwrap_or_default();
            std::fs::write(&output, b"converted-bytes")?;
            Ok(ToolOutput::success(""))
        })
    }

    fn inputs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| PathBuf::from(format!("/in/{}", name))).collect()
    }

    #[tokio::test]
    async fn test_unsupported_format_runs_nothing() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));

        let result = driver.convert(&inputs(&["a.vmdk"]), "bogus", None).await;

        assert!(matches!(result, Err(ref e) if e.is_validation()));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_selection_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));

        let result = driver.convert(&[], "raw", None).await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_insufficient_space_aborts_before_any_invocation() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(1024));

        let result = driver.convert(&inputs(&["a.vmdk", "b.vmdk"]), "qcow2", None).await;

        assert!(matches!(result, Err(PipelineError::InsufficientSpace { .. })));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invocation_shape_and_output_naming() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(writing_runner());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));

        let jobs = driver
            .convert(&inputs(&["disk1.vmdk"]), "vpc", None)
            .await
            .unwrap();

        let expected_output = temp.path().join("disk1.vmdk.vhd");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].output, expected_output);
        assert_eq!(jobs[0].size, Some(15));

        let calls = runner.calls();
        assert_eq!(calls[0].program, "qemu-img");
        assert_eq!(
            calls[0].args,
            vec![
                "convert".to_string(),
                "-f".to_string(),
                "vmdk".to_string(),
                "-O".to_string(),
                "vpc".to_string(),
                "/in/disk1.vmdk".to_string(),
                expected_output.to_string_lossy().into_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_failure_aborts_third() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|invocation| {
            if invocation.args.iter().any(|arg| arg.ends_with("b.vmdk")) {
                Ok(ToolOutput::failure(1, "qemu-img: Could not open 'b.vmdk'"))
            } else {
                Ok(ToolOutput::success(""))
            }
        }));
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));
        let progress = ProgressTracker::new();

        let result = driver
            .convert(&inputs(&["a.vmdk", "b.vmdk", "c.vmdk"]), "raw", Some(&progress))
            .await;

        match result {
            Err(PipelineError::ConversionAborted {
                input,
                diagnostic,
                completed,
            }) => {
                assert_eq!(input, PathBuf::from("/in/b.vmdk"));
                assert!(diagnostic.contains("Could not open"));
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].input, PathBuf::from("/in/a.vmdk"));
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(runner.call_count(), 2);
        assert_eq!(progress.snapshot().current, 1);
    }

    #[tokio::test]
    async fn test_missing_output_degrades_to_unknown_size() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));

        let jobs = driver.convert(&inputs(&["a.vmdk"]), "raw", None).await.unwrap();

        assert_eq!(jobs[0].size, None);
    }

    #[tokio::test]
    async fn test_progress_finishes_with_summary() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(writing_runner());
        let driver = driver(Arc::clone(&runner), temp.path(), Some(u64::MAX));
        let progress = ProgressTracker::new();

        driver
            .convert(&inputs(&["a.vmdk", "b.vmdk"]), "qcow2", Some(&progress))
            .await
            .unwrap();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.percentage, 100);
        assert_eq!(
            snapshot.status,
            "Successfully converted 2 file(s) to QCOW2 (QEMU/OpenStack) format"
        );
    }
}
