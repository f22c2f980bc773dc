// file: src/pipeline/dispatcher.rs
// description: per-item isolated upload batches with live progress reporting
// reference: sequential batch loop aggregating partial failures

use crate::backends::{AzureBlobBackend, LocalBackend, S3Backend, UploadBackend, base_name};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::exec::CommandRunner;
use crate::models::{BackendKind, BatchResult, UploadItem, UploadOutcome, UploadRequest};
use crate::pipeline::progress::ProgressTracker;
use crate::utils::logging::{format_error, format_step, format_success};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info};

#[derive(Default)]
pub struct UploadDispatcher {
    backends: HashMap<BackendKind, Arc<dyn UploadBackend>>,
}

impl UploadDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local, S3 and Azure backends wired to `runner`.
    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new()
            .with_backend(Arc::new(
                LocalBackend::new(&config.paths.local_target)
                    .staged(config.upload.staged_local_copy),
            ))
            .with_backend(Arc::new(S3Backend::new(
                Arc::clone(&runner),
                &config.tools.aws,
            )))
            .with_backend(Arc::new(AzureBlobBackend::new(runner, &config.tools.az)))
    }

    pub fn with_backend(mut self, backend: Arc<dyn UploadBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Attempts every file in order; one item's failure never stops the next.
    ///
    /// `progress` is reset before the first item and left at 100% with the summary afterwards.
    pub async fn dispatch(
        &self,
        files: &[PathBuf],
        request: &UploadRequest,
        progress: &ProgressTracker,
    ) -> Result<BatchResult> {
        if files.is_empty() {
            return Err(PipelineError::Validation(
                "Please select at least one file to upload".to_string(),
            ));
        }

        progress.reset(files.len());
        info!(
            "Starting upload of {} file(s) to {}",
            files.len(),
            request.backend
        );

        let mut batch = BatchResult::new();
        for (index, file) in files.iter().enumerate() {
            let item = self.upload_one(index, files.len(), file, request, progress).await;
            let name = base_name(file);

            match &item.outcome {
                UploadOutcome::Uploaded => {
                    let target = item
                        .destination
                        .as_ref()
                        .map(|d| d.to_string())
                        .unwrap_or_default();
                    info!(
                        "{}",
                        format_success(&format!("Uploaded {} to {}", file.display(), target))
                    );
                    progress.update(index, format!("Uploaded {} to {}", name, target));
                }
                UploadOutcome::Failed { diagnostic } => {
                    error!(
                        "{}",
                        format_error(&format!(
                            "Upload failed for {}: {}",
                            file.display(),
                            diagnostic
                        ))
                    );
                    progress.update(index, format!("Failed to upload {}", name));
                }
            }

            batch.push(item);
        }

        let summary = batch.summary();
        info!("{}", summary);
        progress.finish(summary);

        Ok(batch)
    }

    async fn upload_one(
        &self,
        index: usize,
        total: usize,
        file: &Path,
        request: &UploadRequest,
        progress: &ProgressTracker,
    ) -> UploadItem {
        let kind = match request.backend.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(diagnostic) => {
                return UploadItem::failed(file, &request.backend, None, diagnostic);
            }
        };

        let Some(backend) = self.backends.get(&kind) else {
            return UploadItem::failed(
                file,
                kind.name(),
                None,
                format!("No uploader configured for backend '{}'", kind),
            );
        };

        let destination = match backend.resolve(file, request) {
            Ok(destination) => destination,
            Err(e) => return UploadItem::failed(file, kind.name(), None, e.to_string()),
        };

        let size = match fs::metadata(file).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                return UploadItem::failed(
                    file,
                    kind.name(),
                    Some(destination),
                    format!("Failed to get file info for {}: {}", file.display(), e),
                );
            }
        };

        info!(
            "{}",
            format_step(
                index + 1,
                total,
                &format!("Uploading {} to {}", file.display(), destination)
            )
        );
        progress.update(index, backend.status_line(&base_name(file), &destination, size));

        match backend.transfer(file, &destination).await {
            Ok(()) => UploadItem::uploaded(file, kind.name(), destination),
            Err(e) => UploadItem::failed(file, kind.name(), Some(destination), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ToolOutput;
    use crate::exec::testing::ScriptedRunner;
    use crate::models::{BatchVerdict, Destination};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        files: Vec<PathBuf>,
        out: PathBuf,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let files = names
            .iter()
            .map(|name| {
                let path = temp.path().join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();
        let out = temp.path().join("out");
        Fixture {
            _temp: temp,
            files,
            out,
        }
    }

    fn dispatcher(runner: Arc<ScriptedRunner>, local_target: &Path) -> UploadDispatcher {
        let mut config = Config::default_config();
        config.paths.local_target = local_target.to_path_buf();
        UploadDispatcher::from_config(&config, runner)
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected_without_touching_progress() {
        let fx = fixture(&[]);
        let dispatcher = dispatcher(Arc::new(ScriptedRunner::succeeding()), &fx.out);
        let progress = ProgressTracker::new();
        progress.reset(7);

        let result = dispatcher
            .dispatch(&[], &UploadRequest::new("local"), &progress)
            .await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert_eq!(progress.snapshot().total, 7);
    }

    #[tokio::test]
    async fn test_local_batch_copies_everything() {
        let fx = fixture(&["a.raw", "b.raw"]);
        let dispatcher = dispatcher(Arc::new(ScriptedRunner::succeeding()), &fx.out);
        let progress = ProgressTracker::new();

        let batch = dispatcher
            .dispatch(&fx.files, &UploadRequest::new("local"), &progress)
            .await
            .unwrap();

        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.fail_count, 0);
        assert_eq!(std::fs::read(fx.out.join("b.raw")).unwrap(), b"b.raw");

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.current, 2);
        assert_eq!(snapshot.percentage, 100);
        assert_eq!(snapshot.status, "Upload completed: 2 successful, 0 failed");
    }

    #[tokio::test]
    async fn test_malformed_container_counts_every_item_as_failed() {
        let fx = fixture(&["one.vhd", "two.vhd", "three.vhd"]);
        let runner = Arc::new(ScriptedRunner::succeeding());
        let dispatcher = dispatcher(Arc::clone(&runner), &fx.out);
        let progress = ProgressTracker::new();
        let request = UploadRequest::new("azure")
            .with_subscription("prod")
            .with_container("acct");

        let batch = dispatcher
            .dispatch(&fx.files, &request, &progress)
            .await
            .unwrap();

        assert_eq!(batch.processed(), 3);
        assert_eq!(batch.success_count + batch.fail_count, 3);
        assert_eq!(batch.fail_count, 3);
        assert!(batch.items[1].diagnostic().unwrap().contains("Invalid Azure container format"));
        assert_eq!(runner.call_count(), 0);
        assert_eq!(progress.snapshot().percentage, 100);
    }

    #[tokio::test]
    async fn test_azure_batch_uploads_with_prefix() {
        let fx = fixture(&["one.vhd", "two.vhd"]);
        let runner = Arc::new(ScriptedRunner::succeeding());
        let dispatcher = dispatcher(Arc::clone(&runner), &fx.out);
        let progress = ProgressTracker::new();
        let request = UploadRequest::new("azure")
            .with_subscription("prod")
            .with_container("acct/images")
            .with_target("/migrated");

        let batch = dispatcher
            .dispatch(&fx.files, &request, &progress)
            .await
            .unwrap();

        assert_eq!(batch.success_count, 2);
        assert_eq!(
            batch.items[1].destination.as_ref().unwrap().to_string(),
            "acct/images/migrated/two.vhd"
        );
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_middle_item_does_not_stop_batch() {
        let fx = fixture(&["one.raw", "two.raw", "three.raw"]);
        let runner = Arc::new(ScriptedRunner::new(|invocation| {
            if invocation.args.iter().any(|arg| arg.ends_with("two.raw")) {
                Ok(ToolOutput::failure(1, "upload failed: AccessDenied"))
            } else {
                Ok(ToolOutput::success("upload: done"))
            }
        }));
        let dispatcher = dispatcher(Arc::clone(&runner), &fx.out);
        let progress = ProgressTracker::new();
        let request = UploadRequest::new("aws").with_bucket("backups");

        let batch = dispatcher
            .dispatch(&fx.files, &request, &progress)
            .await
            .unwrap();

        assert_eq!(runner.call_count(), 3);
        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.fail_count, 1);
        assert_eq!(batch.verdict(), BatchVerdict::Mixed);
        assert!(batch.items[0].is_success());
        assert!(batch.items[1].diagnostic().unwrap().contains("AccessDenied"));
        assert!(batch.items[2].is_success());
        assert_eq!(
            batch.items[2].destination,
            Some(Destination::Object {
                bucket: "backups".into(),
                key: "three.raw".into(),
            })
        );
        assert_eq!(
            progress.snapshot().status,
            "Upload completed: 2 successful, 1 failed"
        );
    }

    #[tokio::test]
    async fn test_progress_points_at_item_in_flight() {
        let fx = fixture(&["one.raw", "two.raw", "three.raw"]);
        let progress = Arc::new(ProgressTracker::new());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let runner = {
            let progress = Arc::clone(&progress);
            let seen = Arc::clone(&seen);
            Arc::new(ScriptedRunner::new(move |invocation| {
                seen.lock().push(progress.snapshot());
                if invocation.args.iter().any(|arg| arg.ends_with("two.raw")) {
                    Ok(ToolOutput::failure(1, "AccessDenied"))
                } else {
                    Ok(ToolOutput::success(""))
                }
            }))
        };
        let dispatcher = dispatcher(runner, &fx.out);
        let request = UploadRequest::new("aws").with_bucket("backups");

        dispatcher
            .dispatch(&fx.files, &request, &progress)
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        for (index, (snapshot, name)) in seen
            .iter()
            .zip(["one.raw", "two.raw", "three.raw"])
            .enumerate()
        {
            assert_eq!(snapshot.current, index);
            assert_eq!(snapshot.total, 3);
            assert!(
                snapshot
                    .status
                    .starts_with(&format!("Uploading {} to AWS S3", name)),
                "unexpected status: {}",
                snapshot.status
            );
        }
        assert_eq!(seen[1].percentage, 33);
        assert_eq!(
            progress.snapshot().status,
            "Upload completed: 2 successful, 1 failed"
        );
    }

    #[tokio::test]
    async fn test_unknown_backend_fails_each_item_without_invocations() {
        let fx = fixture(&["a.raw", "b.raw"]);
        let runner = Arc::new(ScriptedRunner::succeeding());
        let dispatcher = dispatcher(Arc::clone(&runner), &fx.out);
        let progress = ProgressTracker::new();

        let batch = dispatcher
            .dispatch(&fx.files, &UploadRequest::new("gcs"), &progress)
            .await
            .unwrap();

        assert_eq!(batch.fail_count, 2);
        assert_eq!(batch.verdict(), BatchVerdict::AllFailed);
        assert!(batch.items[0].diagnostic().unwrap().contains("gcs"));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_item_failure() {
        let fx = fixture(&["real.raw"]);
        let runner = Arc::new(ScriptedRunner::succeeding());
        let dispatcher = dispatcher(Arc::clone(&runner), &fx.out);
        let progress = ProgressTracker::new();
        let files = vec![fx.files[0].with_file_name("ghost.raw"), fx.files[0].clone()];

        let batch = dispatcher
            .dispatch(&files, &UploadRequest::new("aws").with_bucket("b"), &progress)
            .await
            .unwrap();

        assert!(batch.items[0].diagnostic().unwrap().starts_with("Failed to get file info"));
        assert!(batch.items[1].is_success());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_backend() {
        let fx = fixture(&["a.raw"]);
        let dispatcher = UploadDispatcher::new().with_backend(Arc::new(LocalBackend::new(&fx.out)));
        let progress = ProgressTracker::new();

        let batch = dispatcher
            .dispatch(&fx.files, &UploadRequest::new("azure"), &progress)
            .await
            .unwrap();

        assert_eq!(batch.fail_count, 1);
        assert!(batch.items[0].diagnostic().unwrap().contains("No uploader configured"));
    }
}
