// file: src/backends/s3.rs
// description: object storage uploads through the aws command-line tool
// reference: streams transfer output while the tool runs

use super::{UploadBackend, base_name, megabytes, prefixed};
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, Invocation};
use crate::models::{BackendKind, Destination, UploadRequest};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct S3Backend {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl S3Backend {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

#[async_trait]
impl UploadBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Aws
    }

    fn resolve(&self, file: &Path, request: &UploadRequest) -> Result<Destination> {
        let bucket = request
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| PipelineError::Validation("No S3 bucket selected".to_string()))?;

        Ok(Destination::Object {
            bucket: bucket.to_string(),
            key: prefixed(request.prefix(), &base_name(file)),
        })
    }

    fn status_line(&self, file_name: &str, destination: &Destination, size: u64) -> String {
        format!(
            "Uploading {} to AWS S3: {} ({:.2} MB)",
            file_name,
            destination,
            megabytes(size)
        )
    }

    async fn transfer(&self, file: &Path, destination: &Destination) -> Result<()> {
        let Destination::Object { .. } = destination else {
            return Err(PipelineError::Validation(format!(
                "S3 backend cannot write to {}",
                destination
            )));
        };

        let invocation = Invocation::new(&self.program)
            .args(["s3", "cp", "--no-progress"])
            .arg(file.to_string_lossy())
            .arg(destination.to_string())
            .streaming();

        let output = self.runner.run(&invocation).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(PipelineError::ExternalTool {
                tool: format!("{} s3 cp", self.program),
                diagnostic: output.diagnostic(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::{OutputMode, ToolOutput};

    #[test]
    fn test_resolve_builds_key_from_prefix() {
        let backend = S3Backend::new(Arc::new(ScriptedRunner::succeeding()), "aws");
        let request = UploadRequest::new("aws")
            .with_bucket("backups")
            .with_target("/vm/2024/");

        let destination = backend
            .resolve(Path::new("/conv/disk.raw"), &request)
            .unwrap();
        assert_eq!(destination.to_string(), "s3://backups/vm/2024/disk.raw");
    }

    #[test]
    fn test_resolve_requires_bucket() {
        let backend = S3Backend::new(Arc::new(ScriptedRunner::succeeding()), "aws");
        let result = backend.resolve(Path::new("disk.raw"), &UploadRequest::new("aws"));
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_transfer_streams_cp() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let backend = S3Backend::new(runner.clone(), "aws");
        let destination = Destination::Object {
            bucket: "backups".into(),
            key: "disk.raw".into(),
        };

        backend
            .transfer(Path::new("/conv/disk.raw"), &destination)
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mode, OutputMode::Stream);
        assert_eq!(
            calls[0].to_string(),
            "aws s3 cp --no-progress /conv/disk.raw s3://backups/disk.raw"
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_output() {
        let runner = Arc::new(ScriptedRunner::new(|_| {
            Ok(ToolOutput::failure(1, "An error occurred (AccessDenied)"))
        }));
        let backend = S3Backend::new(runner, "aws");
        let destination = Destination::Object {
            bucket: "b".into(),
            key: "k".into(),
        };

        let err = backend
            .transfer(Path::new("disk.raw"), &destination)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));
    }
}
