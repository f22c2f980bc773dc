// file: src/backends/azure.rs
// description: blob storage uploads through the az command-line tool
// reference: destination given as account/container plus optional blob prefix

use super::{UploadBackend, base_name, megabytes, prefixed};
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, Invocation};
use crate::models::{BackendKind, Destination, UploadRequest};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct AzureBlobBackend {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl AzureBlobBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

/// Splits `account/container`; anything other than two non-empty parts is rejected.
pub fn parse_container_spec(spec: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = spec.split('/').collect();
    match parts.as_slice() {
        [account, container] if !account.is_empty() && !container.is_empty() => {
            Ok((account.to_string(), container.to_string()))
        }
        _ => Err(PipelineError::Validation(format!(
            "Invalid Azure container format '{}'. Expected 'storageAccount/container'",
            spec
        ))),
    }
}

#[async_trait]
impl UploadBackend for AzureBlobBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Azure
    }

    fn resolve(&self, file: &Path, request: &UploadRequest) -> Result<Destination> {
        let (account, container) =
            parse_container_spec(request.container.as_deref().unwrap_or_default())?;
        let subscription = request
            .subscription
            .as_deref()
            .map(str::trim)
            .filter(|subscription| !subscription.is_empty())
            .ok_or_else(|| {
                PipelineError::Validation("No Azure subscription selected".to_string())
            })?;

        Ok(Destination::Blob {
            subscription: subscription.to_string(),
            account,
            container,
            blob: prefixed(request.prefix(), &base_name(file)),
        })
    }

    fn status_line(&self, file_name: &str, destination: &Destination, size: u64) -> String {
        format!(
            "Uploading {} to Azure: {} ({:.2} MB)",
            file_name,
            destination,
            megabytes(size)
        )
    }

    async fn transfer(&self, file: &Path, destination: &Destination) -> Result<()> {
        let Destination::Blob {
            subscription,
            account,
            container,
            blob,
        } = destination
        else {
            return Err(PipelineError::Validation(format!(
                "Azure backend cannot write to {}",
                destination
            )));
        };

        let invocation = Invocation::new(&self.program)
            .args(["storage", "blob", "upload"])
            .args(["--subscription", subscription.as_str()])
            .args(["--account-name", account.as_str()])
            .args(["--container-name", container.as_str()])
            .args(["--auth-mode", "login"])
            .args(["--name", blob.as_str()])
            .arg("--file")
            .arg(file.to_string_lossy())
            .streaming();

        let output = self.runner.run(&invocation).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(PipelineError::ExternalTool {
                tool: format!("{} storage blob upload", self.program),
                diagnostic: output.diagnostic(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    #[test]
    fn test_parse_container_spec() {
        assert_eq!(
            parse_container_spec("acct/images").unwrap(),
            ("acct".to_string(), "images".to_string())
        );
        assert!(parse_container_spec("acct").is_err());
        assert!(parse_container_spec("acct/").is_err());
        assert!(parse_container_spec("/images").is_err());
        assert!(parse_container_spec("a/b/c").is_err());
        assert!(parse_container_spec("").is_err());
    }

    #[test]
    fn test_resolve_with_prefix() {
        let backend = AzureBlobBackend::new(Arc::new(ScriptedRunner::succeeding()), "az");
        let request = UploadRequest::new("azure")
            .with_subscription("prod")
            .with_container("acct/images")
            .with_target("/vm");

        let destination = backend.resolve(Path::new("/conv/disk.vhd"), &request).unwrap();
        assert_eq!(
            destination,
            Destination::Blob {
                subscription: "prod".into(),
                account: "acct".into(),
                container: "images".into(),
                blob: "vm/disk.vhd".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_transfer_arguments() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let backend = AzureBlobBackend::new(runner.clone(), "az");
        let destination = Destination::Blob {
            subscription: "prod".into(),
            account: "acct".into(),
            container: "images".into(),
            blob: "disk.vhd".into(),
        };

        backend
            .transfer(Path::new("/conv/disk.vhd"), &destination)
            .await
            .unwrap();

        assert_eq!(
            runner.calls()[0].to_string(),
            "az storage blob upload --subscription prod --account-name acct \
             --container-name images --auth-mode login --name disk.vhd --file /conv/disk.vhd"
        );
    }
}
