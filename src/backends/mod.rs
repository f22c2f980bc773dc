// file: src/backends/mod.rs
// description: upload backend capability and its implementations
// reference: internal module structure

pub mod azure;
pub mod local;
pub mod s3;

use crate::error::Result;
use crate::models::{BackendKind, Destination, UploadRequest};
use async_trait::async_trait;
use std::path::Path;

pub use azure::AzureBlobBackend;
pub use local::LocalBackend;
pub use s3::S3Backend;

/// One upload destination family.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Computes where `file` goes; malformed parameters are an error for this item only.
    fn resolve(&self, file: &Path, request: &UploadRequest) -> Result<Destination>;

    /// Human-readable progress status for a transfer that is about to start.
    fn status_line(&self, file_name: &str, destination: &Destination, size: u64) -> String;

    async fn transfer(&self, file: &Path, destination: &Destination) -> Result<()>;
}

pub(crate) fn base_name(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

/// `prefix/name`, or just `name` without a prefix.
pub(crate) fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), name),
        None => name.to_string(),
    }
}

pub(crate) fn megabytes(size: u64) -> f64 {
    size as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed() {
        assert_eq!(prefixed(Some("vm/images"), "a.raw"), "vm/images/a.raw");
        assert_eq!(prefixed(Some("vm/"), "a.raw"), "vm/a.raw");
        assert_eq!(prefixed(None, "a.raw"), "a.raw");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/app/converted/disk.qcow2")), "disk.qcow2");
    }
}
