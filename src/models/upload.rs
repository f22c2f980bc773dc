// file: src/models/upload.rs
// description: upload destinations, per-item outcomes and batch aggregation
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Aws,
    Azure,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Aws => "aws",
            BackendKind::Azure => "azure",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "aws" | "s3" => Ok(BackendKind::Aws),
            "azure" => Ok(BackendKind::Azure),
            other => Err(format!("Unknown upload backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied destination parameters; which fields matter depends on the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    pub backend: String,
    /// Local directory, or key/blob prefix for the cloud backends.
    pub target: Option<String>,
    pub bucket: Option<String>,
    pub subscription: Option<String>,
    /// `account/container`
    pub container: Option<String>,
}

impl UploadRequest {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Target with any leading slash removed; `None` when blank.
    pub fn prefix(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(|t| t.trim_start_matches('/'))
            .filter(|t| !t.is_empty())
    }
}

/// Fully resolved destination for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Local {
        path: PathBuf,
    },
    Object {
        bucket: String,
        key: String,
    },
    Blob {
        subscription: String,
        account: String,
        container: String,
        blob: String,
    },
}

impl Destination {
    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            Destination::Local { path } => path.parent(),
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local { path } => write!(f, "{}", path.display()),
            Destination::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Destination::Blob {
                account,
                container,
                blob,
                ..
            } => write!(f, "{}/{}/{}", account, container, blob),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded,
    Failed { diagnostic: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub source: PathBuf,
    pub backend: String,
    /// `None` when the destination could not be resolved.
    pub destination: Option<Destination>,
    pub outcome: UploadOutcome,
}

impl UploadItem {
    pub fn uploaded(source: &Path, backend: &str, destination: Destination) -> Self {
        Self {
            source: source.to_path_buf(),
            backend: backend.to_string(),
            destination: Some(destination),
            outcome: UploadOutcome::Uploaded,
        }
    }

    pub fn failed(
        source: &Path,
        backend: &str,
        destination: Option<Destination>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            source: source.to_path_buf(),
            backend: backend.to_string(),
            destination,
            outcome: UploadOutcome::Failed {
                diagnostic: diagnostic.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Uploaded)
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match &self.outcome {
            UploadOutcome::Failed { diagnostic } => Some(diagnostic),
            UploadOutcome::Uploaded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchVerdict {
    AllSucceeded,
    Mixed,
    AllFailed,
}

/// Ordered outcomes of one upload batch. Partial failure is a normal result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub items: Vec<UploadItem>,
    pub success_count: usize,
    pub fail_count: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: UploadItem) {
        if item.is_success() {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.items.push(item);
    }

    pub fn processed(&self) -> usize {
        self.items.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Upload completed: {} successful, {} failed",
            self.success_count, self.fail_count
        )
    }

    pub fn verdict(&self) -> BatchVerdict {
        if self.fail_count == 0 {
            BatchVerdict::AllSucceeded
        } else if self.success_count == 0 {
            BatchVerdict::AllFailed
        } else {
            BatchVerdict::Mixed
        }
    }
}
