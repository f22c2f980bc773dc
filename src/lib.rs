// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns

//! Virtual disk pipeline: extract appliance archives, convert disk images with
//! `qemu-img`, and ship the results to a local directory, S3 or Azure Blob storage.

pub mod archive;
pub mod backends;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub use archive::ArchiveExtractor;
pub use backends::{AzureBlobBackend, LocalBackend, S3Backend, UploadBackend};
pub use config::{Config, ExtractionConfig, PathsConfig, ResourceConfig, ToolsConfig, UploadConfig};
pub use discovery::{CloudInventory, FileScanner};
pub use error::{PipelineError, Result};
pub use exec::{CommandRunner, Invocation, SystemRunner, ToolOutput};
pub use models::{
    BackendKind, BatchResult, BatchVerdict, ConversionJob, Destination, ExtractionReport,
    TargetFormat, UploadItem, UploadRequest,
};
pub use pipeline::{
    BatchId, ConversionDriver, PipelineOrchestrator, ProgressHandle, ProgressRegistry,
    ProgressSnapshot, ProgressTracker, ProgressView, RunReport, UploadDispatcher,
};
pub use storage::{DiskSpaceProbe, ResourceGuard, SpaceProbe};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};
