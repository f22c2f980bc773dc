// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod archive;
pub mod conversion;
pub mod upload;

pub use archive::{ExtractedFile, ExtractionReport};
pub use conversion::{ConversionJob, TargetFormat};
pub use upload::{
    BackendKind, BatchResult, BatchVerdict, Destination, UploadItem, UploadOutcome, UploadRequest,
};
