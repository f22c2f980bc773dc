// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod converter;
mod dispatcher;
mod orchestrator;
mod progress;

pub use converter::{ConversionDriver, conversion_summary};
pub use dispatcher::UploadDispatcher;
pub use orchestrator::{PipelineOrchestrator, RunReport};
pub use progress::{
    BatchId, ProgressHandle, ProgressRegistry, ProgressSnapshot, ProgressTracker, ProgressView,
};
