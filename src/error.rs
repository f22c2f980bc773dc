// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::models::ConversionJob;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported conversion format: {0}")]
    UnsupportedFormat(String),

    #[error("Not enough free disk space at {path} (need {required} bytes)")]
    InsufficientSpace { path: PathBuf, required: u64 },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Extraction failed writing {path}: {source}")]
    ExtractionIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{tool} failed: {diagnostic}")]
    ExternalTool { tool: String, diagnostic: String },

    #[error("Conversion failed for {input}: {diagnostic}")]
    ConversionAborted {
        input: PathBuf,
        diagnostic: String,
        completed: Vec<ConversionJob>,
    },

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn file_operation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOperation {
            path: path.into(),
            source,
        }
    }

    /// True for the caller-input class of failures (nothing was attempted).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnsupportedFormat(_))
    }
}
