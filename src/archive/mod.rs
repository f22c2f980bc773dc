// file: src/archive/mod.rs
// description: archive extraction module exports
// reference: internal module structure

pub mod extractor;

pub use extractor::ArchiveExtractor;
