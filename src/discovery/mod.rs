// file: src/discovery/mod.rs
// description: file and cloud destination discovery exports
// reference: internal module structure

pub mod cloud;
pub mod scanner;

pub use cloud::CloudInventory;
pub use scanner::FileScanner;
