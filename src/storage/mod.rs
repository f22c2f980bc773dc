// file: src/storage/mod.rs
// description: filesystem resource checks module exports
// reference: internal module structure

pub mod space;

pub use space::{DiskSpaceProbe, FixedSpaceProbe, ResourceGuard, SpaceProbe};
