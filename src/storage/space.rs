// file: src/storage/space.rs
// description: pre-flight free space checks before large writes
// reference: https://docs.rs/sysinfo

use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;
use tracing::{debug, warn};

/// Source of "available bytes" for the filesystem backing a path.
pub trait SpaceProbe: Send + Sync {
    /// `None` when the space cannot be determined.
    fn available_space(&self, path: &Path) -> Option<u64>;
}

/// Probe backed by the mounted disk list; picks the longest mount point containing the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskSpaceProbe;

impl SpaceProbe for DiskSpaceProbe {
    fn available_space(&self, path: &Path) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();
        let search_path = nearest_existing(path)?;

        let mut matched_len = 0;
        let mut available = None;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if search_path.starts_with(mount) {
                let mount_len = mount.as_os_str().len();
                if available.is_none() || mount_len > matched_len {
                    matched_len = mount_len;
                    available = Some(disk.available_space());
                }
            }
        }

        available
    }
}

/// Walks up to the closest existing ancestor so a not-yet-created directory still resolves.
fn nearest_existing(path: &Path) -> Option<PathBuf> {
    let path = std::path::absolute(path).ok()?;
    path.ancestors()
        .find(|candidate| candidate.exists())
        .and_then(|existing| existing.canonicalize().ok())
}

/// Reports a fixed amount of space; `None` simulates an unqueryable filesystem.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub Option<u64>);

impl SpaceProbe for FixedSpaceProbe {
    fn available_space(&self, _path: &Path) -> Option<u64> {
        self.0
    }
}

#[derive(Clone)]
pub struct ResourceGuard {
    probe: Arc<dyn SpaceProbe>,
}

impl ResourceGuard {
    pub fn new(probe: Arc<dyn SpaceProbe>) -> Self {
        Self { probe }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(DiskSpaceProbe))
    }

    pub fn with_fixed(available: Option<u64>) -> Self {
        Self::new(Arc::new(FixedSpaceProbe(available)))
    }

    /// Conservative: an undeterminable filesystem reports `false`.
    pub fn has_free_space(&self, path: &Path, min_bytes: u64) -> bool {
        match self.probe.available_space(path) {
            Some(available) => {
                debug!(
                    "{} bytes available at {} (need {})",
                    available,
                    path.display(),
                    min_bytes
                );
                available >= min_bytes
            }
            None => {
                warn!("Could not determine free space for {}", path.display());
                false
            }
        }
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard").finish_non_exhaustive()
    }
}
