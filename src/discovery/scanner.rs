// file: src/discovery/scanner.rs
// description: directory walking for extracted artifacts and converted images
// reference: https://docs.rs/walkdir

use crate::config::Config;
use crate::models::TargetFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct FileScanner {
    extra_roots: Vec<PathBuf>,
}

impl FileScanner {
    /// Also walks `extra_roots`, e.g. volume mounts that mirror the main directories.
    pub fn new(extra_roots: Vec<PathBuf>) -> Self {
        Self { extra_roots }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.extra_search_roots.clone())
    }

    /// Files under `dir` whose name ends in `ext`, ignoring case.
    ///
    /// Each extra root is searched for a directory with the same final component as `dir`.
    /// Results keep the first path seen for every base name.
    pub fn find_files_with_extension(&self, dir: &Path, ext: &str) -> Vec<PathBuf> {
        let ext = ext.to_lowercase();
        let mut files = Self::walk(dir, &ext);

        if let Some(name) = dir.file_name() {
            for root in &self.extra_roots {
                let mirror = root.join(name);
                if mirror != dir {
                    files.extend(Self::walk(&mirror, &ext));
                }
            }
        }

        if files.is_empty() {
            return files;
        }

        debug!(
            "Found {} {} file(s) before deduplication",
            files.len(),
            ext
        );
        let unique = dedup_by_base_name(files);
        info!("Found {} unique {} file(s)", unique.len(), ext);
        unique
    }

    pub fn find_artifacts(&self, dir: &Path, suffix: &str) -> Vec<PathBuf> {
        self.find_files_with_extension(dir, suffix)
    }

    /// Converted images of every known format, grouped by extension.
    pub fn find_converted(&self, dir: &Path) -> Vec<PathBuf> {
        TargetFormat::extensions()
            .flat_map(|extension| self.find_files_with_extension(dir, &format!(".{}", extension)))
            .collect()
    }

    fn walk(dir: &Path, ext: &str) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .ends_with(ext)
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

fn dedup_by_base_name(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|file| {
            file.file_name()
                .map(|name| seen.insert(name.to_os_string()))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("a/disk1.vmdk"));
        touch(&temp.path().join("b/DISK2.VMDK"));
        touch(&temp.path().join("notes.txt"));

        let scanner = FileScanner::new(vec![]);
        let mut found = scanner.find_artifacts(temp.path(), ".vmdk");
        found.sort();

        assert_eq!(
            found,
            vec![temp.path().join("a/disk1.vmdk"), temp.path().join("b/DISK2.VMDK")]
        );
    }

    #[test]
    fn test_duplicates_by_base_name_are_dropped() {
        let temp = TempDir::new().unwrap();
        let primary = temp.path().join("work/extracted");
        let mirror_root = temp.path().join("mnt");
        touch(&primary.join("disk.vmdk"));
        touch(&mirror_root.join("extracted/disk.vmdk"));
        touch(&mirror_root.join("extracted/other.vmdk"));

        let scanner = FileScanner::new(vec![mirror_root.clone()]);
        let found = scanner.find_artifacts(&primary, ".vmdk");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0], primary.join("disk.vmdk"));
        assert!(found.contains(&mirror_root.join("extracted/other.vmdk")));
    }

    #[test]
    fn test_find_converted_groups_by_extension() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("b.qcow2"));
        touch(&temp.path().join("a.raw"));
        touch(&temp.path().join("c.vhd"));
        touch(&temp.path().join("d.vhdx"));
        touch(&temp.path().join("e.vmdk"));

        let found: Vec<String> = FileScanner::new(vec![])
            .find_converted(temp.path())
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(found, vec!["a.raw", "c.vhd", "b.qcow2", "d.vhdx"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let scanner = FileScanner::new(vec![]);
        assert!(scanner
            .find_converted(Path::new("/definitely/not/here"))
            .is_empty());
    }
}
