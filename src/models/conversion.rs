// file: src/models/conversion.rs
// description: target disk formats and per-input conversion outcomes
// reference: internal data structures

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Disk image formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Raw,
    Vpc,
    Qcow2,
    Vhdx,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 4] = [
        TargetFormat::Raw,
        TargetFormat::Vpc,
        TargetFormat::Qcow2,
        TargetFormat::Vhdx,
    ];

    /// Name passed to the converter's output-format argument.
    pub fn tool_name(self) -> &'static str {
        match self {
            TargetFormat::Raw => "raw",
            TargetFormat::Vpc => "vpc",
            TargetFormat::Qcow2 => "qcow2",
            TargetFormat::Vhdx => "vhdx",
        }
    }

    /// Extension written on disk; `vpc` images are `.vhd` files.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Raw => "raw",
            TargetFormat::Vpc => "vhd",
            TargetFormat::Qcow2 => "qcow2",
            TargetFormat::Vhdx => "vhdx",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TargetFormat::Raw => "RAW",
            TargetFormat::Vpc => "VHD (Hyper-V/Azure)",
            TargetFormat::Qcow2 => "QCOW2 (QEMU/OpenStack)",
            TargetFormat::Vhdx => "VHDX (Hyper-V)",
        }
    }

    /// `<output_dir>/<input base name>.<extension>`
    pub fn output_path(self, input: &Path, output_dir: &Path) -> PathBuf {
        let base = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(format!("{}.{}", base, self.extension()))
    }

    /// Extensions of every format, used to discover converted files.
    pub fn extensions() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(|format| format.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "raw" => Ok(TargetFormat::Raw),
            "vpc" => Ok(TargetFormat::Vpc),
            "qcow2" => Ok(TargetFormat::Qcow2),
            "vhdx" => Ok(TargetFormat::Vhdx),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// A finished conversion; failures abort the batch instead of producing a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub format: TargetFormat,
    pub output: PathBuf,
    /// `None` when the output could not be stat-ed.
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("qcow2".parse::<TargetFormat>().unwrap(), TargetFormat::Qcow2);
        assert_eq!("vpc".parse::<TargetFormat>().unwrap(), TargetFormat::Vpc);
        assert_eq!("".parse::<TargetFormat>().unwrap(), TargetFormat::Raw);
        assert!(matches!(
            "bogus".parse::<TargetFormat>(),
            Err(PipelineError::UnsupportedFormat(name)) if name == "bogus"
        ));
    }

    #[test]
    fn test_vpc_is_written_as_vhd() {
        let output =
            TargetFormat::Vpc.output_path(Path::new("/in/disk1.vmdk"), Path::new("/out"));
        assert_eq!(output, PathBuf::from("/out/disk1.vmdk.vhd"));
        assert_eq!(TargetFormat::Vpc.tool_name(), "vpc");
    }

    #[test]
    fn test_extensions_cover_all_formats() {
        let extensions: Vec<_> = TargetFormat::extensions().collect();
        assert_eq!(extensions, vec!["raw", "vhd", "qcow2", "vhdx"]);
    }

    #[test]
    fn test_job_serializes_unknown_size_as_null() {
        let job = ConversionJob {
            input: PathBuf::from("a.vmdk"),
            format: TargetFormat::Vpc,
            output: PathBuf::from("a.vmdk.vhd"),
            size: None,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["format"], "vpc");
        assert!(json["size"].is_null());
    }
}
