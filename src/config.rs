// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub resources: ResourceConfig,
    pub tools: ToolsConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub extract_dir: PathBuf,
    pub convert_dir: PathBuf,
    pub local_target: PathBuf,
    #[serde(default)]
    pub extra_search_roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    pub min_free_gb: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    pub qemu_img: String,
    pub aws: String,
    pub az: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    pub artifact_suffix: String,
    pub source_format: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Write local copies to a temp file and rename into place.
    #[serde(default)]
    pub staged_local_copy: bool,
}

impl ResourceConfig {
    pub fn min_free_bytes(&self) -> u64 {
        self.min_free_gb.saturating_mul(GIB)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PORTER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            paths: PathsConfig {
                extract_dir: PathBuf::from("/app/extracted"),
                convert_dir: PathBuf::from("/app/converted"),
                local_target: PathBuf::from("/data"),
                extra_search_roots: vec![],
            },
            resources: ResourceConfig { min_free_gb: 10 },
            tools: ToolsConfig {
                qemu_img: "qemu-img".to_string(),
                aws: "aws".to_string(),
                az: "az".to_string(),
            },
            extraction: ExtractionConfig {
                artifact_suffix: ".vmdk".to_string(),
                source_format: "vmdk".to_string(),
            },
            upload: UploadConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.extraction.artifact_suffix.is_empty() {
            return Err(PipelineError::Config(
                "artifact_suffix must not be empty".to_string(),
            ));
        }

        if self.extraction.source_format.is_empty() {
            return Err(PipelineError::Config(
                "source_format must not be empty".to_string(),
            ));
        }

        for (name, program) in [
            ("qemu_img", &self.tools.qemu_img),
            ("aws", &self.tools.aws),
            ("az", &self.tools.az),
        ] {
            if program.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "tools.{} must name a program",
                    name
                )));
            }
        }

        Ok(())
    }
}
