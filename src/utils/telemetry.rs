// file: src/utils/telemetry.rs
// description: tool availability checks, runtime environment notice and stage timing
// reference: https://docs.rs/which

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

const CONTAINER_MARKER: &str = "/.dockerenv";

/// Health status for various system components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub location: Option<PathBuf>,
}

impl HealthCheck {
    pub fn healthy(component: &str, location: PathBuf) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Healthy,
            message: None,
            location: Some(location),
        }
    }

    pub fn degraded(component: &str, message: String) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Degraded,
            message: Some(message),
            location: None,
        }
    }

    pub fn unhealthy(component: &str, message: String) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(message),
            location: None,
        }
    }

    /// Looks `program` up on `PATH`. A missing required tool is unhealthy, an optional one degraded.
    pub fn tool(program: &str, required: bool) -> Self {
        match which::which(program) {
            Ok(location) => Self::healthy(program, location),
            Err(e) if required => Self::unhealthy(program, format!("not found on PATH: {}", e)),
            Err(e) => Self::degraded(program, format!("not found on PATH: {}", e)),
        }
    }
}

/// Where the process runs; container hosts need credential and volume mounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Container,
    Host,
}

impl RuntimeEnvironment {
    pub fn detect() -> Self {
        Self::detect_with_marker(Path::new(CONTAINER_MARKER))
    }

    pub fn detect_with_marker(marker: &Path) -> Self {
        if marker.exists() {
            RuntimeEnvironment::Container
        } else {
            RuntimeEnvironment::Host
        }
    }

    pub fn notice(self) -> &'static str {
        match self {
            RuntimeEnvironment::Container => {
                "Running inside a container. Mount ~/.aws and ~/.azure for credentials, and mount \
                 host directories for the extraction and conversion paths so large images do not \
                 fill the container's disk."
            }
            RuntimeEnvironment::Host => {
                "Running locally. Ensure qemu-img, the aws CLI and the az CLI are installed."
            }
        }
    }
}

/// Overall system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub environment: RuntimeEnvironment,
    pub timestamp: u64,
    pub version: String,
}

impl HealthReport {
    pub fn new(checks: Vec<HealthCheck>, environment: RuntimeEnvironment, version: String) -> Self {
        let overall_status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs();

        Self {
            overall_status,
            checks,
            environment,
            timestamp,
            version,
        }
    }

    /// The converter is required; the cloud CLIs only gate their own backends.
    pub fn collect(config: &Config) -> Self {
        let checks = vec![
            HealthCheck::tool(&config.tools.qemu_img, true),
            HealthCheck::tool(&config.tools.aws, false),
            HealthCheck::tool(&config.tools.az, false),
        ];
        Self::new(
            checks,
            RuntimeEnvironment::detect(),
            env!("CARGO_PKG_VERSION").to_string(),
        )
    }

    pub fn format(&self) -> String {
        let status_icon = icon(&self.overall_status);

        let mut output = format!(
            "{} System Health: {:?}\n\
             Version: {}\n\
             Timestamp: {}\n\
             {}\n\n",
            status_icon,
            self.overall_status,
            self.version,
            chrono::DateTime::from_timestamp(self.timestamp as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            self.environment.notice()
        );

        for check in &self.checks {
            output.push_str(&format!(
                "{} {} ({:?})",
                icon(&check.status),
                check.component,
                check.status
            ));

            if let Some(ref location) = check.location {
                output.push_str(&format!(" - {}", location.display()));
            }
            if let Some(ref msg) = check.message {
                output.push_str(&format!("\n  {}", msg));
            }

            output.push('\n');
        }

        output
    }
}

fn icon(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✓",
        HealthStatus::Degraded => "⚠",
        HealthStatus::Unhealthy => "✗",
    }
}

/// Operation timer for performance tracking
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting operation: {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} in {:.2}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn finish_with_count(self, count: usize) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} - {} items in {:.2}s",
            self.operation,
            count,
            elapsed.as_secs_f64()
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tool_status_depends_on_requirement() {
        let program = "porter-no-such-tool-7f3a";
        assert_eq!(HealthCheck::tool(program, true).status, HealthStatus::Unhealthy);
        assert_eq!(HealthCheck::tool(program, false).status, HealthStatus::Degraded);
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_found_on_path() {
        let check = HealthCheck::tool("sh", true);
        assert_eq!(check.status, HealthStatus::Healthy);
        assert!(check.location.is_some());
    }

    #[test]
    fn test_health_report_overall_status() {
        let checks = vec![
            HealthCheck::healthy("qemu-img", PathBuf::from("/usr/bin/qemu-img")),
            HealthCheck::degraded("az", "not found".to_string()),
        ];

        let report = HealthReport::new(checks, RuntimeEnvironment::Host, "0.1.0".to_string());
        assert_eq!(report.overall_status, HealthStatus::Degraded);
        assert!(report.format().contains("Running locally"));
    }

    #[test]
    fn test_environment_marker() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join(".dockerenv");
        assert_eq!(
            RuntimeEnvironment::detect_with_marker(&marker),
            RuntimeEnvironment::Host
        );

        std::fs::write(&marker, b"").unwrap();
        assert_eq!(
            RuntimeEnvironment::detect_with_marker(&marker),
            RuntimeEnvironment::Container
        );
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
