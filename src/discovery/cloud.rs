// file: src/discovery/cloud.rs
// description: read-only listing of buckets, subscriptions and blob containers
// reference: queries the aws and az command-line tools

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::exec::{CommandRunner, Invocation, ToolOutput};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

const CONTAINER_QUERY_CONCURRENCY: usize = 4;

pub struct CloudInventory {
    runner: Arc<dyn CommandRunner>,
    aws: String,
    az: String,
}

impl CloudInventory {
    pub fn new(runner: Arc<dyn CommandRunner>, aws: impl Into<String>, az: impl Into<String>) -> Self {
        Self {
            runner,
            aws: aws.into(),
            az: az.into(),
        }
    }

    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(runner, &config.tools.aws, &config.tools.az)
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let invocation = Invocation::new(&self.aws)
            .args(["s3api", "list-buckets"])
            .args(["--query", "Buckets[].Name", "--output", "text"]);

        let output = self.checked(&invocation, "Failed to list S3 buckets").await?;
        Ok(output
            .stdout
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    /// Subscription names; any failure degrades to an empty list.
    pub async fn list_accounts(&self) -> Vec<String> {
        let invocation = Invocation::new(&self.az)
            .args(["account", "list"])
            .args(["--query", "[].name", "-o", "tsv"]);

        match self.checked(&invocation, "Error listing Azure accounts").await {
            Ok(output) => {
                let accounts = lines(&output.stdout);
                if accounts.is_empty() {
                    info!("No Azure accounts found");
                } else {
                    info!("Found {} Azure accounts", accounts.len());
                }
                accounts
            }
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Every container of every storage account in `subscription`, as `account/container`.
    ///
    /// Accounts whose containers cannot be listed are skipped.
    pub async fn list_containers(&self, subscription: &str) -> Result<Vec<String>> {
        let invocation = Invocation::new(&self.az)
            .args(["storage", "account", "list"])
            .args(["--subscription", subscription])
            .args(["--query", "[].name", "-o", "tsv"]);

        let output = self
            .checked(&invocation, "Failed to list storage accounts")
            .await?;
        let accounts = lines(&output.stdout);
        if accounts.is_empty() {
            return Err(PipelineError::Validation(format!(
                "No storage accounts found in subscription '{}'",
                subscription
            )));
        }
        info!(
            "Found {} storage accounts in subscription '{}'",
            accounts.len(),
            subscription
        );

        let listed: Vec<Vec<String>> = stream::iter(accounts)
            .map(|account| async move {
                match self.containers_of(subscription, &account).await {
                    Ok(containers) => containers
                        .into_iter()
                        .map(|container| format!("{}/{}", account, container))
                        .collect(),
                    Err(e) => {
                        warn!(
                            "Failed to list containers for storage account '{}': {}",
                            account, e
                        );
                        Vec::new()
                    }
                }
            })
            .buffered(CONTAINER_QUERY_CONCURRENCY)
            .collect()
            .await;

        Ok(listed.into_iter().flatten().collect())
    }

    async fn containers_of(&self, subscription: &str, account: &str) -> Result<Vec<String>> {
        let invocation = Invocation::new(&self.az)
            .args(["storage", "container", "list"])
            .args(["--subscription", subscription])
            .args(["--account-name", account])
            .args(["--auth-mode", "login"])
            .args(["--query", "[].name", "-o", "tsv"]);

        let output = self
            .checked(&invocation, "Failed to list containers")
            .await?;
        Ok(lines(&output.stdout))
    }

    async fn checked(&self, invocation: &Invocation, context: &str) -> Result<ToolOutput> {
        let output = self.runner.run(invocation).await?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(PipelineError::ExternalTool {
                tool: invocation.to_string(),
                diagnostic: format!("{}: {}", context, output.diagnostic()),
            })
        }
    }
}

/// Non-empty trimmed lines; names may contain spaces.
fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
