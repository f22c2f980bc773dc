// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use porter::utils::logging::{format_error, format_info, format_success, format_warning};
use porter::{
    BatchId, BatchResult, BatchVerdict, CloudInventory, Config, ConversionJob, FileScanner,
    HealthReport, OperationTimer, PipelineError, PipelineOrchestrator, ProgressHandle,
    ProgressRegistry, ProgressSnapshot, ProgressView, ResourceGuard, UploadRequest, Validator,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "porter")]
#[command(version)]
#[command(about = "Extract, convert and upload virtual machine disk images", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DestinationArgs {
    /// local, aws or azure
    #[arg(short, long, default_value = "local")]
    backend: String,

    /// Directory for local uploads, key or blob prefix for cloud uploads
    #[arg(short, long)]
    target: Option<String>,

    #[arg(long)]
    bucket: Option<String>,

    #[arg(long)]
    subscription: Option<String>,

    /// storageAccount/container
    #[arg(long, value_name = "ACCOUNT/CONTAINER")]
    container: Option<String>,

    /// Print progress snapshots as JSON lines instead of a progress bar
    #[arg(long)]
    json_progress: bool,
}

impl DestinationArgs {
    fn request(&self) -> UploadRequest {
        let mut request = UploadRequest::new(&self.backend);
        if let Some(target) = &self.target {
            request = request.with_target(target);
        }
        if let Some(bucket) = &self.bucket {
            request = request.with_bucket(bucket);
        }
        if let Some(subscription) = &self.subscription {
            request = request.with_subscription(subscription);
        }
        if let Some(container) = &self.container {
            request = request.with_container(container);
        }
        request
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a tar or OVA archive into the extraction directory
    Extract {
        archive: PathBuf,

        #[arg(short, long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },

    /// Convert disk images; defaults to every extracted artifact
    Convert {
        #[arg(short, long, default_value = "raw")]
        format: String,

        #[arg(long)]
        json_progress: bool,

        files: Vec<PathBuf>,
    },

    /// Upload images; defaults to every converted file
    Upload {
        #[command(flatten)]
        destination: DestinationArgs,

        files: Vec<PathBuf>,
    },

    /// Extract, convert and upload in one go
    Run {
        archive: PathBuf,

        #[arg(short, long, default_value = "raw")]
        format: String,

        #[command(flatten)]
        destination: DestinationArgs,
    },

    /// List extracted artifacts and converted images
    Discover,

    /// List S3 buckets
    Buckets,

    /// List Azure subscriptions
    Accounts,

    /// List Azure blob containers as account/container
    Containers {
        #[arg(long)]
        subscription: String,
    },

    /// Check tool availability and free space
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    porter::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    let orchestrator = PipelineOrchestrator::new(config);

    match cli.command {
        Commands::Extract { archive, dest } => {
            cmd_extract(&orchestrator, archive, dest).await?;
        }
        Commands::Convert {
            format,
            json_progress,
            files,
        } => {
            let files = if files.is_empty() {
                extracted_artifacts(orchestrator.config())
            } else {
                files
            };
            cmd_convert(&orchestrator, &format, files, json_progress, cli.color).await?;
        }
        Commands::Upload { destination, files } => {
            let files = if files.is_empty() {
                let config = orchestrator.config();
                FileScanner::from_config(config).find_converted(&config.paths.convert_dir)
            } else {
                files
            };
            cmd_upload(&orchestrator, &destination, files, cli.color).await?;
        }
        Commands::Run {
            archive,
            format,
            destination,
        } => {
            cmd_run(&orchestrator, archive, &format, &destination, cli.color).await?;
        }
        Commands::Discover => {
            cmd_discover(orchestrator.config());
        }
        Commands::Buckets => {
            cmd_buckets(&orchestrator).await?;
        }
        Commands::Accounts => {
            cmd_accounts(&orchestrator).await;
        }
        Commands::Containers { subscription } => {
            cmd_containers(&orchestrator, &subscription).await?;
        }
        Commands::Doctor => {
            cmd_doctor(orchestrator.config());
        }
    }

    Ok(())
}

async fn cmd_extract(
    orchestrator: &PipelineOrchestrator,
    archive: PathBuf,
    dest: Option<PathBuf>,
) -> Result<()> {
    Validator::validate_file_path(&archive)?;
    let timer = OperationTimer::new("extract");

    let report = orchestrator
        .extract_file(&archive, dest.as_deref())
        .await
        .with_context(|| format!("Failed to extract {}", archive.display()))?;

    timer.finish_with_count(report.files.len());
    println!(
        "{}",
        format_success(&format!(
            "Extracted {} file(s), {:.2} MB into {}",
            report.files.len(),
            report.bytes_written() as f64 / (1024.0 * 1024.0),
            report.root.display()
        ))
    );
    for artifact in report.artifacts() {
        println!("  {}", artifact.display());
    }

    Ok(())
}

fn extracted_artifacts(config: &Config) -> Vec<PathBuf> {
    FileScanner::from_config(config)
        .find_artifacts(&config.paths.extract_dir, &config.extraction.artifact_suffix)
}

async fn cmd_convert(
    orchestrator: &PipelineOrchestrator,
    format: &str,
    files: Vec<PathBuf>,
    json_progress: bool,
    colored: bool,
) -> Result<()> {
    Validator::validate_selection(&files, "convert")?;

    let timer = OperationTimer::new("convert");
    let batch = orchestrator.begin_batch(files.len());
    let poller = Poller::spawn(Watch::Batch(batch.clone()), json_progress, colored);
    let result = orchestrator.convert(&files, format, &batch).await;
    poller.stop().await;
    orchestrator.registry().forget(&batch.id());

    let jobs = result.map_err(conversion_failure)?;
    timer.finish_with_count(jobs.len());
    report_conversions(&jobs);
    Ok(())
}

async fn cmd_upload(
    orchestrator: &PipelineOrchestrator,
    destination: &DestinationArgs,
    files: Vec<PathBuf>,
    colored: bool,
) -> Result<()> {
    if files.is_empty() {
        anyhow::bail!(PipelineError::Validation(
            "Please select at least one file to upload".to_string()
        ));
    }

    let timer = OperationTimer::new("upload");
    let batch = orchestrator.begin_batch(files.len());
    let poller = Poller::spawn(
        Watch::Batch(batch.clone()),
        destination.json_progress,
        colored,
    );
    let result = orchestrator
        .upload(&files, &destination.request(), &batch)
        .await;
    poller.stop().await;
    orchestrator.registry().forget(&batch.id());

    let result = result.context("Upload failed")?;
    timer.finish_with_count(result.processed());
    report_batch(&result)
}

/// Only the archive's own artifacts are converted and uploaded.
async fn cmd_run(
    orchestrator: &PipelineOrchestrator,
    archive: PathBuf,
    format: &str,
    destination: &DestinationArgs,
    colored: bool,
) -> Result<()> {
    Validator::validate_file_path(&archive)?;
    let timer = OperationTimer::new("run");

    let poller = Poller::spawn(
        Watch::Latest(orchestrator.registry()),
        destination.json_progress,
        colored,
    );
    let result = orchestrator
        .run(&archive, format, &destination.request())
        .await;
    poller.stop().await;

    let report = match result {
        Ok(report) => report,
        Err(e @ PipelineError::ConversionAborted { .. }) => return Err(conversion_failure(e)),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to process {}", archive.display()));
        }
    };

    timer.finish_with_count(report.upload.processed());
    println!(
        "{}",
        format_info(&format!(
            "Extracted {} artifact(s) from {}",
            report.extraction.artifacts().len(),
            archive.display()
        ))
    );
    report_conversions(&report.conversions);
    report_batch(&report.upload)
}

/// Lists what finished before the failing input, then turns the abort into the command error.
fn conversion_failure(error: PipelineError) -> anyhow::Error {
    match error {
        PipelineError::ConversionAborted {
            input,
            diagnostic,
            completed,
        } => {
            for job in &completed {
                println!("{}", format_success(&job.output.display().to_string()));
            }
            anyhow::anyhow!(
                "Conversion of {} failed after {} successful conversion(s): {}",
                input.display(),
                completed.len(),
                diagnostic
            )
        }
        other => anyhow::Error::new(other).context("Conversion failed"),
    }
}

fn report_conversions(jobs: &[ConversionJob]) {
    for job in jobs {
        let size = job
            .size
            .map(|size| format!("{:.2} MB", size as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "size unknown".to_string());
        println!(
            "{}",
            format_success(&format!("{} ({})", job.output.display(), size))
        );
    }
}

fn report_batch(result: &BatchResult) -> Result<()> {
    for item in &result.items {
        match item.diagnostic() {
            None => {
                let target = item
                    .destination
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                println!(
                    "{}",
                    format_success(&format!("{} -> {}", item.source.display(), target))
                );
            }
            Some(diagnostic) => {
                println!(
                    "{}",
                    format_error(&format!("{}: {}", item.source.display(), diagnostic))
                );
            }
        }
    }

    let summary = result.summary();
    match result.verdict() {
        BatchVerdict::AllSucceeded => println!("{}", format_success(&summary)),
        BatchVerdict::Mixed => println!("{}", format_warning(&summary)),
        BatchVerdict::AllFailed => anyhow::bail!(summary),
    }

    Ok(())
}

fn cmd_discover(config: &Config) {
    if let Err(e) = Validator::validate_directory(&config.paths.extract_dir) {
        warn!("{}", e);
    }

    let scanner = FileScanner::from_config(config);
    let artifacts =
        scanner.find_artifacts(&config.paths.extract_dir, &config.extraction.artifact_suffix);
    let converted = scanner.find_converted(&config.paths.convert_dir);

    println!("Extracted artifacts ({}):", artifacts.len());
    for path in &artifacts {
        println!("  {}", path.display());
    }
    println!("Converted images ({}):", converted.len());
    for path in &converted {
        println!("  {}", path.display());
    }
}

async fn cmd_buckets(orchestrator: &PipelineOrchestrator) -> Result<()> {
    let inventory = CloudInventory::from_config(orchestrator.config(), orchestrator.runner());
    let buckets = inventory
        .list_buckets()
        .await
        .context("Failed to list S3 buckets")?;

    for bucket in buckets {
        println!("{}", bucket);
    }
    Ok(())
}

async fn cmd_accounts(orchestrator: &PipelineOrchestrator) {
    let inventory = CloudInventory::from_config(orchestrator.config(), orchestrator.runner());
    for account in inventory.list_accounts().await {
        println!("{}", account);
    }
}

async fn cmd_containers(orchestrator: &PipelineOrchestrator, subscription: &str) -> Result<()> {
    let inventory = CloudInventory::from_config(orchestrator.config(), orchestrator.runner());
    let containers = inventory
        .list_containers(subscription)
        .await
        .with_context(|| format!("Failed to list containers in '{}'", subscription))?;

    for container in containers {
        println!("{}", container);
    }
    Ok(())
}

fn cmd_doctor(config: &Config) {
    let report = HealthReport::collect(config);
    println!("{}", report.format());

    let guard = ResourceGuard::system();
    let required = config.resources.min_free_bytes();
    for dir in [&config.paths.extract_dir, &config.paths.convert_dir] {
        let line = format!(
            "{} has at least {} GB free",
            dir.display(),
            config.resources.min_free_gb
        );
        if guard.has_free_space(dir, required) {
            println!("{}", format_success(&line));
        } else {
            println!("{}", format_error(&format!("Not enough space: {}", line)));
        }
    }
}

/// What a poller follows: one batch, or whichever batch the registry started last.
enum Watch {
    Batch(ProgressHandle),
    Latest(Arc<ProgressRegistry>),
}

impl Watch {
    fn current(&self) -> Option<(BatchId, ProgressSnapshot)> {
        match self {
            Watch::Batch(handle) => Some((handle.id(), handle.snapshot())),
            Watch::Latest(registry) => registry.latest(),
        }
    }
}

/// Renders snapshots until stopped; each new batch gets its own bar.
struct Poller {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    fn spawn(watch: Watch, json: bool, colored: bool) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();

        let task = tokio::spawn(async move {
            let mut view: Option<ProgressView> = None;
            let mut shown: Option<(BatchId, ProgressSnapshot)> = None;
            let mut interval = tokio::time::interval(POLL_INTERVAL);

            loop {
                let stopping = tokio::select! {
                    _ = stop.cancelled() => true,
                    _ = interval.tick() => false,
                };

                if let Some((id, snapshot)) = watch.current() {
                    let same_batch = shown.as_ref().is_some_and(|(shown_id, _)| *shown_id == id);
                    if !same_batch {
                        if let (Some(view), Some((_, last))) = (&view, &shown) {
                            view.finish(last);
                        }
                        view = (!json).then(|| ProgressView::new(colored));
                    }

                    let changed = shown.as_ref().map(|(_, last)| last) != Some(&snapshot);
                    if !same_batch || changed {
                        match &view {
                            Some(view) => view.render(&snapshot),
                            None => match serde_json::to_string(&snapshot) {
                                Ok(line) => println!("{}", line),
                                Err(e) => warn!("Failed to encode progress: {}", e),
                            },
                        }
                        shown = Some((id, snapshot));
                    }
                }

                if stopping {
                    if let (Some(view), Some((_, last))) = (&view, &shown) {
                        view.finish(last);
                    }
                    break;
                }
            }
        });

        Self { token, task }
    }

    async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Progress poller ended abnormally: {}", e);
        }
    }
}
