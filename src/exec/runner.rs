// file: src/exec/runner.rs
// description: external tool invocation with concurrent stdout/stderr draining
// reference: https://docs.rs/tokio/latest/tokio/process

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How the tool's output is surfaced while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collected quietly, logged at debug level.
    Capture,
    /// Forwarded to the log line by line as it arrives.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub mode: OutputMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mode: OutputMode::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn streaming(mut self) -> Self {
        self.mode = OutputMode::Stream;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status plus stdout and stderr interleaved in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub combined: String,
    /// Standard output alone, for callers that parse the tool's answer.
    pub stdout: String,
}

impl ToolOutput {
    /// `output` is treated as standard output.
    pub fn success(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            code: Some(0),
            combined: output.clone(),
            stdout: output,
        }
    }

    /// `output` is treated as standard error.
    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            combined: output.into(),
            stdout: String::new(),
        }
    }

    /// Appends stderr lines that only show up in `combined`.
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.combined.push_str(stderr);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Status plus captured output, for error reporting.
    pub fn diagnostic(&self) -> String {
        let output = self.combined.trim();
        if output.is_empty() {
            self.status_text()
        } else {
            format!("{}\nOutput: {}", self.status_text(), output)
        }
    }
}

/// Runs one external command to completion.
///
/// `Err` means the command could not be run at all; a non-zero exit is an `Ok` output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

#[derive(Debug, Clone, Copy)]
enum StreamName {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Stdout => f.write_str("stdout"),
            StreamName::Stderr => f.write_str("stderr"),
        }
    }
}

/// Spawns real processes. Cancelling the runner kills running children and ends their drains.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    cancel: CancellationToken,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("Running: {}", invocation);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::ExternalTool {
                tool: invocation.program.clone(),
                diagnostic: format!("failed to start: {}", e),
            })?;

        let token = self.cancel.child_token();
        let (tx, mut rx) = mpsc::unbounded_channel::<(StreamName, String)>();

        // Both pipes must be drained while the child runs or it can block on a full buffer.
        let drains = [
            spawn_drain(
                child.stdout.take(),
                StreamName::Stdout,
                invocation.mode,
                tx.clone(),
                token.clone(),
            ),
            spawn_drain(
                child.stderr.take(),
                StreamName::Stderr,
                invocation.mode,
                tx,
                token.clone(),
            ),
        ];

        let collector = tokio::spawn(async move {
            let mut combined = String::new();
            let mut stdout = String::new();
            while let Some((stream, line)) = rx.recv().await {
                if let StreamName::Stdout = stream {
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                combined.push_str(&line);
                combined.push('\n');
            }
            (combined, stdout)
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| PipelineError::ExternalTool {
                tool: invocation.program.clone(),
                diagnostic: format!("failed to wait for process: {}", e),
            })?,
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", invocation.program, e);
                }
                return Err(PipelineError::ExternalTool {
                    tool: invocation.program.clone(),
                    diagnostic: "cancelled".to_string(),
                });
            }
        };

        for drain in drains {
            drain
                .await
                .map_err(|e| PipelineError::Task(format!("output drain failed: {}", e)))?;
        }
        let (combined, stdout) = collector
            .await
            .map_err(|e| PipelineError::Task(format!("output collector failed: {}", e)))?;

        let output = ToolOutput {
            code: status.code(),
            combined,
            stdout,
        };
        debug!("{} finished with {}", invocation.program, output.status_text());
        Ok(output)
    }
}

fn spawn_drain<R>(
    pipe: Option<R>,
    stream: StreamName,
    mode: OutputMode,
    tx: mpsc::UnboundedSender<(StreamName, String)>,
    token: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(pipe) = pipe else {
            return;
        };
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = token.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    match mode {
                        OutputMode::Stream => info!(target: "porter::tool", "[{}] {}", stream, line),
                        OutputMode::Capture => debug!(target: "porter::tool", "[{}] {}", stream, line),
                    }
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading {}: {}", stream, e);
                    break;
                }
            }
        }
    })
}
