//! External tool execution
//!
//! Runs toolchain commands as child processes. Two modes are offered:
//!
//! - [`ExternalToolRunner::stream`] hands back a [`ToolStream`] yielding the
//!   combined stdout/stderr output line by line as the child writes it
//! - [`ExternalToolRunner::run`] waits for exit and returns the captured output
//!
//! Lines travel through a bounded channel. When the consumer falls behind, the
//! reader tasks stop pulling from the pipes and the child blocks on write,
//! so memory stays bounded as long as someone keeps draining the stream.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default capacity of the line channel between pipe readers and consumer
const DEFAULT_LINE_BUFFER: usize = 256;

/// Default number of trailing lines kept for diagnostics
pub const DEFAULT_TRANSCRIPT_LINES: usize = 2000;

/// Errors raised while running an external tool
#[derive(Debug, Error)]
pub enum ToolError {
    /// The process could not be started at all
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("`{command}` exited with {}", describe_code(.code))]
    Failure {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// Waiting on the process failed
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// A toolchain invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Overrides one environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Printable form used in logs and error details
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        command
    }
}

/// Captured result of a fire-and-wait run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub output: String,
}

/// Launches toolchain commands
#[derive(Debug, Clone)]
pub struct ExternalToolRunner {
    line_buffer: usize,
    transcript_lines: usize,
}

impl Default for ExternalToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalToolRunner {
    pub fn new() -> Self {
        Self {
            line_buffer: DEFAULT_LINE_BUFFER,
            transcript_lines: DEFAULT_TRANSCRIPT_LINES,
        }
    }

    /// Starts a fresh transcript sized for this runner
    pub fn transcript(&self) -> Transcript {
        Transcript::new(self.transcript_lines)
    }

    /// Starts the command and streams its combined output
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, command: &ToolCommand) -> Result<ToolStream, ToolError> {
        let shown = command.display();
        debug!(command = %shown, "Launching tool");

        let mut child = command
            .to_command()
            .spawn()
            .map_err(|source| ToolError::Launch {
                command: shown.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(self.line_buffer);
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        Ok(ToolStream {
            command: shown,
            child,
            lines: rx,
            readers,
        })
    }

    /// Runs the command to completion
    ///
    /// A non-zero exit is reported as [`ToolError::Failure`] carrying the
    /// captured output.
    pub async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        let mut stream = self.stream(command)?;
        let mut transcript = self.transcript();

        while let Some(line) = stream.next_line().await {
            transcript.push(line);
        }

        let command = stream.command().to_string();
        let status = stream.wait().await?;
        let output = transcript.into_string();

        if status.success() {
            Ok(ToolOutput {
                code: status.code(),
                output,
            })
        } else {
            Err(ToolError::Failure {
                command,
                code: status.code(),
                output,
            })
        }
    }
}

/// Live output of a running tool
///
/// Dropping the stream before [`ToolStream::wait`] kills the child.
pub struct ToolStream {
    command: String,
    child: Child,
    lines: mpsc::Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl ToolStream {
    /// Next output line, or `None` once both pipes are closed
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Waits for the child to exit
    ///
    /// Lines not yet consumed are drained first so the child can never stall
    /// on a full pipe while we wait for it.
    pub async fn wait(mut self) -> Result<ExitStatus, ToolError> {
        let mut skipped = 0usize;
        while self.lines.recv().await.is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(command = %self.command, skipped, "Discarded unread tool output");
        }

        for reader in self.readers.drain(..) {
            if let Err(e) = reader.await {
                warn!(command = %self.command, "Output reader task failed: {}", e);
            }
        }

        let status = self.child.wait().await.map_err(|source| ToolError::Wait {
            command: self.command.clone(),
            source,
        })?;

        debug!(command = %self.command, code = ?status.code(), "Tool exited");
        Ok(status)
    }
}

/// Bounded tail of a tool's output
#[derive(Debug, Clone)]
pub struct Transcript {
    lines: VecDeque<String>,
    capacity: usize,
    dropped: usize,
}

impl Transcript {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line);
    }

    pub fn into_string(self) -> String {
        let mut out = String::new();
        if self.dropped > 0 {
            out.push_str(&format!("[... {} earlier lines omitted ...]\n", self.dropped));
        }
        out.push_str(&Vec::from(self.lines).join("\n"));
        out
    }
}

/// Copies one pipe into the line channel until EOF or until the consumer leaves
async fn forward_lines<R>(pipe: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read tool output: {}", e);
                break;
            }
        }
    }
}
