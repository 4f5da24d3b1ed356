//! Child process execution with bounded capture and timeout

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Invocation;
use crate::config::{RunnerConfig, DEFAULT_MAX_OUTPUT_BYTES};
use crate::error::ScanError;

const READ_CHUNK: usize = 8192;

/// What happened when an invocation ran. Exit codes are not interpreted here.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// `None` when the process was killed (timeout or signal)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Either stream hit the capture limit
    pub truncated: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Last few lines of stderr for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        let start = all.len().saturating_sub(lines);
        all.get(start..).unwrap_or_default().join("\n")
    }
}

#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Runs invocations as child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    max_output_bytes: usize,
    kill_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            kill_grace: Duration::from_secs(1),
        }
    }
}

impl ProcessRunner {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            max_output_bytes: config.max_output_bytes,
            kill_grace: config.kill_grace(),
        }
    }

    /// Run to completion or timeout, whichever comes first
    pub async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutcome, ScanError> {
        let tool = invocation.tool().to_string();
        info!(%tool, id = %invocation.id(), "Starting {}", tool);
        debug!(argv = ?invocation.argv(), "Executing");

        let mut command = Command::new(invocation.program());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started_at = Utc::now();
        let clock = Instant::now();

        let mut child = command.spawn().map_err(|source| match source.kind() {
            ErrorKind::NotFound => ScanError::ToolNotFound {
                tool: tool.clone(),
                binary: invocation.program().to_string(),
            },
            _ => ScanError::Io {
                tool: tool.clone(),
                source,
            },
        })?;

        let out_buf = Arc::new(Mutex::new(Capture::default()));
        let err_buf = Arc::new(Mutex::new(Capture::default()));
        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|s| tokio::spawn(drain(s, out_buf.clone(), self.max_output_bytes))),
            child
                .stderr
                .take()
                .map(|s| tokio::spawn(drain(s, err_buf.clone(), self.max_output_bytes))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (exit_code, timed_out) =
            match tokio::time::timeout(invocation.timeout(), child.wait()).await {
                Ok(Ok(status)) => (status.code(), false),
                Ok(Err(source)) => return Err(ScanError::Io { tool, source }),
                Err(_) => {
                    warn!(
                        %tool,
                        "{} timed out after {} seconds, killing",
                        tool,
                        invocation.timeout().as_secs()
                    );
                    if let Err(e) = child.start_kill() {
                        warn!(%tool, "Failed to kill timed-out process: {}", e);
                    }
                    let _ = child.wait().await;
                    (None, true)
                }
            };

        // Orphaned grandchildren can keep the pipes open; don't wait on them forever.
        for mut reader in readers {
            if tokio::time::timeout(self.kill_grace, &mut reader).await.is_err() {
                debug!(%tool, "Output pipe still open after exit, abandoning reader");
                reader.abort();
            }
        }

        let stdout = std::mem::take(&mut *out_buf.lock().await);
        let stderr = std::mem::take(&mut *err_buf.lock().await);
        let duration = clock.elapsed();

        info!(
            %tool,
            exit_code = ?exit_code,
            timed_out,
            elapsed_ms = duration.as_millis() as u64,
            "Finished {}",
            tool
        );

        Ok(ExecutionOutcome {
            exit_code,
            truncated: stdout.truncated || stderr.truncated,
            stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
            timed_out,
            started_at,
            duration,
        })
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes. Excess is read and
/// dropped so the child never blocks on a full pipe.
async fn drain<R>(mut pipe: R, sink: Arc<Mutex<Capture>>, limit: usize)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Error reading process output: {}", e);
                break;
            }
        };
        let mut capture = sink.lock().await;
        let room = limit.saturating_sub(capture.bytes.len());
        if n > room {
            capture.truncated = true;
        }
        let keep = n.min(room);
        if let Some(data) = chunk.get(..keep) {
            capture.bytes.extend_from_slice(data);
        }
    }
}
