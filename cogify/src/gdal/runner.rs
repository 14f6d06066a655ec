//! Execution of GDAL commands.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::command::{GdalCommand, GdalConfig};
use super::progress::ProgressParser;

/// Channel receiving progress fractions in `[0.0, 1.0]`.
pub type ProgressSender = mpsc::UnboundedSender<f64>;

/// Errors from running an external GDAL tool.
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' exited with {}: {stderr}", describe_code(*.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected output from '{command}': {reason}")]
    InvalidOutput { command: String, reason: String },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

pub type GdalResult<T> = Result<T, GdalError>;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GdalOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs GDAL commands.
///
/// Implementations must be usable from many concurrent jobs. Returning a
/// boxed future keeps the trait object-safe so the orchestrator can hold an
/// `Arc<dyn GdalRunner>`.
pub trait GdalRunner: Send + Sync {
    /// Runs `command` to completion.
    ///
    /// When `progress` is given, parsed progress values are sent as the
    /// tool reports them.
    fn run<'a>(
        &'a self,
        command: &'a GdalCommand,
        progress: Option<ProgressSender>,
    ) -> Pin<Box<dyn Future<Output = GdalResult<GdalOutput>> + Send + 'a>>;

    /// Human-readable command line for logs and dry runs.
    fn command_line(&self, command: &GdalCommand) -> String {
        command.to_string()
    }
}

/// Runs commands as child processes, natively or through docker.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: GdalConfig,
}

impl ProcessRunner {
    pub fn new(config: GdalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GdalConfig {
        &self.config
    }

    async fn execute(
        &self,
        command: &GdalCommand,
        progress: Option<ProgressSender>,
    ) -> GdalResult<GdalOutput> {
        let command_line = self.config.command_line(command);
        let (program, args) = self.config.invocation(command);
        debug!(command = %command_line, "Spawning GDAL");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GdalError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let io_error = |source| GdalError::Io {
            command: command_line.clone(),
            source,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error(io::Error::other("stderr was not captured")))?;

        let (stdout, stderr) = tokio::try_join!(
            read_with_progress(stdout, progress),
            read_to_string(stderr)
        )
        .map_err(io_error)?;

        let status = child.wait().await.map_err(io_error)?;
        if !status.success() {
            return Err(GdalError::NonZeroExit {
                command: command_line,
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        trace!(command = %command_line, "GDAL finished");
        Ok(GdalOutput { stdout, stderr })
    }
}

impl GdalRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        command: &'a GdalCommand,
        progress: Option<ProgressSender>,
    ) -> Pin<Box<dyn Future<Output = GdalResult<GdalOutput>> + Send + 'a>> {
        Box::pin(self.execute(command, progress))
    }

    fn command_line(&self, command: &GdalCommand) -> String {
        self.config.command_line(command)
    }
}

/// Reads a stream to the end, forwarding progress markers as they arrive.
async fn read_with_progress<R>(mut reader: R, progress: Option<ProgressSender>) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut parser = ProgressParser::new();
    let mut output = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.extend_from_slice(&buf[..n]);
        if let Some(tx) = &progress {
            for value in parser.push(&buf[..n]) {
                // Receiver may have gone away; the command still runs to completion
                let _ = tx.send(value);
            }
        }
    }
    Ok(String::from_utf8_lossy(&output).into_owned())
}

async fn read_to_string<R>(mut reader: R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut output = Vec::new();
    reader.read_to_end(&mut output).await?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_with_progress_forwards_markers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"Input file size is 10, 10\n0...10...20...30...40...50...60...70...80...90...100 - done.\n";
        let output = read_with_progress(input, Some(tx)).await.unwrap();
        assert!(output.starts_with("Input file size"));

        let mut values = Vec::new();
        while let Ok(value) = rx.try_recv() {
            values.push(value);
        }
        assert_eq!(values.len(), 11);
        assert_eq!(values.first(), Some(&0.0));
        assert_eq!(values.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn test_read_without_progress_channel() {
        let input: &[u8] = b"0...10...";
        let output = read_with_progress(input, None).await.unwrap();
        assert_eq!(output, "0...10...");
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let runner = ProcessRunner::default();
        let command = GdalCommand::new("cogify-definitely-not-a-real-tool").arg("-json");
        let err = runner.run(&command, None).await.unwrap_err();
        assert!(matches!(err, GdalError::Spawn { .. }));
        assert!(err.to_string().contains("cogify-definitely-not-a-real-tool"));
    }

    #[test]
    fn test_non_zero_exit_message() {
        let err = GdalError::NonZeroExit {
            command: "gdalinfo x.tif".to_string(),
            code: Some(1),
            stderr: "ERROR 4: x.tif: No such file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'gdalinfo x.tif' exited with status 1: ERROR 4: x.tif: No such file"
        );
    }
}
