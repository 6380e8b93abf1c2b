//! Still-capture command frame source

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::source::FrameSource;
use crate::types::Frame;
use crate::{CaptureError, Result};

/// Placeholder in command arguments that is replaced by the output file path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Where the capture command leaves the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// The command writes JPEG bytes to stdout
    Stdout,
    /// The command writes the image to this file, which is read back afterwards
    File(PathBuf),
}

/// Runs an external still-capture program once per frame.
///
/// The default invocation is `rpicam-still -n -t 1 -o /tmp/frame.jpg`, the stock Raspberry
/// Pi camera tool. The output file is removed before each run so a failed capture can
/// never hand out the previous cycle's image.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    output: CommandOutput,
    timeout: Duration,
    name: String,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, output: CommandOutput) -> Self {
        let program = program.into();
        let name = format!("command:{program}");
        Self { program, args, output, timeout: Duration::from_secs(10), name }
    }

    /// Kill the command if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolved_args(&self) -> Vec<String> {
        match &self.output {
            CommandOutput::File(path) => {
                let path = path.to_string_lossy();
                self.args.iter().map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &path)).collect()
            }
            CommandOutput::Stdout => self.args.clone(),
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> CaptureError {
        CaptureError::source_unavailable(&self.name, reason)
    }
}

impl Default for CommandSource {
    fn default() -> Self {
        Self::new(
            "rpicam-still",
            ["-n", "-t", "1", "-o", OUTPUT_PLACEHOLDER].map(String::from).to_vec(),
            CommandOutput::File(PathBuf::from("/tmp/frame.jpg")),
        )
    }
}

#[async_trait::async_trait]
impl FrameSource for CommandSource {
    async fn capture(&mut self) -> Result<Frame> {
        if let CommandOutput::File(path) = &self.output {
            match tokio::fs::remove_file(path).await {
                Ok(()) => trace!(path = %path.display(), "Removed stale output file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CaptureError::source_unavailable_with_source(
                        &self.name,
                        format!("cannot clear {}", path.display()),
                        Box::new(e),
                    ));
                }
            }
        }

        let mut command = Command::new(&self.program);
        command
            .args(self.resolved_args())
            .stdin(Stdio::null())
            .stdout(if self.output == CommandOutput::Stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, "Running capture command");
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CaptureError::source_unavailable_with_source(
                    &self.name,
                    format!("failed to run {}", self.program),
                    Box::new(e),
                ));
            }
            Err(_) => {
                return Err(self.unavailable(format!("command timed out after {:?}", self.timeout)));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(self.unavailable(format!("command exited with {}: {tail}", output.status)));
        }

        let data = match &self.output {
            CommandOutput::Stdout => output.stdout,
            CommandOutput::File(path) => tokio::fs::read(path).await.map_err(|e| {
                CaptureError::source_unavailable_with_source(
                    &self.name,
                    format!("command produced no image at {}", path.display()),
                    Box::new(e),
                )
            })?,
        };

        if data.is_empty() {
            return Err(self.unavailable("command produced an empty image"));
        }

        trace!(bytes = data.len(), "Command capture complete");
        Ok(Frame::new(data))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::FailureReason;

    fn shell(script: &str, output: CommandOutput) -> CommandSource {
        CommandSource::new("sh", vec!["-c".to_string(), script.to_string()], output)
    }

    #[tokio::test]
    async fn captures_from_stdout() {
        let mut source = shell("printf 'jpeg-bytes'", CommandOutput::Stdout);
        let frame = source.capture().await.expect("capture");
        assert_eq!(frame.data().as_ref(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn captures_from_output_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.jpg");
        let mut source = shell("printf 'from-file' > {output}", CommandOutput::File(path.clone()));

        let frame = source.capture().await.expect("capture");
        assert_eq!(frame.data().as_ref(), b"from-file");
    }

    #[tokio::test]
    async fn stale_output_file_is_not_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"previous").expect("seed");

        let mut source = shell("true", CommandOutput::File(path));
        let error = source.capture().await.unwrap_err();
        assert_eq!(error.reason(), Some(FailureReason::SourceUnavailable));
    }

    #[tokio::test]
    async fn failing_or_missing_command_is_unavailable() {
        let mut failing = shell("echo 'no camera' >&2; exit 3", CommandOutput::Stdout);
        let error = failing.capture().await.unwrap_err();
        assert!(error.to_string().contains("no camera"));

        let mut missing = CommandSource::new(
            "definitely-not-a-camera-tool",
            Vec::new(),
            CommandOutput::Stdout,
        );
        assert_eq!(missing.capture().await.unwrap_err().reason(), Some(FailureReason::SourceUnavailable));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let mut source = shell("sleep 5", CommandOutput::Stdout).with_timeout(Duration::from_millis(50));
        let error = source.capture().await.unwrap_err();
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn default_invocation_targets_tmp_frame() {
        let source = CommandSource::default();
        assert_eq!(source.resolved_args(), vec!["-n", "-t", "1", "-o", "/tmp/frame.jpg"]);
    }
}
