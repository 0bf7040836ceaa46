//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::stderr_tail::StderrTail;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek the input to `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Stop reading the input at `seconds`.
    pub fn to(self, seconds: f64) -> Self {
        self.input_arg("-to").input_arg(format!("{:.3}", seconds))
    }

    /// Drop audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string()];

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runs FFmpeg as a child process, keeping a bounded tail of its stderr.
///
/// The child is spawned with `kill_on_drop`, so dropping the run future
/// (timeout, task abort) kills and reaps the process.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
    timeout: Option<Duration>,
    tail_capacity: usize,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            tail_capacity: StderrTail::DEFAULT_CAPACITY,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tail_capacity(mut self, capacity: usize) -> Self {
        self.tail_capacity = capacity;
        self
    }

    /// Run an FFmpeg command to completion.
    ///
    /// Returns the stderr tail on success. Spawn failures and non-zero exits
    /// are errors; the latter carry the tail.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<StderrTail> {
        let args = cmd.build_args();
        let program = self.program.to_string_lossy().to_string();
        debug!("Running FFmpeg: {} {}", program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn_failed(program.clone(), e))?;

        let stderr = match child.stderr.take() {
            Some(stderr) => stderr,
            None => {
                let _ = child.kill().await;
                return Err(MediaError::internal("FFmpeg stderr was not captured"));
            }
        };
        let capacity = self.tail_capacity;
        let drain = tokio::spawn(drain_into_tail(stderr, capacity));

        let waited = self.wait_for_exit(&mut child).await;

        let tail = match drain.await {
            Ok(tail) => tail,
            Err(e) => {
                warn!("FFmpeg stderr reader task failed: {}", e);
                StderrTail::new(capacity)
            }
        };

        match waited {
            Ok(status) if status.success() => Ok(tail),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", status),
                Some(tail.to_string_lossy()),
                status.code(),
            )),
            Err(WaitError::TimedOut(limit)) => Err(MediaError::ffmpeg_failed(
                format!("FFmpeg timed out after {} seconds", limit.as_secs()),
                Some(tail.to_string_lossy()),
                None,
            )),
            Err(WaitError::Io(e)) => Err(MediaError::Io(e)),
        }
    }

    /// Wait for the child, killing it if the timeout elapses.
    async fn wait_for_exit(&self, child: &mut Child) -> Result<ExitStatus, WaitError> {
        let Some(limit) = self.timeout else {
            return child.wait().await.map_err(WaitError::Io);
        };

        match tokio::time::timeout(limit, child.wait()).await {
            Ok(result) => result.map_err(WaitError::Io),
            Err(_) => {
                warn!("FFmpeg timed out after {:?}, killing process", limit);
                // kill() also waits, so the process is reaped here
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill FFmpeg: {}", e);
                }
                Err(WaitError::TimedOut(limit))
            }
        }
    }
}

enum WaitError {
    TimedOut(Duration),
    Io(std::io::Error),
}

/// Read a stream to EOF, keeping only the last `capacity` bytes.
async fn drain_into_tail<R>(mut reader: R, capacity: usize) -> StderrTail
where
    R: AsyncRead + Unpin,
{
    let mut tail = StderrTail::new(capacity);
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => tail.push(&chunk[..n]),
            Err(e) => {
                warn!("Error reading FFmpeg stderr: {}", e);
                break;
            }
        }
    }
    tail
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let program = program.as_ref();
    which::which(program)
        .map_err(|_| MediaError::FfmpegNotFound(program.to_string_lossy().to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let program = program.as_ref();
    which::which(program)
        .map_err(|_| MediaError::FfprobeNotFound(program.to_string_lossy().to_string()))
}
