//! Slow-motion clip rendering.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jumpclip_models::RenderOptions;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{resolve_font, slowmo_filter_chain};
use crate::probe::probe_duration_ms;
use crate::stderr_tail::StderrTail;
use crate::window::ClipWindow;

/// One clip to render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Unclamped window; the renderer clamps it to the source duration
    pub window: ClipWindow,
    pub source_duration_ms: Option<f64>,
    pub caption: String,
    pub options: RenderOptions,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub path: PathBuf,
    /// Diagnostic tail of the final pass
    pub stderr_tail: String,
    pub passes: u32,
    /// Window actually rendered
    pub window: ClipWindow,
}

/// Produces a clip file from a source video.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> MediaResult<RenderOutput>;

    /// Duration of a source file, for videos whose record lacks one.
    async fn probe_duration_ms(&self, _source: &Path) -> MediaResult<Option<f64>> {
        Ok(None)
    }
}

/// FFmpeg settings.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    /// Overlay font; resolved from the environment when `None`
    pub font_path: Option<PathBuf>,
    pub log_level: String,
    pub crf: u8,
    pub timeout: Option<Duration>,
    pub tail_capacity: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            font_path: None,
            log_level: "error".to_string(),
            crf: 20,
            timeout: None,
            tail_capacity: StderrTail::DEFAULT_CAPACITY,
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: std::env::var("FFPROBE_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_bin),
            font_path: std::env::var("FFMPEG_FONT").ok().map(PathBuf::from),
            log_level: std::env::var("FFMPEG_LOG_LEVEL").unwrap_or(defaults.log_level),
            crf: defaults.crf,
            timeout: std::env::var("JUMPCLIP_RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            tail_capacity: defaults.tail_capacity,
        }
    }
}

/// [`ClipRenderer`] backed by the FFmpeg CLI.
pub struct FfmpegRenderer {
    config: MediaConfig,
    font: Option<PathBuf>,
    runner: FfmpegRunner,
}

impl FfmpegRenderer {
    pub fn new(config: MediaConfig) -> Self {
        let font = config
            .font_path
            .clone()
            .filter(|p| p.is_file())
            .or_else(resolve_font);
        match &font {
            Some(path) => debug!("Caption font: {}", path.display()),
            None => warn!("No caption font found, drawtext will use the fontconfig default"),
        }

        let runner = FfmpegRunner::new(&config.ffmpeg_bin)
            .with_timeout(config.timeout)
            .with_tail_capacity(config.tail_capacity);

        Self {
            config,
            font,
            runner,
        }
    }

    pub fn from_env() -> Self {
        Self::new(MediaConfig::from_env())
    }

    /// Command for one pass over an already clamped window.
    pub fn build_command(&self, request: &RenderRequest, window: &ClipWindow) -> FfmpegCommand {
        let filter = slowmo_filter_chain(&request.options, &request.caption, self.font.as_deref());

        FfmpegCommand::new(&request.source, &request.output)
            .log_level(self.config.log_level.clone())
            .seek(window.start_secs())
            .to(window.end_secs())
            .no_audio()
            .video_filter(filter)
            .video_codec("libx264")
            .preset(request.options.preset.as_str())
            .crf(self.config.crf)
            .pixel_format("yuv420p")
            .faststart()
    }
}

#[async_trait]
impl ClipRenderer for FfmpegRenderer {
    async fn render(&self, request: &RenderRequest) -> MediaResult<RenderOutput> {
        if !request.source.exists() {
            return Err(MediaError::FileNotFound(request.source.clone()));
        }
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let window = request.window.clamped(request.source_duration_ms);
        let cmd = self.build_command(request, &window);
        let passes = request.options.passes();
        let started = Instant::now();

        // Every pass writes the same output; the last one is what we keep.
        let mut tail = StderrTail::new(self.config.tail_capacity);
        for pass in 1..=passes {
            debug!(pass, passes, "Rendering slow-motion clip");
            tail = self.runner.run(&cmd).await?;
        }

        let elapsed = started.elapsed().as_secs_f64();
        histogram!("jumpclip_render_duration_seconds").record(elapsed);
        counter!("jumpclip_render_passes_total").increment(passes as u64);
        info!(
            output = %request.output.display(),
            start_ms = window.start_ms,
            end_ms = window.end_ms,
            passes,
            "Rendered clip in {:.2}s",
            elapsed
        );

        Ok(RenderOutput {
            path: request.output.clone(),
            stderr_tail: tail.to_string_lossy(),
            passes,
            window,
        })
    }

    async fn probe_duration_ms(&self, source: &Path) -> MediaResult<Option<f64>> {
        probe_duration_ms(&self.config.ffprobe_bin, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jumpclip_models::Preset;

    fn request(source: PathBuf, output: PathBuf) -> RenderRequest {
        RenderRequest {
            source,
            output,
            window: ClipWindow::around_jump(1000.0, 1500.0, 300.0),
            source_duration_ms: Some(1600.0),
            caption: "Jump 1".to_string(),
            options: RenderOptions {
                preset: Preset::Medium,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_build_command_uses_clamped_window() {
        let renderer = FfmpegRenderer::new(MediaConfig::default());
        let req = request("in.mp4".into(), "out/clip.mp4".into());
        let window = req.window.clamped(req.source_duration_ms);
        let args = renderer.build_command(&req, &window).build_args();

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "0.700");
        let to = args.iter().position(|a| a == "-to").unwrap();
        assert_eq!(args[to + 1], "1.600");
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "medium");
        assert_eq!(args.last().unwrap(), "out/clip.mp4");
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected() {
        let renderer = FfmpegRenderer::new(MediaConfig::default());
        let err = renderer
            .render(&request("/no/such/video.mp4".into(), "/tmp/out.mp4".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_one_pass_per_work_factor() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let counter_file = dir.path().join("passes");
        let script = dir.path().join("ffmpeg");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho pass >> '{}'\nfor last; do :; done\necho clip > \"$last\"\necho done 1>&2\n",
                counter_file.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"video").unwrap();

        let renderer = FfmpegRenderer::new(MediaConfig {
            ffmpeg_bin: script,
            ..Default::default()
        });
        let mut req = request(source, dir.path().join("out").join("clip.mp4"));
        req.options.work_factor = 3;

        let out = renderer.render(&req).await.unwrap();
        assert_eq!(out.passes, 3);
        assert_eq!(out.stderr_tail, "done\n");
        assert!(out.path.exists());
        let passes = std::fs::read_to_string(counter_file).unwrap();
        assert_eq!(passes.lines().count(), 3);
    }
}
