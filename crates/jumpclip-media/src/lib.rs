//! FFmpeg CLI wrapper for slow-motion jump clips.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A subprocess runner that keeps a bounded tail of FFmpeg's stderr
//! - The interpolate / slow-down / caption filter chain
//! - Clip windows around a jump, clamped to the source duration
//! - The [`ClipRenderer`] seam used by the worker

pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod renderer;
pub mod stderr_tail;
pub mod window;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{drawtext, escape_filter_value, resolve_font, slowmo_filter_chain};
pub use probe::probe_duration_ms;
pub use renderer::{ClipRenderer, FfmpegRenderer, MediaConfig, RenderOutput, RenderRequest};
pub use stderr_tail::StderrTail;
pub use window::{ClipWindow, DEFAULT_PAD_MS, MIN_WINDOW_MS};
