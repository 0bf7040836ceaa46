//! Video filter chain for slow-motion clips.
//!
//! `minterpolate` -> `setpts` -> `drawtext`, joined with commas into a
//! single `-vf` argument.

use std::path::{Path, PathBuf};

use jumpclip_models::RenderOptions;

/// Fonts tried in order when `FFMPEG_FONT` is unset.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Find a font file for the caption overlay.
pub fn resolve_font() -> Option<PathBuf> {
    if let Ok(font) = std::env::var("FFMPEG_FONT") {
        let path = PathBuf::from(font);
        if path.is_file() {
            return Some(path);
        }
    }

    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Escape a value for use inside a filter option.
///
/// Two parsing levels apply (filtergraph, then option list), so option
/// separators are escaped twice and graph separators once.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' | ':' => {
                out.push_str("\\\\");
                out.push(c);
            }
            ',' | ';' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Caption filter. Without a font file FFmpeg falls back to fontconfig.
pub fn drawtext(text: &str, font: Option<&Path>) -> String {
    let mut opts = Vec::with_capacity(11);
    if let Some(font) = font {
        opts.push(format!(
            "fontfile={}",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    opts.push(format!("text={}", escape_filter_value(text)));
    opts.extend(
        [
            "expansion=none",
            "x=10",
            "y=10",
            "fontcolor=white",
            "fontsize=28",
            "box=1",
            "boxcolor=black@0.45",
            "boxborderw=12",
        ]
        .map(String::from),
    );
    format!("drawtext={}", opts.join(":"))
}

/// Full filter chain for one clip.
pub fn slowmo_filter_chain(options: &RenderOptions, caption: &str, font: Option<&Path>) -> String {
    let mut filters = vec![format!("minterpolate=fps={}", options.interpolation_fps)];

    if options.slow_factor != 1.0 {
        filters.push(format!("setpts={}*PTS", options.slow_factor));
    }

    if !caption.is_empty() {
        filters.push(drawtext(caption, font));
    }

    filters.join(",")
}
