use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

use crate::error::{require_file, Error, Result};

#[derive(Debug, Clone)]
pub struct BurnOptions {
    pub vcodec: String,
    pub acodec: String,
    pub preset: String,
    pub crf: u8,
    pub pix_fmt: String,
    pub overwrite: bool,
    pub loglevel: String,
    /// Set when the ASS file references fonts that are not installed
    pub fonts_dir: Option<PathBuf>,
}

impl Default for BurnOptions {
    fn default() -> Self {
        Self {
            vcodec: "libx264".to_string(),
            acodec: "aac".to_string(),
            preset: "medium".to_string(),
            crf: 18,
            pix_fmt: "yuv420p".to_string(),
            overwrite: true,
            loglevel: "error".to_string(),
            fonts_dir: None,
        }
    }
}

/// Path form accepted inside an ffmpeg filter argument.
///
/// Forward slashes only, and a Windows drive colon escaped (`C:/x` -> `C\:/x`).
pub fn filter_safe_path(path: &str) -> String {
    let s = path.replace('\\', "/");
    let bytes = s.as_bytes();
    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
        format!("{}\\:{}", &s[..1], &s[2..])
    } else {
        s
    }
}

fn subtitles_filter(ass: &Path, fonts_dir: Option<&Path>) -> String {
    let mut parts = vec![format!("filename='{}'", filter_safe_path(&ass.to_string_lossy()))];
    if let Some(dir) = fonts_dir {
        parts.push(format!("fontsdir='{}'", filter_safe_path(&dir.to_string_lossy())));
    }
    format!("subtitles={}", parts.join(":"))
}

fn burn_args(video: &Path, ass: &Path, out: &Path, opts: &BurnOptions) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        if opts.overwrite { "-y" } else { "-n" }.to_string(),
        "-loglevel".to_string(),
        opts.loglevel.clone(),
        "-i".to_string(),
        video.display().to_string(),
        "-vf".to_string(),
        subtitles_filter(ass, opts.fonts_dir.as_deref()),
        "-c:v".to_string(),
        opts.vcodec.clone(),
        "-preset".to_string(),
        opts.preset.clone(),
        "-crf".to_string(),
        opts.crf.to_string(),
        "-pix_fmt".to_string(),
        opts.pix_fmt.clone(),
        "-c:a".to_string(),
        opts.acodec.clone(),
        out.display().to_string(),
    ]
}

/// Burns an ASS subtitle file into `video`, writing `out`.
pub fn burn_subtitles(video: &Path, ass: &Path, out: &Path, opts: &BurnOptions) -> Result<PathBuf> {
    require_file("video", video)?;
    require_file("subtitle file", ass)?;
    let video = std::path::absolute(video)?;
    let ass = std::path::absolute(ass)?;
    let out = std::path::absolute(out)?;
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!("Burning {} into {}", ass.display(), video.display());
    let status = Command::new("ffmpeg")
        .args(burn_args(&video, &ass, &out, opts))
        .status()?;
    if !status.success() {
        error!("ffmpeg failed to burn subtitles into {}", out.display());
        return Err(Error::Command {
            program: "ffmpeg",
            status,
        });
    }
    info!("Subtitled video saved: {}", out.display());
    Ok(out)
}
