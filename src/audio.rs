use hound::WavReader;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{debug, error, info};

use crate::error::{require_file, Error, Result};

pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    require_file("audio", path)?;
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Which input decides the mixed length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MixTarget {
    /// Match the narration
    Main,
    /// Match the longer of the two
    Longest,
}

/// What happens to background music shorter than the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MixStrategy {
    Cut,
    Loop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixParams {
    pub main_volume: f64,
    pub bg_volume: f64,
    pub target: MixTarget,
    pub strategy: MixStrategy,
    pub sample_rate: u32,
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            main_volume: 1.0,
            bg_volume: 0.20,
            target: MixTarget::Main,
            strategy: MixStrategy::Cut,
            sample_rate: 48000,
        }
    }
}

/// Length of any file ffprobe can read; WAV files are read from the header.
pub fn media_duration_seconds(path: &Path) -> Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return wav_duration_seconds(path);
    }
    require_file("audio", path)?;
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()?;
    if !output.status.success() {
        error!("ffprobe failed for {}", path.display());
        return Err(Error::Command {
            program: "ffprobe",
            status: output.status,
        });
    }
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("ffprobe reported no duration for {}", path.display())))
}

/// Whether the background has to loop to cover the mixed length.
///
/// Both targets reach at least the narration length, so only music shorter
/// than the narration ever loops.
fn needs_loop(params: &MixParams, main_len: f64, bg_len: f64) -> bool {
    params.strategy == MixStrategy::Loop && bg_len < main_len
}

fn mix_args(main: &Path, background: &Path, out: &Path, params: &MixParams, loop_bg: bool) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), main.display().to_string()];
    if loop_bg {
        args.extend(["-stream_loop".to_string(), "-1".to_string()]);
    }
    args.extend(["-i".to_string(), background.display().to_string()]);

    // A looped input never ends; it only loops when shorter than the narration
    let duration = match params.target {
        MixTarget::Longest if !loop_bg => "longest",
        _ => "first",
    };
    let filter = format!(
        "[0:a]volume={:.3}[main];[1:a]volume={:.3}[bg];[main][bg]amix=inputs=2:duration={}:normalize=0[mix]",
        params.main_volume, params.bg_volume, duration
    );
    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[mix]".to_string(),
        "-ar".to_string(),
        params.sample_rate.to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        out.display().to_string(),
    ]);
    args
}

/// Mixes narration with background music into a WAV file.
pub fn mix_audio(main: &Path, background: &Path, out: &Path, params: &MixParams) -> Result<()> {
    require_file("main audio", main)?;
    require_file("background audio", background)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let loop_bg = if params.strategy == MixStrategy::Loop {
        let main_len = media_duration_seconds(main)?;
        let bg_len = media_duration_seconds(background)?;
        debug!("Narration {:.2}s, background {:.2}s", main_len, bg_len);
        needs_loop(params, main_len, bg_len)
    } else {
        false
    };

    info!(
        "Mixing {} ({:.0}%) with {} ({:.0}%{})",
        main.display(),
        params.main_volume * 100.0,
        background.display(),
        params.bg_volume * 100.0,
        if loop_bg { ", looped" } else { "" }
    );
    let status = Command::new("ffmpeg")
        .args(mix_args(main, background, out, params, loop_bg))
        .status()?;
    if !status.success() {
        error!("ffmpeg failed to mix audio into {}", out.display());
        return Err(Error::Command {
            program: "ffmpeg",
            status,
        });
    }
    info!("Mixed audio written to {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_silence(path: &Path, channels: u16, sample_rate: u32, frames: u32) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as u32 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mono = dir.path().join("mono.wav");
        write_silence(&mono, 1, 16000, 24000);
        assert!((wav_duration_seconds(&mono).unwrap() - 1.5).abs() < 1e-9);

        let stereo = dir.path().join("stereo.wav");
        write_silence(&stereo, 2, 48000, 96000);
        assert!((wav_duration_seconds(&stereo).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_wav_duration_missing() {
        let result = wav_duration_seconds(Path::new("/nonexistent/output.wav"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_mix_args_default() {
        let args = mix_args(
            Path::new("voice.wav"),
            Path::new("music.mp3"),
            Path::new("mix.wav"),
            &MixParams::default(),
            false,
        );
        assert!(!args.contains(&"-stream_loop".to_string()));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("volume=1.000[main]"));
        assert!(filter.contains("volume=0.200[bg]"));
        assert!(filter.contains("duration=first"));
        assert!(args.contains(&"48000".to_string()));
    }

    #[test]
    fn test_mix_args_loop_and_longest() {
        let params = MixParams {
            strategy: MixStrategy::Loop,
            ..MixParams::default()
        };
        let args = mix_args(Path::new("v.wav"), Path::new("m.mp3"), Path::new("o.wav"), &params, true);
        let loop_at = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[loop_at + 3], "m.mp3");

        let params = MixParams {
            target: MixTarget::Longest,
            ..MixParams::default()
        };
        let args = mix_args(Path::new("v.wav"), Path::new("m.mp3"), Path::new("o.wav"), &params, false);
        assert!(args.iter().any(|a| a.contains("duration=longest")));
    }

    #[test]
    fn test_longest_loop_keeps_longer_music() {
        let params = MixParams {
            target: MixTarget::Longest,
            strategy: MixStrategy::Loop,
            ..MixParams::default()
        };

        // Music outlasts the narration: no loop, output runs to the music's end
        assert!(!needs_loop(&params, 10.0, 95.0));
        let args = mix_args(Path::new("v.wav"), Path::new("m.mp3"), Path::new("o.wav"), &params, false);
        assert!(!args.contains(&"-stream_loop".to_string()));
        assert!(args.iter().any(|a| a.contains("duration=longest")));

        // Short music loops under the narration, which bounds the output
        assert!(needs_loop(&params, 10.0, 4.0));
        let args = mix_args(Path::new("v.wav"), Path::new("m.mp3"), Path::new("o.wav"), &params, true);
        assert!(args.contains(&"-stream_loop".to_string()));
        assert!(args.iter().any(|a| a.contains("duration=first")));
    }

    #[test]
    fn test_cut_never_loops() {
        let params = MixParams {
            target: MixTarget::Longest,
            ..MixParams::default()
        };
        assert!(!needs_loop(&params, 10.0, 4.0));
    }

    #[test]
    fn test_media_duration_reads_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("music.WAV");
        write_silence(&wav, 1, 8000, 20000);
        assert!((media_duration_seconds(&wav).unwrap() - 2.5).abs() < 1e-9);
        assert!(matches!(
            media_duration_seconds(&dir.path().join("missing.mp3")),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_mix_requires_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let voice = dir.path().join("voice.wav");
        write_silence(&voice, 1, 8000, 10);
        let result = mix_audio(
            &voice,
            &dir.path().join("missing.mp3"),
            &dir.path().join("mix.wav"),
            &MixParams::default(),
        );
        assert!(matches!(result, Err(Error::NotFound { what: "background audio", .. })));
    }
}
