use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::{debug, error, info};

use crate::error::{require_file, Error, Result};
use crate::slideshow::{SlideshowParams, Timeline};

/// Color tagging so players treat the output as BT.709 at the configured range.
pub fn ffmpeg_color_params(params: &SlideshowParams) -> Vec<String> {
    let mut args: Vec<String> = [
        "-pix_fmt",
        "yuv420p",
        "-colorspace",
        params.colorspace.as_str(),
        "-color_primaries",
        params.color_primaries.as_str(),
        "-color_trc",
        params.color_trc.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if params.color_range == "tv" || params.color_range == "pc" {
        args.push("-color_range".to_string());
        args.push(params.color_range.clone());
    }

    let fullrange = if params.color_range == "pc" { "on" } else { "off" };
    args.push("-x264-params".to_string());
    args.push(format!(
        "colorprim=bt709:transfer=bt709:colormatrix=bt709:fullrange={}",
        fullrange
    ));
    args
}

fn encoder_args(timeline: &Timeline, audio: &Path, out: &Path, params: &SlideshowParams) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", timeline.width, timeline.height),
        "-r".into(),
        timeline.fps.to_string(),
        "-i".into(),
        "-".into(),
        "-i".into(),
        audio.display().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-b:v".into(),
        "8000k".into(),
        "-threads".into(),
        "4".into(),
        "-c:a".into(),
        "aac".into(),
        "-t".into(),
        format!("{:.6}", timeline.duration()),
    ];
    args.extend(ffmpeg_color_params(params));
    args.push(out.display().to_string());
    args
}

/// Renders every frame of `timeline` through ffmpeg, muxing `audio`.
pub fn render_to_file(
    timeline: &Timeline,
    audio: &Path,
    out: &Path,
    params: &SlideshowParams,
) -> Result<()> {
    require_file("audio", audio)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let args = encoder_args(timeline, audio, out, params);
    debug!("ffmpeg {}", args.join(" "));
    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()?;

    let total = timeline.frame_count();
    info!(
        "Encoding {} frames ({:.2}s @ {} fps) to {}",
        total,
        timeline.duration(),
        timeline.fps,
        out.display()
    );

    if let Err(e) = write_frames(&mut child, timeline, total) {
        error!("Frame pipe to ffmpeg failed: {}", e);
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }

    let status = child.wait()?;
    if !status.success() {
        error!("ffmpeg failed to encode {}", out.display());
        return Err(Error::Command {
            program: "ffmpeg",
            status,
        });
    }
    info!("Video written to {}", out.display());
    Ok(())
}

fn write_frames(child: &mut Child, timeline: &Timeline, total: u64) -> Result<()> {
    // Taking stdin closes it when the writer drops, which ends the stream
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("ffmpeg stdin unavailable"))?;
    let mut writer = BufWriter::new(stdin);
    let report_every = (timeline.fps.round() as u64 * 5).max(1);
    for i in 0..total {
        let frame = timeline.render_frame(timeline.frame_time(i));
        writer.write_all(frame.as_raw())?;
        if (i + 1) % report_every == 0 {
            debug!("Rendered {}/{} frames", i + 1, total);
        }
    }
    writer.flush()?;
    Ok(())
}
