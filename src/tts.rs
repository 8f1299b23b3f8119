use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info, warn};

use crate::error::{require_file, Error, Result};

pub fn tts_generate_chunk(model: &Path, text: &str, out_path: &Path) -> Result<()> {
    let mut child = Command::new("piper")
        .arg("--model")
        .arg(model)
        .arg("--output_file")
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        error!("Piper TTS command failed for chunk: {}", out_path.display());
        return Err(Error::Command {
            program: "piper",
            status,
        });
    }
    Ok(())
}

/// Lines of an ffmpeg concat-demuxer list for `parts`.
fn concat_list(parts: &[PathBuf]) -> Result<String> {
    let mut list = String::new();
    for p in parts {
        let fname = p
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("invalid chunk file name: {}", p.display())))?;
        list.push_str(&format!("file '{}'\n", fname));
    }
    Ok(list)
}

fn concat_wavs(chunk_dir: &Path, parts: &[PathBuf], out: &Path) -> Result<()> {
    let list_path = chunk_dir.join("files.txt");
    File::create(&list_path)?.write_all(concat_list(parts)?.as_bytes())?;

    // ffmpeg runs inside the chunk directory, so the output needs an absolute path
    let out_abs = std::path::absolute(out)?;
    let status = Command::new("ffmpeg")
        .current_dir(chunk_dir)
        .args(["-y", "-f", "concat", "-safe", "0", "-i", "files.txt", "-c", "copy"])
        .arg(&out_abs)
        .status()?;

    if !status.success() {
        warn!("ffmpeg concat with copy failed; retrying with re-encode");
        let status = Command::new("ffmpeg")
            .current_dir(chunk_dir)
            .args(["-y", "-f", "concat", "-safe", "0", "-i", "files.txt", "-c:a", "pcm_s16le"])
            .arg(&out_abs)
            .status()?;
        if !status.success() {
            error!("ffmpeg failed to concatenate WAV files");
            return Err(Error::Command {
                program: "ffmpeg",
                status,
            });
        }
    }
    Ok(())
}

/// Deletes intermediate files, returning how many were removed.
///
/// Failures are logged and skipped; a file that is already gone is not an error.
fn remove_scratch_files(paths: impl IntoIterator<Item = PathBuf>) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Scratch file already gone: {}", path.display());
            }
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    removed
}

/// Synthesizes one chunk per sentence and joins them into `out`.
pub fn synthesize_narration(
    model: &Path,
    sentences: &[String],
    chunk_dir: &Path,
    out: &Path,
) -> Result<()> {
    if sentences.is_empty() {
        return Err(Error::Validation("no sentences to narrate".to_string()));
    }
    require_file("piper model", model)?;
    fs::create_dir_all(chunk_dir)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut parts = Vec::with_capacity(sentences.len());
    for (i, sentence) in sentences.iter().enumerate() {
        let part = chunk_dir.join(format!("chunk_{}.wav", i + 1));
        info!("Generating TTS chunk {}/{} ({} chars)", i + 1, sentences.len(), sentence.len());
        debug!("Chunk text: {}", sentence);
        tts_generate_chunk(model, sentence, &part)?;
        parts.push(part);
    }

    info!("Concatenating {} chunks into {}", parts.len(), out.display());
    let joined = concat_wavs(chunk_dir, &parts, out);

    let removed = remove_scratch_files(parts.iter().cloned().chain([chunk_dir.join("files.txt")]));
    debug!("Removed {} scratch files from {}", removed, chunk_dir.display());
    joined?;

    info!("Narration written to {}", out.display());
    Ok(())
}
