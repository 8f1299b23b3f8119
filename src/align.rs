//! Forced alignment: word timings for a known narration text

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{error, info};

use crate::audio::wav_duration_seconds;
use crate::error::{require_file, Error, Result};
use crate::story::StoryScript;

/// One aligned word; the aligner may leave either bound unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl WordToken {
    pub fn new(word: &str, start: f64, end: f64) -> Self {
        Self {
            word: word.to_string(),
            start: Some(start),
            end: Some(end),
        }
    }

    /// Both bounds, if the aligner anchored this word
    pub fn times(&self) -> Option<(f64, f64)> {
        self.start.zip(self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordToken>,
}

#[derive(Debug, Deserialize)]
struct AlignmentDocument {
    #[serde(default)]
    segments: Vec<AlignedSegment>,
}

/// Parses an aligner JSON document (`{"segments": [...]}`).
pub fn parse_alignment(json: &str) -> Result<Vec<AlignedSegment>> {
    let doc: AlignmentDocument = serde_json::from_str(json)?;
    Ok(doc.segments)
}

/// Reads a previously produced alignment document.
pub fn load_alignment(path: &Path) -> Result<Vec<AlignedSegment>> {
    require_file("alignment JSON", path)?;
    parse_alignment(&std::fs::read_to_string(path)?)
}

/// Produces word timings for `text` spoken in `audio`.
pub trait Aligner {
    fn align(&self, audio: &Path, text: &str, duration: f64) -> Result<Vec<AlignedSegment>>;
}

/// Runs an external alignment program.
///
/// The text goes to stdin; the program prints the alignment document on stdout.
#[derive(Debug, Clone)]
pub struct CommandAligner {
    pub program: PathBuf,
    pub checkpoint: PathBuf,
    pub language: String,
}

impl CommandAligner {
    fn args(&self, audio: &Path, duration: f64) -> Vec<String> {
        vec![
            "--audio".to_string(),
            audio.display().to_string(),
            "--checkpoint".to_string(),
            self.checkpoint.display().to_string(),
            "--duration".to_string(),
            format!("{:.3}", duration),
            "--language".to_string(),
            self.language.clone(),
        ]
    }
}

impl Aligner for CommandAligner {
    fn align(&self, audio: &Path, text: &str, duration: f64) -> Result<Vec<AlignedSegment>> {
        info!("Aligning {} words against {}", text.split_whitespace().count(), audio.display());
        let mut child = Command::new(&self.program)
            .args(self.args(audio, duration))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            error!("Aligner {} failed", self.program.display());
            return Err(Error::Command {
                program: "aligner",
                status: output.status,
            });
        }
        let segments = parse_alignment(&String::from_utf8_lossy(&output.stdout))?;
        info!("Aligner returned {} segments", segments.len());
        Ok(segments)
    }
}

/// Inputs checked before any alignment work starts
#[derive(Debug, Clone)]
pub struct SubtitleJob {
    pub text: String,
    pub audio: PathBuf,
    pub duration: f64,
}

impl SubtitleJob {
    /// Fails fast on a missing story, audio file or checkpoint, or an empty story.
    pub fn prepare(story_json: &Path, audio: &Path, checkpoint: &Path) -> Result<Self> {
        let script = StoryScript::load(story_json)?;
        let text = script.narration_text();
        require_file("audio", audio)?;
        require_file("alignment checkpoint", checkpoint)?;
        let duration = wav_duration_seconds(audio)?;
        Ok(Self {
            text,
            audio: audio.to_path_buf(),
            duration,
        })
    }

    pub fn align(&self, aligner: &dyn Aligner) -> Result<Vec<AlignedSegment>> {
        aligner.align(&self.audio, &self.text, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    struct FixedAligner;

    impl Aligner for FixedAligner {
        fn align(&self, _audio: &Path, text: &str, duration: f64) -> Result<Vec<AlignedSegment>> {
            Ok(vec![AlignedSegment {
                start: 0.0,
                end: duration,
                text: text.to_string(),
                words: vec![WordToken::new(text, 0.0, duration)],
            }])
        }
    }

    fn write_wav(path: &Path, seconds: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..8000 * seconds {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_parse_alignment_with_unanchored_words() {
        let json = r#"{"segments": [{"start": 0.0, "end": 2.5, "text": "Hi there",
            "words": [{"word": "Hi", "start": 0.1, "end": 0.4},
                      {"word": "2024", "score": 0.0},
                      {"word": "there", "start": 0.5}]}]}"#;
        let segments = parse_alignment(json).unwrap();
        assert_eq!(segments.len(), 1);
        let words = &segments[0].words;
        assert_eq!(words[0].times(), Some((0.1, 0.4)));
        assert_eq!(words[1].times(), None);
        assert_eq!(words[2].times(), None);
    }

    #[test]
    fn test_prepare_checks_inputs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let story = dir.path().join("story.json");
        let audio = dir.path().join("output.wav");
        let ckpt = dir.path().join("model.pth");

        let err = SubtitleJob::prepare(&story, &audio, &ckpt).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "story JSON", .. }));

        std::fs::write(&story, r#"{"story": []}"#).unwrap();
        let err = SubtitleJob::prepare(&story, &audio, &ckpt).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        std::fs::write(&story, r#"{"story": ["Hello world."]}"#).unwrap();
        let err = SubtitleJob::prepare(&story, &audio, &ckpt).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "audio", .. }));

        write_wav(&audio, 2);
        let err = SubtitleJob::prepare(&story, &audio, &ckpt).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "alignment checkpoint", .. }));

        std::fs::write(&ckpt, b"weights").unwrap();
        let job = SubtitleJob::prepare(&story, &audio, &ckpt).unwrap();
        assert_eq!(job.text, "Hello world.");
        assert!((job.duration - 2.0).abs() < 1e-9);

        let segments = job.align(&FixedAligner).unwrap();
        assert_eq!(segments[0].end, job.duration);
    }

    #[test]
    fn test_command_aligner_args() {
        let aligner = CommandAligner {
            program: PathBuf::from("align-words"),
            checkpoint: PathBuf::from("models/ckpt.pth"),
            language: "en".to_string(),
        };
        let args = aligner.args(Path::new("a.wav"), 12.3456);
        assert_eq!(
            args,
            vec![
                "--audio",
                "a.wav",
                "--checkpoint",
                "models/ckpt.pth",
                "--duration",
                "12.346",
                "--language",
                "en"
            ]
        );
    }
}
