use std::path::PathBuf;
use std::process::ExitStatus;

/// Result type for pipeline stages
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the pipeline stages
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("{program} exited with {status}")]
    Command {
        program: &'static str,
        status: ExitStatus,
    },
}

impl Error {
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Error::NotFound {
            what,
            path: path.into(),
        }
    }
}

/// Fails with `NotFound` unless `path` exists.
pub fn require_file(what: &'static str, path: &std::path::Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::not_found(what, path))
    }
}
