use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)([^.!?]+[.!?]+)|([^.!?]+$)").expect("valid sentence regex"));

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Splits text into sentences on `.`, `!` and `?`, dropping blank pieces.
pub fn split_sentences(text: &str) -> Vec<String> {
    let sentences: Vec<String> = SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if sentences.is_empty() && !text.trim().is_empty() {
        warn!("No sentence breaks found; returning whole text as one sentence");
        return vec![text.trim().to_string()];
    }
    sentences
}

/// Lists the images in `dir`, sorted by file name.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::not_found("image directory", dir));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    if files.is_empty() {
        return Err(Error::Validation(format!("no images found in {}", dir.display())));
    }
    debug!("Found {} images in {}", files.len(), dir.display());
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let text = "The sun rose. Nobody noticed!  Was it late? It was";
        assert_eq!(
            split_sentences(text),
            vec!["The sun rose.", "Nobody noticed!", "Was it late?", "It was"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_ellipsis_together() {
        assert_eq!(split_sentences("Wait... go."), vec!["Wait...", "go."]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_collect_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.txt", "10.webp", "02.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = collect_images(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["02.jpeg", "10.webp", "a.jpg", "b.PNG"]);
    }

    #[test]
    fn test_collect_images_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(collect_images(dir.path()), Err(Error::Validation(_))));
        assert!(matches!(
            collect_images(&dir.path().join("missing")),
            Err(Error::NotFound { .. })
        ));
    }
}
