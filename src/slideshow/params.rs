use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Slideshow configuration: canvas, pacing, motion, fades and color tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowParams {
    pub target_w: u32,
    pub target_h: u32,
    pub fps: f64,
    /// Minimum on-screen seconds per image before images get dropped
    pub min_per_image: f64,
    /// Crossfade cap; longer fades read as a whip
    pub whip_max: f64,

    pub contrast: f64,
    pub lum: f64,
    pub zoom_start: f64,
    pub zoom_end_even: f64,
    pub zoom_end_odd: f64,

    pub global_fade_in_cap: f64,
    pub global_fade_out_cap: f64,
    pub global_fade_in_frac: f64,
    pub global_fade_out_frac: f64,

    pub overscan: f64,
    /// Minimum visible seconds per image outside its crossfade
    pub safety_min_body: f64,

    pub colorspace: String,
    pub color_primaries: String,
    pub color_trc: String,
    /// "tv" (limited) or "pc" (full)
    pub color_range: String,
}

impl Default for SlideshowParams {
    fn default() -> Self {
        Self {
            target_w: 1080,
            target_h: 1920,
            fps: 30.0,
            min_per_image: 3.0,
            whip_max: 0.45,
            contrast: 1.0,
            lum: 0.0,
            zoom_start: 1.0,
            zoom_end_even: 1.12,
            zoom_end_odd: 1.15,
            global_fade_in_cap: 0.30,
            global_fade_out_cap: 0.25,
            global_fade_in_frac: 0.15,
            global_fade_out_frac: 0.12,
            overscan: 1.003,
            safety_min_body: 0.4,
            colorspace: "bt709".to_string(),
            color_primaries: "bt709".to_string(),
            color_trc: "bt709".to_string(),
            color_range: "pc".to_string(),
        }
    }
}

impl SlideshowParams {
    /// Loads params from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        crate::error::require_file("slideshow params", path)?;
        let data = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&data)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) {
            return Err(Error::Validation(format!("fps must be positive, got {}", self.fps)));
        }
        if self.target_w == 0 || self.target_h == 0 {
            return Err(Error::Validation(format!(
                "canvas must be non-empty, got {}x{}",
                self.target_w, self.target_h
            )));
        }
        if !(self.min_per_image > 0.0) {
            return Err(Error::Validation(format!(
                "min_per_image must be positive, got {}",
                self.min_per_image
            )));
        }
        if self.overscan < 1.0 {
            return Err(Error::Validation(format!(
                "overscan must be at least 1.0, got {}",
                self.overscan
            )));
        }
        if self.zoom_start > self.zoom_end_even || self.zoom_start > self.zoom_end_odd {
            return Err(Error::Validation(format!(
                "zoom_start {} exceeds a zoom end ({} / {})",
                self.zoom_start, self.zoom_end_even, self.zoom_end_odd
            )));
        }
        Ok(())
    }

    /// Zoom target for the clip at `index`; alternates to avoid a monotone sequence.
    pub fn zoom_end(&self, index: usize) -> f64 {
        if index % 2 == 0 {
            self.zoom_end_even
        } else {
            self.zoom_end_odd
        }
    }

    pub fn has_tone_adjustment(&self) -> bool {
        self.lum != 0.0 || (self.contrast - 1.0).abs() > 1e-6
    }

    /// Global (fade-in, fade-out) lengths for a clip of `duration` seconds.
    pub fn global_fades(&self, duration: f64) -> (f64, f64) {
        (
            self.global_fade_in_cap.min(duration * self.global_fade_in_frac),
            self.global_fade_out_cap.min(duration * self.global_fade_out_frac),
        )
    }
}
