//! Ken Burns clips: one slowly zooming still per clip

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use super::params::SlideshowParams;
use super::timing::ease_in_out_cubic;
use crate::error::{require_file, Error, Result};

/// A decoded still image
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub image: RgbaImage,
}

impl ImageAsset {
    /// Decodes an image file into RGBA8
    pub fn open(path: &Path) -> Result<Self> {
        require_file("image", path)?;
        let image = image::open(path)?.to_rgba8();
        Self::from_image(path, image)
    }

    /// Wraps an already-decoded image; empty images have nothing to frame.
    pub fn from_image(path: impl Into<PathBuf>, image: RgbaImage) -> Result<Self> {
        let path = path.into();
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::Validation(format!(
                "image {} is empty ({}x{})",
                path.display(),
                image.width(),
                image.height()
            )));
        }
        Ok(Self { path, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// One animated image on the timeline
#[derive(Debug, Clone)]
pub struct Clip {
    asset: ImageAsset,
    /// Position of the clip on the timeline in seconds
    pub start: f64,
    pub duration: f64,
    canvas_w: u32,
    canvas_h: u32,
    base_w: f64,
    base_h: f64,
    zoom_start: f64,
    zoom_end: f64,
}

impl Clip {
    /// Builds the zoom clip for `asset`, the `index`-th image of the slideshow.
    pub fn new(asset: ImageAsset, duration: f64, index: usize, params: &SlideshowParams) -> Self {
        let cover = cover_scale(
            asset.width(),
            asset.height(),
            params.target_w,
            params.target_h,
            params.overscan,
        );
        let base_w = (asset.width() as f64 * cover).ceil();
        let base_h = (asset.height() as f64 * cover).ceil();

        let asset = if params.has_tone_adjustment() {
            ImageAsset {
                image: adjust_tone(&asset.image, params.lum, params.contrast),
                path: asset.path,
            }
        } else {
            asset
        };

        Self {
            asset,
            start: 0.0,
            duration,
            canvas_w: params.target_w,
            canvas_h: params.target_h,
            base_w,
            base_h,
            zoom_start: params.zoom_start,
            zoom_end: params.zoom_end(index),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn path(&self) -> &Path {
        &self.asset.path
    }

    /// Zoom factor at clip-local time `t`
    pub fn zoom(&self, t: f64) -> f64 {
        let progress = t / self.duration.max(1e-6);
        self.zoom_start + (self.zoom_end - self.zoom_start) * ease_in_out_cubic(progress)
    }

    /// Displayed (width, height) at clip-local time `t`.
    ///
    /// Rounded up so the image never underfills the canvas.
    pub fn display_size(&self, t: f64) -> (u32, u32) {
        let z = self.zoom(t);
        (
            (self.base_w * z).ceil() as u32,
            (self.base_h * z).ceil() as u32,
        )
    }

    /// Renders the canvas-sized frame at clip-local time `t`.
    pub fn render(&self, t: f64) -> RgbaImage {
        let t = t.clamp(0.0, self.duration);
        let (disp_w, disp_h) = self.display_size(t);
        let img_w = self.asset.width();
        let img_h = self.asset.height();

        // Source pixels per displayed pixel
        let sx = img_w as f64 / disp_w as f64;
        let sy = img_h as f64 / disp_h as f64;

        // The canvas shows the centered (canvas_w x canvas_h) window of the display
        let off_x = (disp_w as f64 - self.canvas_w as f64).max(0.0) / 2.0;
        let off_y = (disp_h as f64 - self.canvas_h as f64).max(0.0) / 2.0;

        let src_x = ((off_x * sx).floor() as u32).min(img_w.saturating_sub(1));
        let src_y = ((off_y * sy).floor() as u32).min(img_h.saturating_sub(1));
        let src_w = ((self.canvas_w as f64 * sx).round() as u32).clamp(1, img_w - src_x);
        let src_h = ((self.canvas_h as f64 * sy).round() as u32).clamp(1, img_h - src_y);

        let window = imageops::crop_imm(&self.asset.image, src_x, src_y, src_w, src_h).to_image();
        imageops::resize(&window, self.canvas_w, self.canvas_h, FilterType::Triangle)
    }
}

/// Scale that makes a `img_w x img_h` image cover the canvas on both axes,
/// enlarged by `overscan`.
pub fn cover_scale(img_w: u32, img_h: u32, canvas_w: u32, canvas_h: u32, overscan: f64) -> f64 {
    let sx = canvas_w as f64 / img_w.max(1) as f64;
    let sy = canvas_h as f64 / img_h.max(1) as f64;
    sx.max(sy) * overscan
}

/// Uniform luminance/contrast adjustment around mid-gray.
fn adjust_tone(image: &RgbaImage, lum: f64, contrast: f64) -> RgbaImage {
    const THRESHOLD: f64 = 128.0;
    let mut out = image.clone();
    for Rgba(px) in out.pixels_mut() {
        for channel in px.iter_mut().take(3) {
            let v = *channel as f64;
            let adjusted = THRESHOLD + contrast * (v - THRESHOLD) + lum;
            *channel = adjusted.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
