//! Slideshow timeline: clip durations, crossfades and frame composition

use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use tracing::{debug, info};

use super::clip::{Clip, ImageAsset};
use super::params::SlideshowParams;
use super::timing::{quantize, safe_xfade, sample_evenly};
use crate::error::{Error, Result};

/// Durations chosen for a slideshow before any image is decoded
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowPlan {
    /// Indices into the supplied image list, in display order
    pub selected: Vec<usize>,
    /// On-screen seconds of every clip, crossfades included
    pub per_image: f64,
    /// Overlap between consecutive clips; 0 means hard cuts
    pub xfade: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    /// Frame-quantized audio length; the timeline is exactly this long
    pub duration: f64,
}

impl SlideshowPlan {
    /// Fits `image_count` images to `audio_duration` seconds of narration.
    pub fn new(image_count: usize, audio_duration: f64, params: &SlideshowParams) -> Result<Self> {
        if image_count == 0 {
            return Err(Error::EmptyInput("no images for the slideshow"));
        }
        let fps = params.fps;
        let total_audio = audio_duration.max(0.01);
        let duration = quantize(total_audio, fps);

        let max_images = ((total_audio / params.min_per_image).floor() as usize).max(1);
        let indices: Vec<usize> = (0..image_count).collect();
        let selected = if image_count > max_images {
            sample_evenly(&indices, max_images)?
        } else {
            indices
        };
        let n = selected.len();

        if n == 1 {
            let (fade_in, fade_out) = params.global_fades(duration);
            return Ok(Self {
                selected,
                per_image: duration,
                xfade: 0.0,
                fade_in,
                fade_out,
                duration,
            });
        }

        let per_img_naive = total_audio / n as f64;
        let xfade = safe_xfade(per_img_naive, fps, params.whip_max);

        // Every clip but the first hides `xfade` under its predecessor
        let per_image = quantize((total_audio + (n - 1) as f64 * xfade) / n as f64, fps);
        let mut xfade = quantize(xfade, fps);

        let min_body = params.safety_min_body.max(2.0 / fps);
        if per_image <= xfade + min_body {
            let mut xfade_frames = (xfade * fps).round().max(0.0) as u64;
            while xfade_frames > 0 && per_image <= xfade_frames as f64 / fps + min_body {
                xfade_frames -= 1;
            }
            xfade = xfade_frames as f64 / fps;
        }

        let (fade_in, fade_out) = params.global_fades(per_image);
        Ok(Self {
            selected,
            per_image,
            xfade,
            fade_in,
            fade_out,
            duration,
        })
    }

    /// Timeline position of the clip at `position`
    pub fn clip_start(&self, position: usize) -> f64 {
        position as f64 * (self.per_image - self.xfade)
    }

    /// End of the last clip, before the total is forced to `duration`
    pub fn content_duration(&self) -> f64 {
        let n = self.selected.len() as f64;
        n * self.per_image - (n - 1.0) * self.xfade
    }
}

/// A composed slideshow, ready to be rendered frame by frame
#[derive(Debug, Clone)]
pub struct Timeline {
    pub clips: Vec<Clip>,
    pub plan: SlideshowPlan,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Timeline {
    /// Builds the timeline from already-decoded images.
    pub fn build(
        images: Vec<ImageAsset>,
        audio_duration: f64,
        params: &SlideshowParams,
    ) -> Result<Self> {
        params.validate()?;
        let plan = SlideshowPlan::new(images.len(), audio_duration, params)?;
        // Sampling may repeat an index, so selected images are cloned
        let selected: Vec<ImageAsset> = plan.selected.iter().map(|&i| images[i].clone()).collect();
        Ok(Self::compose(selected, plan, params))
    }

    /// Samples `paths` first and decodes only the images that are kept.
    pub fn from_paths(
        paths: &[PathBuf],
        audio_duration: f64,
        params: &SlideshowParams,
    ) -> Result<Self> {
        params.validate()?;
        let plan = SlideshowPlan::new(paths.len(), audio_duration, params)?;
        if plan.selected.len() < paths.len() {
            info!(
                "Keeping {} of {} images ({}s minimum each)",
                plan.selected.len(),
                paths.len(),
                params.min_per_image
            );
        }
        let mut images = Vec::with_capacity(plan.selected.len());
        for &i in &plan.selected {
            debug!("Decoding image {}", paths[i].display());
            images.push(ImageAsset::open(&paths[i])?);
        }
        Ok(Self::compose(images, plan, params))
    }

    fn compose(images: Vec<ImageAsset>, plan: SlideshowPlan, params: &SlideshowParams) -> Self {
        info!(
            "Slideshow: {} clips x {:.3}s, crossfade {:.3}s, fades {:.2}s/{:.2}s, total {:.3}s",
            images.len(),
            plan.per_image,
            plan.xfade,
            plan.fade_in,
            plan.fade_out,
            plan.duration
        );
        let clips = images
            .into_iter()
            .enumerate()
            .map(|(i, asset)| {
                let mut clip = Clip::new(asset, plan.per_image, i, params);
                clip.start = plan.clip_start(i);
                debug!("Clip {} at {:.3}s: {}", i, clip.start, clip.path().display());
                clip
            })
            .collect();
        Self {
            clips,
            plan,
            fps: params.fps,
            width: params.target_w,
            height: params.target_h,
        }
    }

    /// Total length in seconds; always the frame-quantized audio length
    pub fn duration(&self) -> f64 {
        self.plan.duration
    }

    pub fn frame_count(&self) -> u64 {
        (self.duration() * self.fps).round() as u64
    }

    /// Time of frame `index`
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }

    /// Renders the composed frame at timeline time `t`.
    pub fn render_frame(&self, t: f64) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(self.width, self.height, Rgba([0, 0, 0, 255]));
        let Some(last) = self.clips.last() else {
            return frame;
        };

        // Past the last clip the final instant holds
        let content_end = last.end();
        let t_content = t.min(content_end);

        for (i, clip) in self.clips.iter().enumerate() {
            let is_last = i + 1 == self.clips.len();
            let active = t_content >= clip.start && (t_content < clip.end() || is_last);
            if !active {
                continue;
            }
            let local = t_content - clip.start;
            let opacity = if i > 0 && self.plan.xfade > 0.0 && local < self.plan.xfade {
                local / self.plan.xfade
            } else {
                1.0
            };
            let layer = clip.render(local);
            blend_over(&mut frame, &layer, opacity);
        }

        let gain = self.fade_gain(t);
        if gain < 1.0 {
            scale_brightness(&mut frame, gain);
        }
        frame
    }

    /// Global fade multiplier at time `t`
    fn fade_gain(&self, t: f64) -> f64 {
        let mut gain: f64 = 1.0;
        if self.plan.fade_in > 0.0 && t < self.plan.fade_in {
            gain = gain.min(t / self.plan.fade_in);
        }
        let remaining = self.duration() - t;
        if self.plan.fade_out > 0.0 && remaining < self.plan.fade_out {
            gain = gain.min(remaining / self.plan.fade_out);
        }
        gain.clamp(0.0, 1.0)
    }
}

/// Blends `layer` over `base` with a uniform `opacity`.
fn blend_over(base: &mut RgbaImage, layer: &RgbaImage, opacity: f64) {
    if opacity >= 1.0 {
        base.copy_from_slice(layer.as_raw());
        return;
    }
    let a = opacity.clamp(0.0, 1.0) as f32;
    for (dst, src) in base.pixels_mut().zip(layer.pixels()) {
        for c in 0..3 {
            dst[c] = (src[c] as f32 * a + dst[c] as f32 * (1.0 - a)).round() as u8;
        }
        dst[3] = 255;
    }
}

fn scale_brightness(frame: &mut RgbaImage, gain: f64) {
    let g = gain as f32;
    for px in frame.pixels_mut() {
        for c in 0..3 {
            px[c] = (px[c] as f32 * g).round() as u8;
        }
    }
}
