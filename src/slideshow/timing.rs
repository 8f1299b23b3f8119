//! Frame-grid arithmetic shared by the slideshow builder

use crate::error::{Error, Result};

/// Snaps `t` to the nearest multiple of the frame period.
pub fn quantize(t: f64, fps: f64) -> f64 {
    (t * fps).round() / fps
}

/// Cubic ease-in-out; input is clamped to [0, 1].
pub fn ease_in_out_cubic(p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    if p < 0.5 {
        4.0 * p * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(3) / 2.0
    }
}

/// Picks `k` evenly spaced items, always keeping the first and last.
///
/// Indices may repeat at extreme ratios; callers rely on getting exactly `k`
/// items back, so repeats are kept.
pub fn sample_evenly<T: Clone>(items: &[T], k: usize) -> Result<Vec<T>> {
    let n = items.len();
    if n == 0 {
        return Err(Error::EmptyInput("no items to sample"));
    }
    if k <= 1 {
        return Ok(vec![items[0].clone()]);
    }
    // Divide last so exact halves stay exact and round to even
    Ok((0..k)
        .map(|i| {
            let idx = ((i * (n - 1)) as f64 / (k - 1) as f64).round_ties_even() as usize;
            items[idx.min(n - 1)].clone()
        })
        .collect())
}

/// Picks a frame-aligned crossfade for images shown `per_img` seconds each.
///
/// The fade is ~22% of the image, at least 0.25s and at most `whip_max`, and
/// always leaves `max(0.4, 2/fps)` seconds of unblended body.
pub fn safe_xfade(per_img: f64, fps: f64, whip_max: f64) -> f64 {
    let mut proposed = whip_max.min((per_img * 0.22).max(0.25));
    let min_body = 0.4_f64.max(2.0 / fps);
    let max_fade = (per_img - min_body).max(0.0);
    proposed = proposed.min(max_fade);

    let mut fade = quantize(proposed, fps);
    let min_fade = 2.0 / fps;
    if fade < min_fade && proposed >= min_fade {
        fade = min_fade;
    }
    fade.max(0.0)
}
