//! Color-histogram appearance descriptors.
//!
//! A descriptor concatenates one 16-bin histogram per RGB channel with an 8x8
//! hue/saturation histogram. Each block is L2 normalized on its own, and two
//! descriptors are compared block by block with histogram correlation.

use image::RgbImage;
use ndarray::{Array1, ArrayView1, s};
use tracing::{debug, warn};

use crate::geometry::Rect;

const RGB_BINS: usize = 16;
const HUE_BINS: usize = 8;
const SAT_BINS: usize = 8;

/// Length of every descriptor produced by [`AppearanceExtractor`].
pub const DESCRIPTOR_LEN: usize = 3 * RGB_BINS + HUE_BINS * SAT_BINS;

const BLOCKS: [(usize, usize); 4] = [
    (0, RGB_BINS),
    (RGB_BINS, 2 * RGB_BINS),
    (2 * RGB_BINS, 3 * RGB_BINS),
    (3 * RGB_BINS, DESCRIPTOR_LEN),
];

/// Fixed-length visual signature of one detection.
///
/// The neutral descriptor (all zeros) stands in when no crop could be taken.
/// It never matches anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    values: Array1<f32>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Descriptor {
    pub fn neutral() -> Self {
        Self {
            values: Array1::zeros(DESCRIPTOR_LEN),
        }
    }

    /// Wrap raw values. Anything that is not exactly [`DESCRIPTOR_LEN`] finite
    /// values yields the neutral descriptor.
    pub fn from_values(values: Vec<f32>) -> Self {
        if values.len() != DESCRIPTOR_LEN || values.iter().any(|v| !v.is_finite()) {
            return Self::neutral();
        }
        Self {
            values: Array1::from_vec(values),
        }
    }

    pub fn values(&self) -> ArrayView1<'_, f32> {
        self.values.view()
    }

    /// False for the neutral descriptor.
    pub fn is_valid(&self) -> bool {
        self.values.iter().any(|&v| v != 0.0)
    }

    /// Mean per-block histogram correlation, clamped to [0, 1].
    ///
    /// Returns 0 if either side is neutral.
    pub fn similarity(&self, other: &Descriptor) -> f32 {
        if !self.is_valid() || !other.is_valid() {
            return 0.0;
        }

        let total: f32 = BLOCKS
            .iter()
            .map(|&(start, end)| {
                correlation(
                    self.values.slice(s![start..end]),
                    other.values.slice(s![start..end]),
                )
                .max(0.0)
            })
            .sum();
        (total / BLOCKS.len() as f32).min(1.0)
    }

    /// Best similarity against a history of descriptors, or `None` when
    /// no comparison was possible.
    pub fn best_similarity<'a>(
        &self,
        history: impl IntoIterator<Item = &'a Descriptor>,
    ) -> Option<f32> {
        if !self.is_valid() {
            return None;
        }
        history
            .into_iter()
            .filter(|d| d.is_valid())
            .map(|d| self.similarity(d))
            .reduce(f32::max)
    }
}

fn correlation(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let n = a.len() as f32;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom > f32::EPSILON {
        cov / denom
    } else if a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6) {
        1.0
    } else {
        0.0
    }
}

/// Computes descriptors from image crops. Holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppearanceExtractor;

impl AppearanceExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build an RGB image from packed RGB8 bytes.
    pub fn image_from_raw(data: &[u8], width: u32, height: u32) -> Option<RgbImage> {
        let image = RgbImage::from_raw(width, height, data.to_vec());
        if image.is_none() {
            warn!(
                len = data.len(),
                width, height, "image buffer does not match its dimensions"
            );
        }
        image
    }

    /// Descriptor of the part of `bbox` that lies inside `image`.
    ///
    /// Degenerate or fully clipped crops yield [`Descriptor::neutral`].
    pub fn extract(&self, image: &RgbImage, bbox: &Rect) -> Descriptor {
        let Some((x0, y0, x1, y1)) = bbox.clamp_to_image(image.width(), image.height()) else {
            debug!(?bbox, "empty crop, using neutral descriptor");
            return Descriptor::neutral();
        };

        let mut values = vec![0.0f32; DESCRIPTOR_LEN];
        for y in y0..y1 {
            for x in x0..x1 {
                let [r, g, b] = image.get_pixel(x, y).0;
                values[r as usize * RGB_BINS / 256] += 1.0;
                values[RGB_BINS + g as usize * RGB_BINS / 256] += 1.0;
                values[2 * RGB_BINS + b as usize * RGB_BINS / 256] += 1.0;

                let (hue, sat) = hue_saturation(r, g, b);
                let h_bin = ((hue / 360.0 * HUE_BINS as f32) as usize).min(HUE_BINS - 1);
                let s_bin = ((sat * SAT_BINS as f32) as usize).min(SAT_BINS - 1);
                values[3 * RGB_BINS + h_bin * SAT_BINS + s_bin] += 1.0;
            }
        }

        for &(start, end) in BLOCKS.iter() {
            let block = &mut values[start..end];
            let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm <= 0.0 {
                return Descriptor::neutral();
            }
            block.iter_mut().for_each(|v| *v /= norm);
        }

        Descriptor::from_values(values)
    }
}

/// Hue in degrees [0, 360) and saturation in [0, 1].
fn hue_saturation(r: u8, g: u8, b: u8) -> (f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let sat = if max > 0.0 { delta / max } else { 0.0 };
    if delta <= 0.0 {
        return (0.0, sat);
    }

    let hue = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (hue.rem_euclid(360.0), sat)
}
