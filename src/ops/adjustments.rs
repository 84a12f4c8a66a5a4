// ============================================================================
// FILTER PIPELINE: scalar color adjustments (selection aware)
// ============================================================================
//
// One fixed-order per-pixel transform driven by a `FilterState`. If a mask is
// supplied, only selected pixels are modified; the rest are copied through
// byte for byte. Rows are processed in parallel via rayon.
// ============================================================================

use std::collections::BTreeMap;

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{check_mask_dimensions, EngineError, PixelBuffer};

const BRIGHTNESS_SCALE: f32 = 255.0;
const TEMPERATURE_SHIFT: f32 = 40.0;
const TINT_SHIFT: f32 = 25.0;
const DUOTONE_DARK: [f32; 3] = [20.0, 40.0, 60.0];
const DUOTONE_LIGHT: [f32; 3] = [60.0, 180.0, 255.0];
/// Every n-th pixel (flat index) gets the glitch channel shift.
const GLITCH_PERIOD: usize = 7;
const GLITCH_RED_GAIN: f32 = 70.0;
const GLITCH_BLUE_CUT: f32 = 60.0;
const BLOOM_BOOST: f32 = 35.0;
/// Glitch and bloom below this are treated as off.
const EFFECT_EPSILON: f32 = 0.01;

/// Scalar channel adjustments. All zeros is the identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    /// -1..1, added as `b * 255`.
    pub brightness: f32,
    /// -1..1, slope `1 + c` around mid-gray.
    pub contrast: f32,
    /// -1..1, warm adds red and removes blue.
    pub temperature: f32,
    /// -1..1, shifts green.
    pub tint: f32,
    /// 0..1, any positive value maps the pixel onto the blue duotone ramp.
    pub duotone: f32,
    /// 0..1
    pub bloom: f32,
    /// 0..1
    pub glitch: f32,
}

impl FilterState {
    pub fn is_identity(&self) -> bool {
        *self == FilterState::default()
    }

    /// Fold `"<channel>.amount"` entries of an effect uniform map onto this
    /// state. Amounts are added and the sum clamped to the channel's range.
    /// Keys for other primitives or other uniforms are ignored.
    pub fn merged_with(&self, uniforms: &BTreeMap<String, f32>) -> FilterState {
        let mut out = *self;
        for (key, &value) in uniforms {
            let Some((channel, uniform)) = key.split_once('.') else {
                continue;
            };
            if uniform != "amount" || !value.is_finite() {
                continue;
            }
            match channel {
                "brightness" => out.brightness = (out.brightness + value).clamp(-1.0, 1.0),
                "contrast" => out.contrast = (out.contrast + value).clamp(-1.0, 1.0),
                "temperature" => out.temperature = (out.temperature + value).clamp(-1.0, 1.0),
                "tint" => out.tint = (out.tint + value).clamp(-1.0, 1.0),
                "duotone" => out.duotone = (out.duotone + value).clamp(0.0, 1.0),
                "bloom" => out.bloom = (out.bloom + value).clamp(0.0, 1.0),
                "glitch" => out.glitch = (out.glitch + value).clamp(0.0, 1.0),
                _ => {}
            }
        }
        out
    }

    /// Same state with every channel clamped to its range.
    pub fn clamped(&self) -> FilterState {
        FilterState {
            brightness: self.brightness.clamp(-1.0, 1.0),
            contrast: self.contrast.clamp(-1.0, 1.0),
            temperature: self.temperature.clamp(-1.0, 1.0),
            tint: self.tint.clamp(-1.0, 1.0),
            duotone: self.duotone.clamp(0.0, 1.0),
            bloom: self.bloom.clamp(0.0, 1.0),
            glitch: self.glitch.clamp(0.0, 1.0),
        }
    }
}

// ============================================================================
// HELPER: selection-aware per-pixel transform
// ============================================================================

/// Run `transform` over every selected pixel and return a new buffer.
/// `transform` receives the flat pixel index and (r, g, b) as f32 and returns
/// (r, g, b); alpha is copied through.
pub(crate) fn apply_pixel_transform<F>(
    buffer: &PixelBuffer,
    mask: Option<&GrayImage>,
    transform: F,
) -> Result<RgbaImage, EngineError>
where
    F: Fn(usize, f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    if let Some(m) = mask {
        check_mask_dimensions(buffer, m)?;
    }
    let w = buffer.width() as usize;
    let h = buffer.height() as usize;
    if w == 0 || h == 0 {
        return Ok(buffer.clone());
    }

    let src_raw = buffer.as_raw();
    let mut dst_raw = vec![0u8; w * h * 4];
    let stride = w * 4;
    let mask_raw = mask.map(|m| m.as_raw().as_slice());

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 4;
            let index = y * w + x;
            if let Some(mr) = mask_raw
                && mr[index] == 0
            {
                row_out[pi..pi + 4].copy_from_slice(&row_in[pi..pi + 4]);
                continue;
            }
            let r = row_in[pi] as f32;
            let g = row_in[pi + 1] as f32;
            let b = row_in[pi + 2] as f32;
            let (nr, ng, nb) = transform(index, r, g, b);
            // Halves round to even.
            row_out[pi] = nr.round_ties_even().clamp(0.0, 255.0) as u8;
            row_out[pi + 1] = ng.round_ties_even().clamp(0.0, 255.0) as u8;
            row_out[pi + 2] = nb.round_ties_even().clamp(0.0, 255.0) as u8;
            row_out[pi + 3] = row_in[pi + 3];
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).ok_or(EngineError::InvalidDimensions {
        expected: (w as u32, h as u32),
        actual: (0, 0),
    })
}

/// Apply every channel of `filter` to `buffer`, in fixed order:
/// brightness, contrast, temperature/tint, duotone, glitch, bloom.
pub fn apply_filters(
    buffer: &PixelBuffer,
    filter: &FilterState,
    mask: Option<&GrayImage>,
) -> Result<RgbaImage, EngineError> {
    let f = *filter;
    let brightness = f.brightness * BRIGHTNESS_SCALE;
    let contrast = 1.0 + f.contrast;
    let temp_shift = f.temperature * TEMPERATURE_SHIFT;
    let tint_shift = f.tint * TINT_SHIFT;
    let duotone = f.duotone > 0.0;
    let glitch = f.glitch > EFFECT_EPSILON;
    let bloom = if f.bloom > EFFECT_EPSILON { f.bloom * BLOOM_BOOST } else { 0.0 };

    apply_pixel_transform(buffer, mask, move |index, r, g, b| {
        let mut r = (r + brightness - 128.0) * contrast + 128.0;
        let mut g = (g + brightness - 128.0) * contrast + 128.0;
        let mut b = (b + brightness - 128.0) * contrast + 128.0;

        r += temp_shift;
        b -= temp_shift;
        g += tint_shift;

        if duotone {
            let luma = (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
            r = luma * DUOTONE_LIGHT[0] + (1.0 - luma) * DUOTONE_DARK[0];
            g = luma * DUOTONE_LIGHT[1] + (1.0 - luma) * DUOTONE_DARK[1];
            b = luma * DUOTONE_LIGHT[2] + (1.0 - luma) * DUOTONE_DARK[2];
        }

        if glitch && index % GLITCH_PERIOD == 0 {
            r = (r + f.glitch * GLITCH_RED_GAIN).min(255.0);
            b = (b - f.glitch * GLITCH_BLUE_CUT).max(0.0);
        }

        (r + bloom, g + bloom, b + bloom)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8, (200 + x % 56) as u8])
        })
    }

    #[test]
    fn zero_state_is_identity() {
        let img = gradient(9, 5);
        let out = apply_filters(&img, &FilterState::default(), None).unwrap();
        assert_eq!(out, img);
        assert!(FilterState::default().is_identity());
    }

    #[test]
    fn masked_out_pixels_are_untouched() {
        let img = gradient(6, 4);
        let mut mask = GrayImage::new(6, 4);
        mask.put_pixel(2, 1, Luma([255]));
        let filter = FilterState { brightness: 0.3, duotone: 1.0, glitch: 1.0, ..Default::default() };
        let out = apply_filters(&img, &filter, Some(&mask)).unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            if (x, y) == (2, 1) {
                assert_ne!(*px, *img.get_pixel(x, y));
            } else {
                assert_eq!(*px, *img.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn brightness_and_contrast_math() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 128, 200, 77]));
        let up = FilterState { brightness: 0.1, ..Default::default() };
        let out = apply_filters(&img, &up, None).unwrap();
        // 0.1 * 255 = 25.5, so every channel lands on a half: 125.5, 153.5, 225.5.
        assert_eq!(*out.get_pixel(0, 0), Rgba([126, 154, 226, 77]));

        // 126.5 and 127.5 both round to the even neighbour.
        let odd = RgbaImage::from_pixel(1, 1, Rgba([101, 102, 99, 255]));
        let out = apply_filters(&odd, &up, None).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([126, 128, 124, 255]));

        let flat = FilterState { contrast: -1.0, ..Default::default() };
        let out = apply_filters(&img, &flat, None).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([128, 128, 128, 77]));
    }

    #[test]
    fn temperature_and_tint_shift_channels() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        let warm = FilterState { temperature: 0.5, tint: -0.4, ..Default::default() };
        let out = apply_filters(&img, &warm, None).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([120, 90, 80, 255]));
    }

    #[test]
    fn duotone_maps_white_to_light_tone() {
        let img = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        let filter = FilterState { duotone: 0.2, ..Default::default() };
        let out = apply_filters(&img, &filter, None).unwrap();
        assert_eq!(*out.get_pixel(1, 0), Rgba([60, 180, 255, 255]));
    }

    #[test]
    fn glitch_hits_every_seventh_pixel() {
        let img = RgbaImage::from_pixel(5, 3, Rgba([100, 100, 100, 255]));
        let filter = FilterState { glitch: 0.5, ..Default::default() };
        let out = apply_filters(&img, &filter, None).unwrap();
        for (i, px) in out.pixels().enumerate() {
            if i % 7 == 0 {
                assert_eq!(*px, Rgba([135, 100, 70, 255]), "pixel {}", i);
            } else {
                assert_eq!(*px, Rgba([100, 100, 100, 255]), "pixel {}", i);
            }
        }
    }

    #[test]
    fn tiny_bloom_and_glitch_are_ignored() {
        let img = gradient(4, 4);
        let filter = FilterState { bloom: 0.01, glitch: 0.005, ..Default::default() };
        assert_eq!(apply_filters(&img, &filter, None).unwrap(), img);
    }

    #[test]
    fn mask_size_mismatch_is_an_error() {
        let img = gradient(4, 4);
        let mask = GrayImage::new(3, 4);
        let err = apply_filters(&img, &FilterState::default(), Some(&mask)).unwrap_err();
        assert_eq!(err, EngineError::InvalidDimensions { expected: (4, 4), actual: (3, 4) });
    }

    #[test]
    fn merge_adds_channel_amounts_and_clamps() {
        let base = FilterState { brightness: 0.9, tint: 0.25, ..Default::default() };
        let mut uniforms = BTreeMap::new();
        uniforms.insert("brightness.amount".to_string(), 0.5);
        uniforms.insert("bloom.amount".to_string(), 0.4);
        uniforms.insert("bloom.radius".to_string(), 9.0);
        uniforms.insert("vignette.amount".to_string(), 0.7);
        let merged = base.merged_with(&uniforms);
        assert_eq!(merged.brightness, 1.0);
        assert_eq!(merged.bloom, 0.4);
        assert_eq!(merged.tint, 0.25);
        assert_eq!(merged.contrast, 0.0);
    }
}
