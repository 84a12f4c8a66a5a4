// ============================================================================
// COLOR METRICS: RGB / CIE-Lab distances used by the magic wand
// ============================================================================
//
// Pure functions, no state. The sRGB → linear step goes through a 256-entry
// table built once; everything after it is a fixed matrix and a cube root.
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Upper bound of `rgb_distance`: sqrt(3 * 255²).
pub const MAX_RGB_DISTANCE: f32 = 441.672_96;

/// Sensitivity → threshold scale for each metric. Lab's perceptual range is
/// much narrower than raw RGB, so its scale is smaller.
const RGB_THRESHOLD_SCALE: f32 = 255.0;
const LAB_THRESHOLD_SCALE: f32 = 45.0;

// D65 reference white.
const WHITE_X: f32 = 0.95047;
const WHITE_Y: f32 = 1.0;
const WHITE_Z: f32 = 1.08883;

static SRGB_TO_LINEAR_LUT: OnceLock<[f32; 256]> = OnceLock::new();

/// Which distance the magic wand measures color similarity with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMetric {
    #[default]
    Rgb,
    Lab,
}

impl ColorMetric {
    /// Maximum accepted distance for a sensitivity in [0, 1].
    pub fn threshold(&self, sensitivity: f32) -> f32 {
        match self {
            ColorMetric::Rgb => sensitivity * RGB_THRESHOLD_SCALE,
            ColorMetric::Lab => sensitivity * LAB_THRESHOLD_SCALE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorMetric::Rgb => "rgb",
            ColorMetric::Lab => "lab",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rgb" => Some(ColorMetric::Rgb),
            "lab" => Some(ColorMetric::Lab),
            _ => None,
        }
    }
}

/// A CIE-Lab color.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

/// Euclidean distance between two RGB triples, in [0, 441.67].
#[inline]
pub fn rgb_distance(c1: [u8; 3], c2: [u8; 3]) -> f32 {
    let dr = c1[0] as f32 - c2[0] as f32;
    let dg = c1[1] as f32 - c2[1] as f32;
    let db = c1[2] as f32 - c2[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

#[inline]
fn srgb_to_linear(v: u8) -> f32 {
    let table = SRGB_TO_LINEAR_LUT.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let n = i as f32 / 255.0;
            *slot = if n > 0.04045 {
                ((n + 0.055) / 1.055).powf(2.4)
            } else {
                n / 12.92
            };
        }
        table
    });
    table[v as usize]
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// sRGB (D65) → CIE-Lab.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> Lab {
    let rr = srgb_to_linear(r);
    let gg = srgb_to_linear(g);
    let bb = srgb_to_linear(b);

    let x = (rr * 0.4124 + gg * 0.3576 + bb * 0.1805) / WHITE_X;
    let y = (rr * 0.2126 + gg * 0.7152 + bb * 0.0722) / WHITE_Y;
    let z = (rr * 0.0193 + gg * 0.1192 + bb * 0.9505) / WHITE_Z;

    let fx = lab_f(x);
    let fy = lab_f(y);
    let fz = lab_f(z);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Euclidean distance in Lab space.
#[inline]
pub fn lab_distance(c1: Lab, c2: Lab) -> f32 {
    let dl = c1.l - c2.l;
    let da = c1.a - c2.a;
    let db = c1.b - c2.b;
    (dl * dl + da * da + db * db).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_distance_extremes() {
        assert_eq!(rgb_distance([0, 0, 0], [0, 0, 0]), 0.0);
        let d = rgb_distance([0, 0, 0], [255, 255, 255]);
        assert!((d - MAX_RGB_DISTANCE).abs() < 1e-3);
        assert_eq!(rgb_distance([10, 0, 0], [13, 4, 0]), 5.0);
    }

    #[test]
    fn lab_of_black_and_white() {
        let black = rgb_to_lab(0, 0, 0);
        assert!(black.l.abs() < 1e-3);
        let white = rgb_to_lab(255, 255, 255);
        assert!((white.l - 100.0).abs() < 0.05);
        assert!(white.a.abs() < 0.1 && white.b.abs() < 0.1);
    }

    #[test]
    fn lab_distance_to_self_is_zero() {
        for &(r, g, b) in &[(0, 0, 0), (12, 200, 77), (255, 0, 128), (255, 255, 255)] {
            let c = rgb_to_lab(r, g, b);
            assert_eq!(lab_distance(c, rgb_to_lab(r, g, b)), 0.0);
        }
    }

    #[test]
    fn pure_red_has_positive_a() {
        let red = rgb_to_lab(255, 0, 0);
        assert!((red.l - 53.2).abs() < 0.5);
        assert!(red.a > 70.0);
    }

    #[test]
    fn thresholds_use_metric_scale() {
        assert_eq!(ColorMetric::Rgb.threshold(0.5), 127.5);
        assert_eq!(ColorMetric::Lab.threshold(1.0), 45.0);
        assert_eq!(ColorMetric::from_name("LAB"), Some(ColorMetric::Lab));
    }
}
