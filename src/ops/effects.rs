// ============================================================================
// EFFECT PRIMITIVES: CPU kernels for the shader stack, rayon-parallelized
// ============================================================================
//
// Every effect node names one `Primitive`. Channel primitives (brightness,
// contrast, temperature, tint, duotone, bloom, glitch) are folded into the
// `FilterState` and pass through here untouched. The remaining primitives
// have a kernel below, grouped as:
//   - Color: Saturation, Hue Rotate, Exposure, Gamma, Film Curve, Teal/Orange
//   - Lens: Vignette, Chromatic Aberration
//   - Texture: Grain, Scanlines
//
// Kernels take the whole uniform map of their node; `amount` is the main
// strength and a missing `amount` means no effect.
// ============================================================================

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Named shader primitive an effect node applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Primitive {
    Brightness,
    Contrast,
    Saturation,
    HueRotate,
    Temperature,
    Tint,
    Exposure,
    Gamma,
    Vignette,
    Grain,
    Bloom,
    Glitch,
    Duotone,
    Scanlines,
    ChromaticAberration,
    FilmCurve,
    TealOrange,
}

impl Primitive {
    pub fn all() -> &'static [Primitive] {
        &[
            Primitive::Brightness,
            Primitive::Contrast,
            Primitive::Saturation,
            Primitive::HueRotate,
            Primitive::Temperature,
            Primitive::Tint,
            Primitive::Exposure,
            Primitive::Gamma,
            Primitive::Vignette,
            Primitive::Grain,
            Primitive::Bloom,
            Primitive::Glitch,
            Primitive::Duotone,
            Primitive::Scanlines,
            Primitive::ChromaticAberration,
            Primitive::FilmCurve,
            Primitive::TealOrange,
        ]
    }

    /// Identifier used in uniform keys (`"<primitive>.<uniform>"`) and ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Brightness => "brightness",
            Primitive::Contrast => "contrast",
            Primitive::Saturation => "saturation",
            Primitive::HueRotate => "hueRotate",
            Primitive::Temperature => "temperature",
            Primitive::Tint => "tint",
            Primitive::Exposure => "exposure",
            Primitive::Gamma => "gamma",
            Primitive::Vignette => "vignette",
            Primitive::Grain => "grain",
            Primitive::Bloom => "bloom",
            Primitive::Glitch => "glitch",
            Primitive::Duotone => "duotone",
            Primitive::Scanlines => "scanlines",
            Primitive::ChromaticAberration => "chromaticAberration",
            Primitive::FilmCurve => "filmCurve",
            Primitive::TealOrange => "tealOrange",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.as_str() == name)
    }

    /// True for primitives handled by the filter pipeline rather than a kernel.
    pub fn is_filter_channel(&self) -> bool {
        matches!(
            self,
            Primitive::Brightness
                | Primitive::Contrast
                | Primitive::Temperature
                | Primitive::Tint
                | Primitive::Duotone
                | Primitive::Bloom
                | Primitive::Glitch
        )
    }

    /// Primitives whose output changes from frame to frame.
    pub fn is_animated(&self) -> bool {
        matches!(self, Primitive::Glitch | Primitive::Scanlines)
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Per-pixel transform over the whole buffer. `transform` receives
/// (x, y, r, g, b) as f32 and returns (r, g, b); alpha is kept.
fn apply_per_pixel<F>(flat: &RgbaImage, transform: F) -> RgbaImage
where
    F: Fn(u32, u32, f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    if w == 0 || h == 0 {
        return flat.clone();
    }

    let stride = w * 4;
    let mut out = flat.clone();
    let src_raw = flat.as_raw();

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 4;
            let (nr, ng, nb) = transform(
                x as u32,
                y as u32,
                row_in[pi] as f32,
                row_in[pi + 1] as f32,
                row_in[pi + 2] as f32,
            );
            row_out[pi] = nr.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 1] = ng.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 2] = nb.round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

/// Spatial effect: `processor` reads any source pixel and returns the output
/// pixel for (x, y).
fn apply_spatial_effect<F>(flat: &RgbaImage, processor: F) -> RgbaImage
where
    F: Fn(&RgbaImage, u32, u32) -> Rgba<u8> + Sync,
{
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    if w == 0 || h == 0 {
        return flat.clone();
    }

    let stride = w * 4;
    let mut out = flat.clone();
    out.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let px = processor(flat, x as u32, y as u32);
            row_out[x * 4..x * 4 + 4].copy_from_slice(&px.0);
        }
    });
    out
}

#[inline]
fn sample_clamped(img: &RgbaImage, x: i32, y: i32) -> Rgba<u8> {
    let cx = x.clamp(0, img.width() as i32 - 1) as u32;
    let cy = y.clamp(0, img.height() as i32 - 1) as u32;
    *img.get_pixel(cx, cy)
}

/// Simple hash for deterministic noise.
#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(
        x.wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(seed),
    );
    (h & 0x00FFFFFF) as f32 / 16777216.0
}

#[inline]
fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn uniform(uniforms: &BTreeMap<String, f32>, key: &str, default: f32) -> f32 {
    uniforms
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Run the kernel for `primitive` over `input`. `seed` drives noise and the
/// scanline phase; pass the frame number for animated nodes and 0 otherwise.
/// Channel primitives return an unchanged copy.
pub fn render_primitive(
    primitive: Primitive,
    uniforms: &BTreeMap<String, f32>,
    input: &RgbaImage,
    seed: u32,
) -> RgbaImage {
    let amount = uniform(uniforms, "amount", 0.0);
    match primitive {
        Primitive::Saturation => saturation_core(input, amount),
        Primitive::HueRotate => hue_rotate_core(input, amount * 360.0),
        Primitive::Exposure => exposure_core(input, amount),
        Primitive::Gamma => gamma_core(input, amount),
        Primitive::FilmCurve => film_curve_core(input, amount),
        Primitive::TealOrange => teal_orange_core(input, amount),
        Primitive::Vignette => vignette_core(input, amount, uniform(uniforms, "softness", 1.0)),
        Primitive::ChromaticAberration => chromatic_aberration_core(input, amount),
        Primitive::Grain => grain_core(input, amount, seed),
        Primitive::Scanlines => scanlines_core(input, amount, seed),
        _ => input.clone(),
    }
}

// ============================================================================
// COLOR
// ============================================================================

/// `amount` -1 desaturates fully, 0 is identity, 1 doubles chroma.
pub fn saturation_core(flat: &RgbaImage, amount: f32) -> RgbaImage {
    let factor = 1.0 + amount.clamp(-1.0, 1.0);
    apply_per_pixel(flat, |_, _, r, g, b| {
        let l = luma(r, g, b);
        (l + (r - l) * factor, l + (g - l) * factor, l + (b - l) * factor)
    })
}

/// Luminance-preserving hue rotation.
pub fn hue_rotate_core(flat: &RgbaImage, degrees: f32) -> RgbaImage {
    let (s, c) = degrees.to_radians().sin_cos();
    let m = [
        [0.213 + 0.787 * c - 0.213 * s, 0.715 - 0.715 * c - 0.715 * s, 0.072 - 0.072 * c + 0.928 * s],
        [0.213 - 0.213 * c + 0.143 * s, 0.715 + 0.285 * c + 0.140 * s, 0.072 - 0.072 * c - 0.283 * s],
        [0.213 - 0.213 * c - 0.787 * s, 0.715 - 0.715 * c + 0.715 * s, 0.072 + 0.928 * c + 0.072 * s],
    ];
    apply_per_pixel(flat, move |_, _, r, g, b| {
        (
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
        )
    })
}

/// Multiply by `2^stops`.
pub fn exposure_core(flat: &RgbaImage, stops: f32) -> RgbaImage {
    let gain = 2f32.powf(stops);
    apply_per_pixel(flat, move |_, _, r, g, b| (r * gain, g * gain, b * gain))
}

/// Gamma lift: exponent `1 / (1 + amount)`, so positive amounts brighten
/// midtones. Built as a 256-entry LUT.
pub fn gamma_core(flat: &RgbaImage, amount: f32) -> RgbaImage {
    let inv_gamma = 1.0 / (1.0 + amount).max(0.01);
    let mut lut = [0f32; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i as f32 / 255.0).powf(inv_gamma) * 255.0;
    }
    apply_per_pixel(flat, move |_, _, r, g, b| (lut[r as usize], lut[g as usize], lut[b as usize]))
}

/// Smoothstep S-curve mixed in by `amount`.
pub fn film_curve_core(flat: &RgbaImage, amount: f32) -> RgbaImage {
    let t = amount.clamp(0.0, 1.0);
    let curve = move |v: f32| {
        let n = v / 255.0;
        lerp(n, n * n * (3.0 - 2.0 * n), t) * 255.0
    };
    apply_per_pixel(flat, move |_, _, r, g, b| (curve(r), curve(g), curve(b)))
}

/// Push shadows toward teal and highlights toward orange.
pub fn teal_orange_core(flat: &RgbaImage, amount: f32) -> RgbaImage {
    const TEAL: [f32; 3] = [0.0, 128.0, 128.0];
    const ORANGE: [f32; 3] = [255.0, 140.0, 0.0];
    let strength = amount.clamp(0.0, 1.0) * 0.35;
    apply_per_pixel(flat, move |_, _, r, g, b| {
        let l = luma(r, g, b) / 255.0;
        let tone = [
            lerp(TEAL[0], ORANGE[0], l),
            lerp(TEAL[1], ORANGE[1], l),
            lerp(TEAL[2], ORANGE[2], l),
        ];
        (lerp(r, tone[0], strength), lerp(g, tone[1], strength), lerp(b, tone[2], strength))
    })
}

// ============================================================================
// LENS
// ============================================================================

pub fn vignette_core(flat: &RgbaImage, amount: f32, softness: f32) -> RgbaImage {
    let w = flat.width() as f32;
    let h = flat.height() as f32;
    let cx = w / 2.0;
    let cy = h / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);
    let soft = softness.max(0.01);

    apply_per_pixel(flat, move |x, y, r, g, b| {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let dist = (dx * dx + dy * dy).sqrt() / max_dist;
        let vf = (1.0 - amount * (dist / soft).min(1.0).powf(2.0)).clamp(0.0, 1.0);
        (r * vf, g * vf, b * vf)
    })
}

/// Red sampled from the right, blue from the left, `round(amount * 4)` px.
pub fn chromatic_aberration_core(flat: &RgbaImage, amount: f32) -> RgbaImage {
    let offset = (amount.max(0.0) * 4.0).round() as i32;
    if offset == 0 {
        return flat.clone();
    }
    apply_spatial_effect(flat, move |img, x, y| {
        let (xi, yi) = (x as i32, y as i32);
        let center = img.get_pixel(x, y);
        let red = sample_clamped(img, xi + offset, yi);
        let blue = sample_clamped(img, xi - offset, yi);
        Rgba([red[0], center[1], blue[2], center[3]])
    })
}

// ============================================================================
// TEXTURE
// ============================================================================

/// Monochrome noise of up to `±amount * 40`.
pub fn grain_core(flat: &RgbaImage, amount: f32, seed: u32) -> RgbaImage {
    let strength = amount.max(0.0) * 40.0;
    if strength == 0.0 {
        return flat.clone();
    }
    apply_per_pixel(flat, move |x, y, r, g, b| {
        let n = (hash_f32(x, y, seed) * 2.0 - 1.0) * strength;
        (r + n, g + n, b + n)
    })
}

/// CRT scanlines: a fine sine darkening along y, phase-shifted by `seed`.
pub fn scanlines_core(flat: &RgbaImage, amount: f32, seed: u32) -> RgbaImage {
    let h = flat.height().max(1) as f32;
    let depth = amount.max(0.0) * 0.04 * 255.0;
    let phase = seed as f32 * 0.1;
    apply_per_pixel(flat, move |_, y, r, g, b| {
        let scan = ((y as f32 / h) * 1200.0 + phase).sin() * depth;
        (r - scan, g - scan, b - scan)
    })
}
