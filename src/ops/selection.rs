// ============================================================================
// MAGIC WAND: region-growing selection from a seed pixel
// ============================================================================
//
// Breadth-first flood over 4-connected neighbours. A pixel joins the region
// when its color distance to the seed is within the metric's threshold and,
// with gradient awareness on, when it does not sit on a strong local edge.
// Each call allocates its own visited bitmap and output mask; settings are
// passed in as a snapshot, never read from shared state.
// ============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::canvas::{EngineError, PixelBuffer, SelectionMask, SelectionMode};
use crate::ops::color_metric::{lab_distance, rgb_distance, rgb_to_lab, ColorMetric};

/// Base gradient magnitude above which a pixel counts as an edge.
const GRADIENT_BASE: f32 = 18.0;
/// Extra gradient headroom granted at `edge_smoothness = 1`.
const GRADIENT_SMOOTHNESS_RANGE: f32 = 60.0;
/// Feathered pixels survive when their box average (0..255) exceeds this.
const FEATHER_KEEP_LEVEL: u64 = 110;

/// Magic wand tuning. Immutable value: the `with_*` helpers return a copy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MagicWandSettings {
    /// Color tolerance in [0, 1].
    pub sensitivity: f32,
    /// Box-feather radius in pixels (rounded), 0 = off.
    pub feather_radius: f32,
    /// Raises the edge threshold when gradient awareness is on, in [0, 1].
    pub edge_smoothness: f32,
    pub color_metric: ColorMetric,
    pub gradient_aware: bool,
    pub mode: SelectionMode,
}

impl Default for MagicWandSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.125,
            feather_radius: 0.0,
            edge_smoothness: 0.35,
            color_metric: ColorMetric::Rgb,
            gradient_aware: false,
            mode: SelectionMode::Replace,
        }
    }
}

impl MagicWandSettings {
    pub fn with_sensitivity(self, sensitivity: f32) -> Self {
        Self { sensitivity: sensitivity.clamp(0.0, 1.0), ..self }
    }

    pub fn with_feather_radius(self, feather_radius: f32) -> Self {
        Self { feather_radius: feather_radius.max(0.0), ..self }
    }

    pub fn with_edge_smoothness(self, edge_smoothness: f32) -> Self {
        Self { edge_smoothness: edge_smoothness.clamp(0.0, 1.0), ..self }
    }

    pub fn with_color_metric(self, color_metric: ColorMetric) -> Self {
        Self { color_metric, ..self }
    }

    pub fn with_gradient_aware(self, gradient_aware: bool) -> Self {
        Self { gradient_aware, ..self }
    }

    pub fn with_mode(self, mode: SelectionMode) -> Self {
        Self { mode, ..self }
    }

    /// Gradient magnitude above which a pixel is rejected.
    pub fn gradient_threshold(&self) -> f32 {
        GRADIENT_BASE + self.edge_smoothness * GRADIENT_SMOOTHNESS_RANGE
    }
}

/// Holds the current wand settings between clicks. Holds no image data.
#[derive(Clone, Debug, Default)]
pub struct SelectionEngine {
    settings: MagicWandSettings,
}

impl SelectionEngine {
    pub fn new(settings: MagicWandSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MagicWandSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: MagicWandSettings) -> &MagicWandSettings {
        self.settings = settings;
        &self.settings
    }

    pub fn select(
        &self,
        buffer: &PixelBuffer,
        seed_x: u32,
        seed_y: u32,
        previous: Option<&SelectionMask>,
        subtract: bool,
    ) -> Result<SelectionMask, EngineError> {
        select_region(buffer, seed_x, seed_y, &self.settings, previous, subtract)
    }

    pub fn select_with_mode(
        &self,
        buffer: &PixelBuffer,
        seed_x: u32,
        seed_y: u32,
        previous: Option<&SelectionMask>,
    ) -> Result<SelectionMask, EngineError> {
        select_with_mode(buffer, seed_x, seed_y, &self.settings, previous)
    }
}

/// Combine a fresh wand region with `previous` according to `settings.mode`.
pub fn select_with_mode(
    buffer: &PixelBuffer,
    seed_x: u32,
    seed_y: u32,
    settings: &MagicWandSettings,
    previous: Option<&SelectionMask>,
) -> Result<SelectionMask, EngineError> {
    match settings.mode {
        SelectionMode::Replace => select_region(buffer, seed_x, seed_y, settings, None, false),
        SelectionMode::Add => select_region(buffer, seed_x, seed_y, settings, previous, false),
        SelectionMode::Subtract => select_region(buffer, seed_x, seed_y, settings, previous, true),
        SelectionMode::Intersect => {
            let fresh = select_region(buffer, seed_x, seed_y, settings, None, false)?;
            match previous {
                Some(base) => base.intersect(&fresh),
                None => Ok(SelectionMask::empty(buffer.width(), buffer.height())),
            }
        }
    }
}

/// Grow a region from `(seed_x, seed_y)`.
///
/// The output starts as a copy of `previous` (or empty). Accepted pixels are
/// written as 255, or as 0 when `subtract` is set; the flood keeps expanding
/// through accepted pixels either way.
pub fn select_region(
    buffer: &PixelBuffer,
    seed_x: u32,
    seed_y: u32,
    settings: &MagicWandSettings,
    previous: Option<&SelectionMask>,
    subtract: bool,
) -> Result<SelectionMask, EngineError> {
    let (w, h) = buffer.dimensions();
    if seed_x >= w || seed_y >= h {
        crate::log_warn!("magic wand: seed ({}, {}) outside {}x{}", seed_x, seed_y, w, h);
        return Err(EngineError::InvalidSeed { x: seed_x, y: seed_y, width: w, height: h });
    }
    if let Some(prev) = previous
        && prev.dimensions() != (w, h)
    {
        return Err(EngineError::InvalidDimensions {
            expected: (w, h),
            actual: prev.dimensions(),
        });
    }

    let wu = w as usize;
    let hu = h as usize;
    let raw = buffer.as_raw();

    let mut out: Vec<u8> = match previous {
        Some(prev) => prev.as_raw().to_vec(),
        None => vec![0; wu * hu],
    };
    let mut visited = vec![false; wu * hu];

    let seed_idx = seed_y as usize * wu + seed_x as usize;
    let seed = rgb_at(raw, seed_idx);
    let seed_lab = rgb_to_lab(seed[0], seed[1], seed[2]);
    let metric = settings.color_metric;
    let threshold = metric.threshold(settings.sensitivity);
    let gradient_threshold = settings.gradient_threshold();
    let fill = if subtract { 0u8 } else { 255u8 };

    let mut accepted = 0usize;
    let mut queue: VecDeque<u32> = VecDeque::with_capacity(4096);
    queue.push_back(seed_idx as u32);

    while let Some(idx) = queue.pop_front() {
        let i = idx as usize;
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let x = i % wu;
        let y = i / wu;
        let c = rgb_at(raw, i);
        let dist = match metric {
            ColorMetric::Rgb => rgb_distance(seed, c),
            ColorMetric::Lab => lab_distance(seed_lab, rgb_to_lab(c[0], c[1], c[2])),
        };
        if dist > threshold {
            continue;
        }
        if settings.gradient_aware && local_gradient(raw, wu, hu, x, y) > gradient_threshold {
            continue;
        }

        out[i] = fill;
        accepted += 1;

        if x + 1 < wu && !visited[i + 1] {
            queue.push_back((i + 1) as u32);
        }
        if x > 0 && !visited[i - 1] {
            queue.push_back((i - 1) as u32);
        }
        if y + 1 < hu && !visited[i + wu] {
            queue.push_back((i + wu) as u32);
        }
        if y > 0 && !visited[i - wu] {
            queue.push_back((i - wu) as u32);
        }
    }

    if settings.feather_radius > 0.0 {
        feather(&mut out, wu, hu, settings.feather_radius.round() as usize);
    }

    let pixels = image::GrayImage::from_raw(w, h, out).ok_or(EngineError::InvalidDimensions {
        expected: (w, h),
        actual: (0, 0),
    })?;
    let result = SelectionMask::from_pixels(pixels);
    crate::log_info!(
        "magic wand: seed ({}, {}) metric={} sensitivity={:.3} {} {} px, bounds {:?}",
        seed_x,
        seed_y,
        metric.name(),
        settings.sensitivity,
        if subtract { "erased" } else { "grew" },
        accepted,
        result.bounds
    );
    Ok(result)
}

#[inline]
fn rgb_at(raw: &[u8], idx: usize) -> [u8; 3] {
    let o = idx * 4;
    [raw[o], raw[o + 1], raw[o + 2]]
}

/// Mean RGB distance to the right and lower neighbours (clamped at the edge).
fn local_gradient(raw: &[u8], w: usize, h: usize, x: usize, y: usize) -> f32 {
    let sx = (x + 1).min(w - 1);
    let sy = (y + 1).min(h - 1);
    let c = rgb_at(raw, y * w + x);
    let dx = rgb_distance(c, rgb_at(raw, y * w + sx));
    let dy = rgb_distance(c, rgb_at(raw, sy * w + x));
    (dx + dy) / 2.0
}

/// Box-average every set pixel over a `(2r+1)²` window clipped to the image
/// and keep it only if the average is above the midpoint threshold.
/// Unset pixels stay unset. Uses a summed-area table of the unfeathered mask.
fn feather(mask: &mut [u8], w: usize, h: usize, radius: usize) {
    let sw = w + 1;
    let mut sat = vec![0u32; sw * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u32;
        for x in 0..w {
            row_sum += (mask[y * w + x] != 0) as u32;
            sat[(y + 1) * sw + x + 1] = sat[y * sw + x + 1] + row_sum;
        }
    }

    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(h - 1);
        for x in 0..w {
            let i = y * w + x;
            if mask[i] == 0 {
                continue;
            }
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(w - 1);
            let set = sat[(y1 + 1) * sw + x1 + 1] + sat[y0 * sw + x0]
                - sat[y0 * sw + x1 + 1]
                - sat[(y1 + 1) * sw + x0];
            let count = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
            mask[i] = if 255 * set as u64 > FEATHER_KEEP_LEVEL * count { 255 } else { 0 };
        }
    }
}
