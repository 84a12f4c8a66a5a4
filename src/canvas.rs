use image::{GrayImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Pixel grid the engine reads from and allocates into (RGBA8, row-major).
pub type PixelBuffer = RgbaImage;

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for engine operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Seed point lies outside the buffer.
    InvalidSeed { x: u32, y: u32, width: u32, height: u32 },
    /// A mask or raw byte buffer does not match the dimensions it is combined with.
    InvalidDimensions { expected: (u32, u32), actual: (u32, u32) },
    /// The mask has no set pixels. Only raised by callers that asked for it.
    EmptySelection,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidSeed { x, y, width, height } => write!(
                f,
                "Seed ({}, {}) is outside the {}x{} buffer",
                x, y, width, height
            ),
            EngineError::InvalidDimensions { expected, actual } => write!(
                f,
                "Dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            EngineError::EmptySelection => write!(f, "Selection is empty"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Wrap raw RGBA8 bytes into a buffer, checking `width * height * 4 == len`.
pub fn buffer_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<PixelBuffer, EngineError> {
    let expected_len = width as usize * height as usize * 4;
    if data.len() != expected_len {
        // Report the pixel count we actually got as a 1-row buffer.
        return Err(EngineError::InvalidDimensions {
            expected: (width, height),
            actual: ((data.len() / 4) as u32, 1),
        });
    }
    RgbaImage::from_raw(width, height, data).ok_or(EngineError::InvalidDimensions {
        expected: (width, height),
        actual: (0, 0),
    })
}

/// Fails with `InvalidDimensions` unless the mask covers the buffer exactly.
pub(crate) fn check_mask_dimensions(buffer: &PixelBuffer, mask: &GrayImage) -> Result<(), EngineError> {
    if buffer.dimensions() != mask.dimensions() {
        return Err(EngineError::InvalidDimensions {
            expected: buffer.dimensions(),
            actual: mask.dimensions(),
        });
    }
    Ok(())
}

// ============================================================================
// SELECTION SYSTEM
// ============================================================================

/// How a new magic wand region interacts with the existing mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Discard the existing selection, then set the new region.
    #[default]
    Replace,
    /// Union: add to the existing mask.
    Add,
    /// Difference: erase the region from the existing mask.
    Subtract,
    /// Keep only pixels present in both the existing mask AND the new region.
    Intersect,
}

impl SelectionMode {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionMode::Replace => "replace",
            SelectionMode::Add => "add",
            SelectionMode::Subtract => "subtract",
            SelectionMode::Intersect => "intersect",
        }
    }

    pub fn all() -> &'static [SelectionMode] {
        &[SelectionMode::Replace, SelectionMode::Add, SelectionMode::Subtract, SelectionMode::Intersect]
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|m| m.label() == label)
    }
}

/// Axis-aligned box in pixel coordinates. Zero-area means "nothing selected".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaskBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MaskBounds {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A binary segmentation mask (0 or 255 per pixel) with its tight bounds and
/// outline. Never mutated once built; every edit produces a new mask.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionMask {
    pub width: u32,
    pub height: u32,
    pub pixels: GrayImage,
    /// Flat indices (`y * width + x`) of set pixels touching an unset
    /// 4-neighbour or the image edge, in row-major order.
    pub border_indices: Vec<u32>,
    pub bounds: MaskBounds,
}

impl SelectionMask {
    /// Build a mask from a bitmap, deriving bounds and border.
    /// Any non-zero byte counts as selected and is normalised to 255.
    pub fn from_pixels(mut pixels: GrayImage) -> Self {
        for p in pixels.iter_mut() {
            if *p != 0 {
                *p = 255;
            }
        }
        let (width, height) = pixels.dimensions();
        let bounds = compute_mask_bounds(pixels.as_raw(), width, height);
        let border_indices = compute_border_indices(pixels.as_raw(), width, height, bounds);
        Self { width, height, pixels, border_indices, bounds }
    }

    /// A mask with nothing selected.
    pub fn empty(width: u32, height: u32) -> Self {
        Self::from_pixels(GrayImage::new(width, height))
    }

    /// Rebuild a mask from its exported one-byte-per-pixel bitmap.
    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Result<Self, EngineError> {
        let len = raw.len();
        let pixels = GrayImage::from_raw(width, height, raw).ok_or(EngineError::InvalidDimensions {
            expected: (width, height),
            actual: (len as u32, 1),
        })?;
        if len != width as usize * height as usize {
            return Err(EngineError::InvalidDimensions {
                expected: (width, height),
                actual: (len as u32, 1),
            });
        }
        Ok(Self::from_pixels(pixels))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels.get_pixel(x, y)[0] != 0
    }

    pub fn selected_count(&self) -> usize {
        self.pixels.as_raw().iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Treat an empty mask as `EmptySelection` for callers that need a region.
    pub fn require_non_empty(&self) -> Result<&Self, EngineError> {
        if self.is_empty() {
            Err(EngineError::EmptySelection)
        } else {
            Ok(self)
        }
    }

    /// Raw bitmap, the externally persisted representation.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Pixels set in both masks.
    pub fn intersect(&self, other: &SelectionMask) -> Result<SelectionMask, EngineError> {
        if self.dimensions() != other.dimensions() {
            return Err(EngineError::InvalidDimensions {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        let mut out = GrayImage::new(self.width, self.height);
        for ((dst, a), b) in out
            .iter_mut()
            .zip(self.pixels.as_raw())
            .zip(other.pixels.as_raw())
        {
            if *a != 0 && *b != 0 {
                *dst = 255;
            }
        }
        Ok(SelectionMask::from_pixels(out))
    }

    /// Mask with every pixel flipped.
    pub fn inverted(&self) -> SelectionMask {
        let mut out = self.pixels.clone();
        for p in out.iter_mut() {
            *p = if *p == 0 { 255 } else { 0 };
        }
        SelectionMask::from_pixels(out)
    }
}

/// Tight bounds of the non-zero bytes of a `w * h` bitmap.
pub fn compute_mask_bounds(mask_raw: &[u8], w: u32, h: u32) -> MaskBounds {
    let stride = w as usize;
    let mut min_x = w;
    let mut min_y = h;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut any = false;

    for y in 0..h {
        let row_offset = y as usize * stride;
        let row = &mask_raw[row_offset..row_offset + stride];
        let mut found_in_row = false;
        for (x_idx, &val) in row.iter().enumerate() {
            if val > 0 {
                let x = x_idx as u32;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                found_in_row = true;
            }
        }
        if found_in_row {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            any = true;
        }
    }

    if !any {
        return MaskBounds::default();
    }
    MaskBounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    }
}

/// Set pixels inside `bounds` that have an unset (or out-of-image) 4-neighbour.
pub fn compute_border_indices(mask_raw: &[u8], w: u32, h: u32, bounds: MaskBounds) -> Vec<u32> {
    if bounds.is_empty() {
        return Vec::new();
    }
    let wu = w as usize;
    let mut indices = Vec::new();
    for y in bounds.y..bounds.y + bounds.height {
        for x in bounds.x..bounds.x + bounds.width {
            let i = y as usize * wu + x as usize;
            if mask_raw[i] == 0 {
                continue;
            }
            let left = x > 0 && mask_raw[i - 1] != 0;
            let right = x + 1 < w && mask_raw[i + 1] != 0;
            let up = y > 0 && mask_raw[i - wu] != 0;
            let down = y + 1 < h && mask_raw[i + wu] != 0;
            if !(left && right && up && down) {
                indices.push(i as u32);
            }
        }
    }
    indices
}

// ============================================================================
// BLENDING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Screen,
    Multiply,
    Overlay,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[BlendMode::Normal, BlendMode::Screen, BlendMode::Multiply, BlendMode::Overlay]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Screen => "screen",
            BlendMode::Multiply => "multiply",
            BlendMode::Overlay => "overlay",
        }
    }

    /// Stable id for uniform upload.
    pub fn to_u8(&self) -> u8 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Screen => 1,
            BlendMode::Multiply => 2,
            BlendMode::Overlay => 3,
        }
    }

    /// Reconstruct from a u8 (defaults to Normal for unknown values)
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => BlendMode::Screen,
            2 => BlendMode::Multiply,
            3 => BlendMode::Overlay,
            _ => BlendMode::Normal,
        }
    }
}

/// Composite `top` over `base` with the given mode and opacity (0..1).
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if matches!(mode, BlendMode::Normal) && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_g * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_b * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}
