// ============================================================================
// CROP: crop-rectangle math and buffer cropping
// ============================================================================

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::canvas::{EngineError, PixelBuffer, SelectionMask};

/// Crop rectangle in image pixels. Fractional while being dragged around,
/// rounded when applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Starting rectangle: 80% of the image, inset 10% on each side.
pub fn default_for(image_width: u32, image_height: u32) -> CropRect {
    let w = image_width as f32;
    let h = image_height as f32;
    CropRect {
        x: w * 0.1,
        y: h * 0.1,
        width: w * 0.8,
        height: h * 0.8,
    }
}

/// Fit `rect` to `aspect` (width / height). Keeps the width and derives the
/// height; if that is taller than `max_height` the height is capped and the
/// width derived from it. The origin is then pulled back inside the image.
/// A non-finite or non-positive aspect returns `rect` unchanged.
pub fn apply_aspect(rect: CropRect, aspect: f32, max_width: f32, max_height: f32) -> CropRect {
    if !aspect.is_finite() || aspect <= 0.0 {
        return rect;
    }
    let mut width = rect.width;
    let mut height = width / aspect;
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }
    CropRect {
        x: rect.x.min(max_width - width).max(0.0),
        y: rect.y.min(max_height - height).max(0.0),
        width,
        height,
    }
}

/// Clamp the size to `[1, max]` and the origin so the rect fits.
pub fn clamp_rect(rect: CropRect, max_width: f32, max_height: f32) -> CropRect {
    let width = rect.width.min(max_width).max(1.0);
    let height = rect.height.min(max_height).max(1.0);
    CropRect {
        x: rect.x.min(max_width - width).max(0.0),
        y: rect.y.min(max_height - height).max(0.0),
        width,
        height,
    }
}

/// Cut `rect` (clamped to the buffer, rounded to whole pixels) out of
/// `buffer` into a new buffer.
pub fn crop_buffer(buffer: &PixelBuffer, rect: CropRect) -> Result<RgbaImage, EngineError> {
    let (bw, bh) = buffer.dimensions();
    if bw == 0 || bh == 0 {
        return Err(EngineError::InvalidDimensions { expected: (1, 1), actual: (bw, bh) });
    }
    let r = clamp_rect(rect, bw as f32, bh as f32);
    let x = (r.x.round() as u32).min(bw - 1);
    let y = (r.y.round() as u32).min(bh - 1);
    let w = (r.width.round() as u32).clamp(1, bw - x);
    let h = (r.height.round() as u32).clamp(1, bh - y);
    crate::log_info!("crop: {}x{} -> {}x{} at ({}, {})", bw, bh, w, h, x, y);
    Ok(image::imageops::crop_imm(buffer, x, y, w, h).to_image())
}

/// Crop `buffer` to the bounding box of the selection.
pub fn crop_to_selection(buffer: &PixelBuffer, mask: &SelectionMask) -> Result<RgbaImage, EngineError> {
    if buffer.dimensions() != mask.dimensions() {
        return Err(EngineError::InvalidDimensions {
            expected: buffer.dimensions(),
            actual: mask.dimensions(),
        });
    }
    let b = mask.require_non_empty()?.bounds;
    Ok(image::imageops::crop_imm(buffer, b.x, b.y, b.width, b.height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    #[test]
    fn default_rect_is_centered_eighty_percent() {
        assert_eq!(default_for(100, 50), CropRect::new(10.0, 5.0, 80.0, 40.0));
    }

    #[test]
    fn aspect_keeps_width_when_it_fits() {
        let r = apply_aspect(CropRect::new(10.0, 10.0, 80.0, 20.0), 2.0, 100.0, 100.0);
        assert_eq!(r, CropRect::new(10.0, 10.0, 80.0, 40.0));
    }

    #[test]
    fn aspect_shrinks_when_too_tall_and_pulls_origin_in() {
        let r = apply_aspect(CropRect::new(90.0, 30.0, 80.0, 10.0), 1.0, 200.0, 50.0);
        assert_eq!(r, CropRect::new(90.0, 0.0, 50.0, 50.0));
        let r = apply_aspect(CropRect::new(150.0, 0.0, 80.0, 10.0), 1.0, 200.0, 100.0);
        assert_eq!(r.x, 120.0);
    }

    #[test]
    fn invalid_aspect_is_a_no_op() {
        let rect = CropRect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(apply_aspect(rect, 0.0, 10.0, 10.0), rect);
        assert_eq!(apply_aspect(rect, -1.0, 10.0, 10.0), rect);
        assert_eq!(apply_aspect(rect, f32::NAN, 10.0, 10.0), rect);
        assert_eq!(apply_aspect(rect, f32::INFINITY, 10.0, 10.0), rect);
    }

    #[test]
    fn clamp_keeps_rect_inside() {
        let r = clamp_rect(CropRect::new(-5.0, 95.0, 500.0, 0.2), 100.0, 100.0);
        assert_eq!(r, CropRect::new(0.0, 95.0, 100.0, 1.0));
        let r = clamp_rect(CropRect::new(70.0, 70.0, 50.0, 50.0), 100.0, 100.0);
        assert_eq!(r, CropRect::new(50.0, 50.0, 50.0, 50.0));
    }

    #[test]
    fn crop_buffer_copies_region() {
        let img = RgbaImage::from_fn(10, 10, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let out = crop_buffer(&img, CropRect::new(2.4, 3.6, 4.0, 2.0)).unwrap();
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(*out.get_pixel(0, 0), Rgba([2, 4, 0, 255]));
    }

    #[test]
    fn crop_to_selection_uses_bounds() {
        let img = RgbaImage::from_fn(6, 6, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut m = GrayImage::new(6, 6);
        m.put_pixel(1, 2, Luma([255]));
        m.put_pixel(3, 4, Luma([255]));
        let mask = SelectionMask::from_pixels(m);
        let out = crop_to_selection(&img, &mask).unwrap();
        assert_eq!(out.dimensions(), (3, 3));
        assert_eq!(*out.get_pixel(0, 0), Rgba([1, 2, 0, 255]));
        let empty = SelectionMask::empty(6, 6);
        assert_eq!(crop_to_selection(&img, &empty), Err(EngineError::EmptySelection));
    }
}
