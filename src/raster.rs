//! Raster backend primitives.
//!
//! Everything the compositor needs from a 2D backend is expressed here:
//! painting one RGBA image onto another at an offset with a composite
//! operator, finding the opaque bounds of an image and hit-testing a pixel.

use image::{Rgba, RgbaImage};

use crate::geometry::Rect;

// ============================================================================
// PaintOp
// ============================================================================

/// Composite operator used when painting a source image onto a destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintOp {
    /// Standard source-over alpha blending.
    Over,
    /// Keeps destination pixels only where the source is opaque.
    ///
    /// Destination alpha is scaled by source alpha inside the source's
    /// footprint; pixels outside the footprint are left untouched.
    DestinationIn,
    /// Source-over with the source alpha scaled by a constant (0.0-1.0).
    AlphaOver(f32),
}

// ============================================================================
// Compositing
// ============================================================================

/// Paints `src` onto `dest` with its top-left corner at `(x, y)`.
///
/// Pixels falling outside the destination are clipped.
pub fn paint(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32, op: PaintOp) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;

    for sy in 0..src.height() {
        for sx in 0..src.width() {
            let dx = x + sx as i32;
            let dy = y + sy as i32;

            if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height {
                continue;
            }

            let src_pixel = *src.get_pixel(sx, sy);
            let dst_pixel = *dest.get_pixel(dx as u32, dy as u32);

            let out = match op {
                PaintOp::Over => alpha_blend(src_pixel, dst_pixel, 1.0),
                PaintOp::AlphaOver(alpha) => alpha_blend(src_pixel, dst_pixel, alpha.clamp(0.0, 1.0)),
                PaintOp::DestinationIn => destination_in(src_pixel, dst_pixel),
            };
            dest.put_pixel(dx as u32, dy as u32, out);
        }
    }
}

/// Alpha blends two RGBA pixels (source over destination), with the source
/// alpha scaled by `extra_alpha`.
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>, extra_alpha: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * extra_alpha;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

fn destination_in(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let a = (dst[3] as u32 * src[3] as u32 + 127) / 255;
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([dst[0], dst[1], dst[2], a as u8])
}

// ============================================================================
// Inspection
// ============================================================================

/// Returns the bounding box of all non-transparent pixels, or `None` if the
/// image is fully transparent.
pub fn opaque_bounds(img: &RgbaImage) -> Option<Rect> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| Rect::new(min_x as i32, min_y as i32, max_x - min_x + 1, max_y - min_y + 1))
}

/// Returns true if the pixel at `(x, y)` exists and is not fully transparent.
pub fn hit_test(img: &RgbaImage, x: i32, y: i32) -> bool {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return false;
    }
    img.get_pixel(x as u32, y as u32)[3] > 0
}

/// Estimated memory footprint of an RGBA8 raster in bytes.
pub fn estimated_memory_usage(img: &RgbaImage) -> usize {
    img.width() as usize * img.height() as usize * 4
}
