//! Colorization: HSV range recoloring of layer frames.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbaImage;
use palette::{Hsv, IntoColor, RgbHue, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::CastResult;
use crate::frames::{ActionFrames, MultiFrameImage};
use crate::geometry::{Direction, Point, Rect, Size};
use crate::raster::{self, PaintOp};

// ============================================================================
// Colorization
// ============================================================================

/// A recoloring rule.
///
/// Pixels whose HSV color lies within `range` of `root` are shifted by
/// `offsets`; all other pixels are left alone. This lets one sprite carry
/// several independently recolorable regions (skin, primary cloth, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct Colorization {
    /// The RGB color the recolorable region was authored in.
    pub root: [u8; 3],

    /// Tolerance around the root: hue in degrees, saturation and value in 0.0-1.0.
    pub range: [f32; 3],

    /// Shift applied to matching pixels: hue in degrees, saturation and value in -1.0-1.0.
    pub offsets: [f32; 3],
}

impl Colorization {
    pub fn new(root: [u8; 3], range: [f32; 3], offsets: [f32; 3]) -> Self {
        Self {
            root,
            range,
            offsets,
        }
    }

    fn root_hsv(&self) -> Hsv {
        to_hsv(self.root)
    }

    /// Returns true if the color lies within range of the root color.
    pub fn matches(&self, rgb: [u8; 3]) -> bool {
        let root = self.root_hsv();
        let hsv = to_hsv(rgb);
        let hue_dist = (hsv.hue.into_positive_degrees() - root.hue.into_positive_degrees())
            .rem_euclid(360.0);
        let hue_dist = hue_dist.min(360.0 - hue_dist);
        hue_dist <= self.range[0]
            && (hsv.saturation - root.saturation).abs() <= self.range[1]
            && (hsv.value - root.value).abs() <= self.range[2]
    }

    /// Applies the offsets to a color, regardless of whether it matches.
    pub fn shift(&self, rgb: [u8; 3]) -> [u8; 3] {
        let mut hsv = to_hsv(rgb);
        hsv.hue = RgbHue::from_degrees(hsv.hue.into_positive_degrees() + self.offsets[0]);
        hsv.saturation = (hsv.saturation + self.offsets[1]).clamp(0.0, 1.0);
        hsv.value = (hsv.value + self.offsets[2]).clamp(0.0, 1.0);
        let shifted: Srgb = hsv.into_color();
        [
            (shifted.red * 255.0).round() as u8,
            (shifted.green * 255.0).round() as u8,
            (shifted.blue * 255.0).round() as u8,
        ]
    }

    fn bits(&self) -> ([u8; 3], [u32; 3], [u32; 3]) {
        (
            self.root,
            self.range.map(f32::to_bits),
            self.offsets.map(f32::to_bits),
        )
    }
}

// Compared bitwise so colorizations can key caches.
impl PartialEq for Colorization {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Colorization {}

impl Hash for Colorization {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

fn to_hsv(rgb: [u8; 3]) -> Hsv {
    let srgb = Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    );
    srgb.into_color()
}

/// Recolors every visible pixel using the first matching colorization.
pub fn apply_colorizations(img: &RgbaImage, zations: &[Colorization]) -> RgbaImage {
    let mut result = img.clone();

    for pixel in result.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        if let Some(zation) = zations.iter().find(|z| z.matches([r, g, b])) {
            let [nr, ng, nb] = zation.shift([r, g, b]);
            pixel.0 = [nr, ng, nb, a];
        }
    }

    result
}

// ============================================================================
// Recolored frames
// ============================================================================

/// [`ActionFrames`] that recolor another set of frames as they are painted.
pub struct RecoloredFrames {
    inner: Arc<dyn ActionFrames>,
    zations: Arc<[Colorization]>,
}

impl RecoloredFrames {
    pub fn new(inner: Arc<dyn ActionFrames>, zations: &[Colorization]) -> Self {
        Self {
            inner,
            zations: zations.into(),
        }
    }
}

impl ActionFrames for RecoloredFrames {
    fn orientations(&self) -> Vec<Direction> {
        self.inner.orientations()
    }

    fn frames(&self, orient: Direction) -> CastResult<Arc<dyn MultiFrameImage>> {
        Ok(Arc::new(RecoloredImage {
            inner: self.inner.frames(orient)?,
            zations: self.zations.clone(),
        }))
    }
}

struct RecoloredImage {
    inner: Arc<dyn MultiFrameImage>,
    zations: Arc<[Colorization]>,
}

impl MultiFrameImage for RecoloredImage {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn frame_size(&self, index: usize) -> Size {
        self.inner.frame_size(index)
    }

    fn trimmed_bounds(&self, index: usize) -> Rect {
        self.inner.trimmed_bounds(index)
    }

    fn origin(&self, index: usize) -> Point {
        self.inner.origin(index)
    }

    fn paint_frame(&self, index: usize, dest: &mut RgbaImage, x: i32, y: i32, op: PaintOp) {
        let bounds = self.inner.trimmed_bounds(index);
        if bounds.is_empty() {
            return;
        }
        let mut scratch = RgbaImage::new(bounds.width, bounds.height);
        self.inner
            .paint_frame(index, &mut scratch, -bounds.x, -bounds.y, PaintOp::Over);
        let recolored = apply_colorizations(&scratch, &self.zations);
        raster::paint(dest, &recolored, x + bounds.x, y + bounds.y, op);
    }

    fn hit_test(&self, index: usize, x: i32, y: i32) -> bool {
        // Recoloring never changes alpha.
        self.inner.hit_test(index, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{RasterFrames, SourceFrame};
    use image::Rgba;

    fn red_to_green() -> Colorization {
        Colorization::new([255, 0, 0], [20.0, 0.2, 0.2], [120.0, 0.0, 0.0])
    }

    #[test]
    fn matching_pixels_are_shifted() {
        let zation = red_to_green();
        assert!(zation.matches([250, 5, 5]));
        assert!(!zation.matches([0, 0, 255]));

        let shifted = zation.shift([255, 0, 0]);
        assert!(shifted[1] > shifted[0], "Green should dominate after 120° shift");
    }

    #[test]
    fn non_matching_pixels_are_untouched() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));

        let out = apply_colorizations(&img, &[red_to_green()]);

        assert!(out.get_pixel(0, 0)[1] > 200);
        assert_eq!(out.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn hue_distance_wraps_around() {
        let zation = Colorization::new([255, 0, 8], [10.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        // Root hue is just below 360°, red at 0° is within 10°.
        assert!(zation.matches([255, 0, 0]));
    }

    #[test]
    fn equal_colorizations_hash_equal() {
        use std::collections::HashSet;
        let set: HashSet<_> = [red_to_green(), red_to_green()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn recolored_frames_leave_source_untouched() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let base: Arc<dyn ActionFrames> = Arc::new(
            RasterFrames::new()
                .with_orientation(Direction::South, vec![SourceFrame::untrimmed(src, Point::default())]),
        );
        let recolored = RecoloredFrames::new(base.clone(), &[red_to_green()]);

        let mut painted = RgbaImage::new(2, 2);
        recolored
            .frames(Direction::South)
            .unwrap()
            .paint_frame(0, &mut painted, 0, 0, PaintOp::Over);
        assert!(painted.get_pixel(0, 0)[1] > 200);

        let mut original = RgbaImage::new(2, 2);
        base.frames(Direction::South)
            .unwrap()
            .paint_frame(0, &mut original, 0, 0, PaintOp::Over);
        assert_eq!(original.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
