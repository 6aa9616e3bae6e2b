//! Animated frame abstractions.
//!
//! An [`ActionFrames`] is one layer's imagery for a single action, with a
//! [`MultiFrameImage`] per orientation. Frames live in *frame space*: the
//! trimmed bounds of a frame say where its pixels sit relative to the frame's
//! top-left corner, and the origin marks the point that is anchored to the
//! character's location when the frame is drawn.
//!
//! [`RasterFrames`] is the in-memory implementation fed by frame providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops;

use crate::component::ActionSequence;
use crate::error::{CastError, CastResult};
use crate::geometry::{Direction, Point, Rect, Size};
use crate::raster::{self, PaintOp};

// ============================================================================
// Traits
// ============================================================================

/// The animation frames for one orientation of an action.
pub trait MultiFrameImage: Send + Sync {
    /// Number of frames in the animation.
    fn frame_count(&self) -> usize;

    /// Full (untrimmed) size of the frame at `index`.
    fn frame_size(&self, index: usize) -> Size;

    /// Region of frame space holding the frame's pixels.
    fn trimmed_bounds(&self, index: usize) -> Rect;

    /// Anchor point of the frame in frame space.
    fn origin(&self, index: usize) -> Point;

    /// Paints the frame so that frame space `(0, 0)` lands on `(x, y)` in `dest`.
    fn paint_frame(&self, index: usize, dest: &mut RgbaImage, x: i32, y: i32, op: PaintOp);

    /// Returns true if the frame has an opaque pixel at frame space `(x, y)`.
    fn hit_test(&self, index: usize, x: i32, y: i32) -> bool;

    /// Bytes of raster data held by this image.
    ///
    /// Images that render on demand hold nothing and report zero.
    fn estimated_memory_usage(&self) -> usize {
        0
    }
}

/// A layer's imagery for one action, across all orientations.
///
/// Implementations are immutable. Recoloring and translating produce new
/// `ActionFrames` wrapping the original (see [`crate::layer`]).
pub trait ActionFrames: Send + Sync {
    /// Orientations for which frames exist.
    fn orientations(&self) -> Vec<Direction>;

    /// Returns the frames for an orientation.
    ///
    /// Fails with [`CastError::Composition`] if the orientation is missing or
    /// the frames cannot be rendered.
    fn frames(&self, orient: Direction) -> CastResult<Arc<dyn MultiFrameImage>>;
}

// ============================================================================
// SourceFrame
// ============================================================================

/// A single decoded frame, trimmed to its opaque pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFrame {
    /// Trimmed pixel data.
    pub image: RgbaImage,
    /// Where `image` sits in frame space.
    pub bounds: Rect,
    /// Size of the frame before trimming.
    pub size: Size,
    pub origin: Point,
}

impl SourceFrame {
    /// Creates a frame from a full image, trimming transparent borders.
    pub fn new(full: &RgbaImage, origin: Point) -> Self {
        let size = Size::new(full.width(), full.height());
        match raster::opaque_bounds(full) {
            Some(bounds) => {
                let image = imageops::crop_imm(
                    full,
                    bounds.x as u32,
                    bounds.y as u32,
                    bounds.width,
                    bounds.height,
                )
                .to_image();
                Self {
                    image,
                    bounds,
                    size,
                    origin,
                }
            }
            None => Self {
                image: RgbaImage::new(0, 0),
                bounds: Rect::default(),
                size,
                origin,
            },
        }
    }

    /// Creates a frame whose pixels cover the whole frame, without trimming.
    pub fn untrimmed(image: RgbaImage, origin: Point) -> Self {
        let bounds = Rect::from_size(image.width(), image.height());
        Self {
            size: bounds.size(),
            image,
            bounds,
            origin,
        }
    }
}

// ============================================================================
// RasterFrames
// ============================================================================

/// The frames of one orientation held in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStrip {
    frames: Vec<SourceFrame>,
}

impl FrameStrip {
    pub fn new(frames: Vec<SourceFrame>) -> Self {
        Self { frames }
    }

    pub fn frame(&self, index: usize) -> &SourceFrame {
        &self.frames[index]
    }
}

impl MultiFrameImage for FrameStrip {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_size(&self, index: usize) -> Size {
        self.frames[index].size
    }

    fn trimmed_bounds(&self, index: usize) -> Rect {
        self.frames[index].bounds
    }

    fn origin(&self, index: usize) -> Point {
        self.frames[index].origin
    }

    fn paint_frame(&self, index: usize, dest: &mut RgbaImage, x: i32, y: i32, op: PaintOp) {
        let frame = &self.frames[index];
        raster::paint(dest, &frame.image, x + frame.bounds.x, y + frame.bounds.y, op);
    }

    fn hit_test(&self, index: usize, x: i32, y: i32) -> bool {
        let frame = &self.frames[index];
        raster::hit_test(&frame.image, x - frame.bounds.x, y - frame.bounds.y)
    }

    fn estimated_memory_usage(&self) -> usize {
        self.frames
            .iter()
            .map(|f| raster::estimated_memory_usage(&f.image))
            .sum()
    }
}

/// In-memory [`ActionFrames`] built from decoded images.
#[derive(Debug, Clone, Default)]
pub struct RasterFrames {
    orients: BTreeMap<Direction, Arc<FrameStrip>>,
}

impl RasterFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the frames for an orientation.
    pub fn with_orientation(mut self, orient: Direction, frames: Vec<SourceFrame>) -> Self {
        self.orients.insert(orient, Arc::new(FrameStrip::new(frames)));
        self
    }

    /// Slices a sprite sheet into frames for every orientation of `seq`.
    ///
    /// Tiles are read left to right, top to bottom. The sheet holds all
    /// frames of the first orientation in `seq.orients`, then all frames of
    /// the second, and so on. Every frame is anchored at `seq.origin`.
    pub fn from_strip(sheet: &RgbaImage, seq: &ActionSequence, tile: Size) -> CastResult<Self> {
        if tile.width == 0 || tile.height == 0 {
            return Err(CastError::composition(format!(
                "sprite strip for '{}' has zero-sized tiles",
                seq.name
            )));
        }
        let per_row = sheet.width() / tile.width;
        let rows = sheet.height() / tile.height;
        let tile_count = (per_row * rows) as usize;
        let orient_count = seq.orients.len();
        if orient_count == 0 || tile_count < orient_count {
            return Err(CastError::composition(format!(
                "sprite strip for '{}' has {} tiles for {} orientations",
                seq.name, tile_count, orient_count
            )));
        }

        let frame_count = tile_count / orient_count;
        let mut frames = Self::new();
        for (oidx, orient) in seq.orients.iter().enumerate() {
            let strip = (0..frame_count)
                .map(|fidx| {
                    let tidx = (oidx * frame_count + fidx) as u32;
                    let tx = (tidx % per_row) * tile.width;
                    let ty = (tidx / per_row) * tile.height;
                    let tile_img =
                        imageops::crop_imm(sheet, tx, ty, tile.width, tile.height).to_image();
                    SourceFrame::new(&tile_img, seq.origin)
                })
                .collect();
            frames = frames.with_orientation(*orient, strip);
        }
        Ok(frames)
    }
}

impl ActionFrames for RasterFrames {
    fn orientations(&self) -> Vec<Direction> {
        self.orients.keys().copied().collect()
    }

    fn frames(&self, orient: Direction) -> CastResult<Arc<dyn MultiFrameImage>> {
        self.orients
            .get(&orient)
            .map(|strip| strip.clone() as Arc<dyn MultiFrameImage>)
            .ok_or_else(|| CastError::composition(format!("no frames for orientation {orient:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn dot_image(w: u32, h: u32, x: u32, y: u32) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        img.put_pixel(x, y, Rgba([200, 10, 10, 255]));
        img
    }

    #[test]
    fn source_frame_trims_transparent_border() {
        let frame = SourceFrame::new(&dot_image(16, 16, 4, 9), Point::new(8, 15));
        assert_eq!(frame.bounds, Rect::new(4, 9, 1, 1));
        assert_eq!(frame.size, Size::new(16, 16));
        assert_eq!(frame.image.dimensions(), (1, 1));
    }

    #[test]
    fn empty_frame_has_empty_bounds() {
        let frame = SourceFrame::new(&RgbaImage::new(8, 8), Point::default());
        assert!(frame.bounds.is_empty());
        assert_eq!(frame.size, Size::new(8, 8));
    }

    #[test]
    fn strip_paints_at_trimmed_position() {
        let strip = FrameStrip::new(vec![SourceFrame::new(&dot_image(8, 8, 2, 3), Point::default())]);
        let mut dest = RgbaImage::new(8, 8);
        strip.paint_frame(0, &mut dest, 1, 1, PaintOp::Over);

        assert_eq!(dest.get_pixel(3, 4)[3], 255);
        assert!(strip.hit_test(0, 2, 3));
        assert!(!strip.hit_test(0, 0, 0));
    }

    #[test]
    fn from_strip_slices_orientation_major() {
        let seq = ActionSequence::new("walking", 8.0, Point::new(4, 8), vec![Direction::South, Direction::North]);
        // 4 tiles of 8x8 in one row: two frames for each orientation.
        let mut sheet = RgbaImage::new(32, 8);
        for tile in 0..4u32 {
            sheet.put_pixel(tile * 8 + tile, 0, Rgba([1, 2, 3, 255]));
        }

        let frames = RasterFrames::from_strip(&sheet, &seq, Size::new(8, 8)).unwrap();
        assert_eq!(frames.orientations(), vec![Direction::North, Direction::South]);

        let south = frames.frames(Direction::South).unwrap();
        assert_eq!(south.frame_count(), 2);
        assert_eq!(south.trimmed_bounds(1), Rect::new(1, 0, 1, 1));

        let north = frames.frames(Direction::North).unwrap();
        assert_eq!(north.trimmed_bounds(0), Rect::new(2, 0, 1, 1));
        assert_eq!(north.origin(0), Point::new(4, 8));

        assert!(frames.frames(Direction::East).is_err());
    }

    #[test]
    fn from_strip_rejects_undersized_sheet() {
        let seq = ActionSequence::new("standing", 1.0, Point::default(), Direction::ALL.to_vec());
        let sheet = RgbaImage::new(16, 8);
        assert!(RasterFrames::from_strip(&sheet, &seq, Size::new(8, 8)).is_err());
    }
}
