//! Translated frames: shifts a layer within frame space.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::CastResult;
use crate::frames::{ActionFrames, MultiFrameImage};
use crate::geometry::{Direction, Point, Rect, Size};
use crate::raster::PaintOp;

/// [`ActionFrames`] that draw another set of frames at an offset.
///
/// The origin is not moved, so the layer shifts relative to the character.
pub struct TranslatedFrames {
    inner: Arc<dyn ActionFrames>,
    offset: Point,
}

impl TranslatedFrames {
    pub fn new(inner: Arc<dyn ActionFrames>, offset: Point) -> Self {
        Self { inner, offset }
    }
}

impl ActionFrames for TranslatedFrames {
    fn orientations(&self) -> Vec<Direction> {
        self.inner.orientations()
    }

    fn frames(&self, orient: Direction) -> CastResult<Arc<dyn MultiFrameImage>> {
        Ok(Arc::new(TranslatedImage {
            inner: self.inner.frames(orient)?,
            offset: self.offset,
        }))
    }
}

struct TranslatedImage {
    inner: Arc<dyn MultiFrameImage>,
    offset: Point,
}

impl MultiFrameImage for TranslatedImage {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn frame_size(&self, index: usize) -> Size {
        self.inner.frame_size(index)
    }

    fn trimmed_bounds(&self, index: usize) -> Rect {
        self.inner
            .trimmed_bounds(index)
            .translate(self.offset.x, self.offset.y)
    }

    fn origin(&self, index: usize) -> Point {
        self.inner.origin(index)
    }

    fn paint_frame(&self, index: usize, dest: &mut RgbaImage, x: i32, y: i32, op: PaintOp) {
        self.inner
            .paint_frame(index, dest, x + self.offset.x, y + self.offset.y, op);
    }

    fn hit_test(&self, index: usize, x: i32, y: i32) -> bool {
        self.inner
            .hit_test(index, x - self.offset.x, y - self.offset.y)
    }
}
