//! Orientation compositor.
//!
//! A [`CompositedFrames`] is a fixed list of [`Layer`]s plus a
//! [`CompositeMode`]. It holds no pixels of its own: asking it for the frames
//! of an orientation renders that orientation into a [`RenderedFrameSet`] and
//! memoizes the result in the shared pixel cache under a [`CompositeKey`].
//!
//! # Modes
//!
//! - **Base**: every layer is painted, lowest render priority first, into a
//!   raster covering the union of the layers' bounds.
//! - **Mask**: the first layer is clipped by the remaining (donor) layers
//!   using destination-in. The raster covers the intersection of the bounds
//!   and the primary layer's size and origin are kept.
//! - **Shadow**: like base, but the union is re-rendered on every paint and
//!   drawn with the shadow's opacity. Shadow frames never enter the pixel
//!   cache.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::cache::SharedCache;
use crate::error::{CastError, CastResult};
use crate::frames::{ActionFrames, FrameStrip, MultiFrameImage, SourceFrame};
use crate::geometry::{Direction, Point, Rect, Size};
use crate::layer::{FramesKey, Layer};
use crate::raster::{self, PaintOp};

/// Rendered frames for one orientation of a composite.
///
/// Every frame is a trimmed raster; its memory estimate is the pixel cache
/// weight.
pub type RenderedFrameSet = FrameStrip;

/// Cache of rendered orientations shared by every composite of a manager.
pub type PixelCache = SharedCache<CompositeKey, Arc<RenderedFrameSet>>;

// ============================================================================
// CompositeMode
// ============================================================================

/// How a composite combines its layers.
#[derive(Debug, Clone, Copy)]
pub enum CompositeMode {
    Base,
    Mask,
    /// Shadow union painted at a fixed opacity (0.0-1.0).
    Shadow { alpha: f32 },
}

impl CompositeMode {
    fn bits(&self) -> (u8, u32) {
        match self {
            CompositeMode::Base => (0, 0),
            CompositeMode::Mask => (1, 0),
            CompositeMode::Shadow { alpha } => (2, alpha.to_bits()),
        }
    }
}

impl PartialEq for CompositeMode {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for CompositeMode {}

impl Hash for CompositeMode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Pixel cache key: what was composited, and for which orientation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub frames: FramesKey,
    pub orientation: Direction,
}

// ============================================================================
// CompositedFrames
// ============================================================================

/// Layers composited into a single [`ActionFrames`].
///
/// The recipe a [`crate::CharacterManager`] hands out is a base-mode
/// composite; masked and shadow layers inside it are composites themselves.
pub struct CompositedFrames {
    mode: CompositeMode,
    action: String,
    layers: Vec<Layer>,
    key: FramesKey,
    pixels: Arc<PixelCache>,
}

impl CompositedFrames {
    /// Creates a composite of `layers`. The first layer is the primary one.
    ///
    /// Fails with [`CastError::Composition`] if `layers` is empty.
    pub fn new(
        mode: CompositeMode,
        action: impl Into<String>,
        layers: Vec<Layer>,
        pixels: Arc<PixelCache>,
    ) -> CastResult<Self> {
        let action = action.into();
        if layers.is_empty() {
            return Err(CastError::composition(format!(
                "cannot composite '{action}' from zero layers"
            )));
        }
        let key = FramesKey::Composite {
            mode,
            action: action.clone(),
            sources: layers.iter().map(|l| l.key.clone()).collect(),
        };
        Ok(Self {
            mode,
            action,
            layers,
            key,
            pixels,
        })
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// The layers in recipe order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn key(&self) -> &FramesKey {
        &self.key
    }

    pub fn composite_key(&self, orient: Direction) -> CompositeKey {
        CompositeKey {
            frames: self.key.clone(),
            orientation: orient,
        }
    }

    /// Renders the still frames for an orientation.
    ///
    /// Base and mask composites are rendered once and then served from the
    /// pixel cache. A shadow composite renders its unblended union afresh on
    /// every call.
    pub fn realize(&self, orient: Direction) -> CastResult<Arc<RenderedFrameSet>> {
        if let CompositeMode::Shadow { .. } = self.mode {
            return self.render(orient).map(Arc::new);
        }
        self.pixels.get_or_try_insert_with(
            &self.composite_key(orient),
            || self.render(orient).map(Arc::new),
            |set| set.estimated_memory_usage(),
        )
    }

    fn render(&self, orient: Direction) -> CastResult<RenderedFrameSet> {
        debug!(
            action = %self.action,
            ?orient,
            mode = ?self.mode,
            layers = self.layers.len(),
            "compositing frames"
        );
        let sources = self.sources(orient)?;
        let count = sources[0].frame_count();
        let frames: Vec<SourceFrame> = match self.mode {
            CompositeMode::Mask => (0..count).map(|i| render_masked(&sources, i)).collect(),
            CompositeMode::Base | CompositeMode::Shadow { .. } => {
                let order = self.paint_order(orient);
                (0..count)
                    .map(|i| render_union(&sources, &order, i))
                    .collect()
            }
        };
        Ok(FrameStrip::new(frames))
    }

    /// Every layer's frames for `orient`, in recipe order.
    fn sources(&self, orient: Direction) -> CastResult<Vec<Arc<dyn MultiFrameImage>>> {
        let mut sources: Vec<Arc<dyn MultiFrameImage>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let frames = layer.frames.frames(orient).map_err(|err| {
                CastError::composition(format!(
                    "layer {layer} cannot provide '{}' frames for {orient:?}: {err}",
                    self.action
                ))
            })?;
            if let Some(primary) = sources.first()
                && frames.frame_count() < primary.frame_count()
            {
                return Err(CastError::composition(format!(
                    "layer {layer} has {} frames for '{}' {orient:?}, expected {}",
                    frames.frame_count(),
                    self.action,
                    primary.frame_count()
                )));
            }
            sources.push(frames);
        }
        Ok(sources)
    }

    /// Layer indices in paint order: ascending priority, ties in recipe order.
    fn paint_order(&self, orient: Direction) -> Vec<usize> {
        let mut order: Vec<(i32, usize)> = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (layer.render_priority(&self.action, orient), i))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, i)| i).collect()
    }
}

impl ActionFrames for CompositedFrames {
    fn orientations(&self) -> Vec<Direction> {
        self.layers[0].frames.orientations()
    }

    fn frames(&self, orient: Direction) -> CastResult<Arc<dyn MultiFrameImage>> {
        match self.mode {
            CompositeMode::Shadow { alpha } => Ok(Arc::new(ShadowImage {
                order: self.paint_order(orient),
                sources: self.sources(orient)?,
                alpha,
            })),
            CompositeMode::Base | CompositeMode::Mask => {
                let rendered: Arc<dyn MultiFrameImage> = self.realize(orient)?;
                Ok(rendered)
            }
        }
    }
}

impl fmt::Debug for CompositedFrames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositedFrames")
            .field("mode", &self.mode)
            .field("action", &self.action)
            .field("layers", &self.layers)
            .finish()
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Union of every source's bounds for a frame, at least 1x1.
///
/// Empty bounds contribute nothing; if all are empty the primary's bounds
/// are used.
fn union_bounds(sources: &[Arc<dyn MultiFrameImage>], index: usize) -> Rect {
    let union = sources
        .iter()
        .fold(Rect::default(), |acc, s| acc.union(&s.trimmed_bounds(index)));
    if union.is_empty() {
        sources[0].trimmed_bounds(index).at_least_one_pixel()
    } else {
        union
    }
}

fn paint_union(
    sources: &[Arc<dyn MultiFrameImage>],
    order: &[usize],
    index: usize,
) -> (Rect, RgbaImage) {
    let bounds = union_bounds(sources, index);
    let mut image = RgbaImage::new(bounds.width, bounds.height);
    for &i in order {
        sources[i].paint_frame(index, &mut image, -bounds.x, -bounds.y, PaintOp::Over);
    }
    (bounds, image)
}

fn render_union(sources: &[Arc<dyn MultiFrameImage>], order: &[usize], index: usize) -> SourceFrame {
    let (bounds, image) = paint_union(sources, order, index);
    let origin = sources[0].origin(index).offset(-bounds.x, -bounds.y);
    SourceFrame::untrimmed(image, origin)
}

fn render_masked(sources: &[Arc<dyn MultiFrameImage>], index: usize) -> SourceFrame {
    let primary = &sources[0];
    let primary_bounds = primary.trimmed_bounds(index);
    let bounds = sources[1..]
        .iter()
        .try_fold(primary_bounds, |acc, donor| {
            acc.intersection(&donor.trimmed_bounds(index))
        })
        .unwrap_or(primary_bounds);

    let mut image = RgbaImage::new(bounds.width, bounds.height);
    primary.paint_frame(index, &mut image, -bounds.x, -bounds.y, PaintOp::Over);
    for donor in &sources[1..] {
        donor.paint_frame(index, &mut image, -bounds.x, -bounds.y, PaintOp::DestinationIn);
    }

    SourceFrame {
        image,
        bounds,
        size: primary.frame_size(index),
        origin: primary.origin(index),
    }
}

// ============================================================================
// ShadowImage
// ============================================================================

/// Live shadow frames: the union of the shadow sources, re-rendered on every
/// paint and blended at the shadow's opacity.
struct ShadowImage {
    sources: Vec<Arc<dyn MultiFrameImage>>,
    order: Vec<usize>,
    alpha: f32,
}

impl MultiFrameImage for ShadowImage {
    fn frame_count(&self) -> usize {
        self.sources[0].frame_count()
    }

    fn frame_size(&self, index: usize) -> Size {
        self.sources[0].frame_size(index)
    }

    fn trimmed_bounds(&self, index: usize) -> Rect {
        union_bounds(&self.sources, index)
    }

    fn origin(&self, index: usize) -> Point {
        self.sources[0].origin(index)
    }

    fn paint_frame(&self, index: usize, dest: &mut RgbaImage, x: i32, y: i32, op: PaintOp) {
        let (bounds, image) = paint_union(&self.sources, &self.order, index);
        let op = match op {
            PaintOp::Over => PaintOp::AlphaOver(self.alpha),
            PaintOp::AlphaOver(alpha) => PaintOp::AlphaOver(alpha * self.alpha),
            PaintOp::DestinationIn => PaintOp::DestinationIn,
        };
        raster::paint(dest, &image, x + bounds.x, y + bounds.y, op);
    }

    fn hit_test(&self, index: usize, x: i32, y: i32) -> bool {
        self.sources.iter().any(|s| s.hit_test(index, x, y))
    }
}
