//! Layers: the units the compositor paints.
//!
//! A [`Layer`] pairs the thing that contributes to a character (a real
//! component, or a synthesized shadow) with the [`ActionFrames`] to paint
//! for it. Layers are immutable; [`Layer::recolored`] and
//! [`Layer::translated`] wrap the frames in new objects and leave the
//! original untouched.
//!
//! Every layer also carries a [`FramesKey`] describing *how* its frames were
//! derived. Two layers with equal keys paint identical pixels, which lets the
//! pixel cache share rendered frames between unrelated characters.

pub mod recolor;
pub mod translate;

pub use recolor::{Colorization, RecoloredFrames};
pub use translate::TranslatedFrames;

use std::fmt;
use std::sync::Arc;

use crate::component::{Component, ComponentClass, ComponentId, FrameVariant};
use crate::composite::CompositeMode;
use crate::frames::ActionFrames;
use crate::geometry::{Direction, Point};

// ============================================================================
// FramesKey
// ============================================================================

/// Structural identity of a layer's frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FramesKey {
    /// Frames loaded straight from a component.
    Component {
        id: ComponentId,
        action: String,
        variant: FrameVariant,
    },
    Recolored {
        base: Box<FramesKey>,
        zations: Vec<Colorization>,
    },
    Translated {
        base: Box<FramesKey>,
        offset: Point,
    },
    /// Several layers composited into one.
    Composite {
        mode: CompositeMode,
        action: String,
        sources: Vec<FramesKey>,
    },
}

// ============================================================================
// Layer
// ============================================================================

/// What a layer stands for.
#[derive(Clone)]
pub enum LayerSource {
    Component(Arc<Component>),
    /// A generated layer (a composited shadow). It has no identity beyond
    /// the class it paints as.
    Synthetic { class: Arc<ComponentClass> },
}

/// One visual contributor to a composited frame.
#[derive(Clone)]
pub struct Layer {
    pub source: LayerSource,
    pub frames: Arc<dyn ActionFrames>,
    pub key: FramesKey,
}

impl Layer {
    /// Creates a layer from frames loaded for a component.
    pub fn from_component(
        component: Arc<Component>,
        action: &str,
        variant: FrameVariant,
        frames: Arc<dyn ActionFrames>,
    ) -> Self {
        let key = FramesKey::Component {
            id: component.id,
            action: action.to_string(),
            variant,
        };
        Self {
            source: LayerSource::Component(component),
            frames,
            key,
        }
    }

    /// Creates a generated layer painting as `class`.
    pub fn synthetic(class: Arc<ComponentClass>, frames: Arc<dyn ActionFrames>, key: FramesKey) -> Self {
        Self {
            source: LayerSource::Synthetic { class },
            frames,
            key,
        }
    }

    pub fn class(&self) -> &ComponentClass {
        match &self.source {
            LayerSource::Component(component) => &component.class,
            LayerSource::Synthetic { class } => class,
        }
    }

    /// Id of the underlying component; `None` for synthetic layers.
    pub fn component_id(&self) -> Option<ComponentId> {
        match &self.source {
            LayerSource::Component(component) => Some(component.id),
            LayerSource::Synthetic { .. } => None,
        }
    }

    pub fn render_priority(&self, action: &str, orient: Direction) -> i32 {
        self.class().render_priority(action, orient)
    }

    /// Returns a copy of this layer with its frames recolored.
    ///
    /// An empty colorization list returns the layer unchanged.
    pub fn recolored(&self, zations: &[Colorization]) -> Layer {
        if zations.is_empty() {
            return self.clone();
        }
        Layer {
            source: self.source.clone(),
            frames: Arc::new(RecoloredFrames::new(self.frames.clone(), zations)),
            key: FramesKey::Recolored {
                base: Box::new(self.key.clone()),
                zations: zations.to_vec(),
            },
        }
    }

    /// Returns a copy of this layer drawn at an offset.
    ///
    /// A zero offset returns the layer unchanged.
    pub fn translated(&self, offset: Point) -> Layer {
        if offset == Point::default() {
            return self.clone();
        }
        Layer {
            source: self.source.clone(),
            frames: Arc::new(TranslatedFrames::new(self.frames.clone(), offset)),
            key: FramesKey::Translated {
                base: Box::new(self.key.clone()),
                offset,
            },
        }
    }

    /// Returns a copy of this layer with different frames.
    pub fn with_frames(&self, frames: Arc<dyn ActionFrames>, key: FramesKey) -> Layer {
        Layer {
            source: self.source.clone(),
            frames,
            key,
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("component", &self.component_id())
            .field("class", &self.class().name)
            .field("key", &self.key)
            .finish()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            LayerSource::Component(component) => write!(f, "{component}"),
            LayerSource::Synthetic { class } => write!(f, "{} (synthetic)", class.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentRepository, MemoryRepository};
    use crate::frames::RasterFrames;

    fn head_layer() -> Layer {
        let mut repo = MemoryRepository::new();
        repo.add_class(ComponentClass::new("head", 3));
        repo.add_component(ComponentId(1), "head", "bald").unwrap();
        let head = repo.component(ComponentId(1)).unwrap();
        Layer::from_component(head, "walk", FrameVariant::Normal, Arc::new(RasterFrames::new()))
    }

    #[test]
    fn transforms_extend_the_key() {
        let layer = head_layer();
        let zation = Colorization::new([255, 0, 0], [10.0, 0.1, 0.1], [90.0, 0.0, 0.0]);

        let moved = layer.recolored(&[zation.clone()]).translated(Point::new(2, 0));
        let FramesKey::Translated { base, offset } = &moved.key else {
            panic!("expected translated key, got {:?}", moved.key);
        };
        assert_eq!(*offset, Point::new(2, 0));
        assert!(matches!(**base, FramesKey::Recolored { .. }));

        // The original layer keeps its own key and frames.
        assert!(matches!(layer.key, FramesKey::Component { .. }));
        assert_eq!(moved.component_id(), Some(ComponentId(1)));
    }

    #[test]
    fn identity_transforms_keep_the_key() {
        let layer = head_layer();
        assert_eq!(layer.recolored(&[]).key, layer.key);
        assert_eq!(layer.translated(Point::default()).key, layer.key);
    }

    #[test]
    fn synthetic_layers_paint_as_their_class() {
        let class = Arc::new(ComponentClass::new("feetshadow", -5));
        let layer = Layer::synthetic(
            class,
            Arc::new(RasterFrames::new()),
            FramesKey::Composite {
                mode: CompositeMode::Base,
                action: "walk".into(),
                sources: Vec::new(),
            },
        );
        assert_eq!(layer.component_id(), None);
        assert_eq!(layer.render_priority("walk", Direction::South), -5);
        assert_eq!(layer.to_string(), "feetshadow (synthetic)");
    }
}
