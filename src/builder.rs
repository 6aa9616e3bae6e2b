//! Recipe construction.
//!
//! Turns a [`CharacterDescriptor`] and an action name into the list of
//! layers to composite. No pixels are touched: the result is a base-mode
//! [`CompositedFrames`] that renders lazily per orientation.
//!
//! Beyond one layer per component, the builder synthesizes:
//!
//! - one shadow layer per shadow group, compositing the shadow images of
//!   every member that has one,
//! - masked variants of layers whose class names a mask class, clipped by
//!   the crop images of the descriptor's components in that class.
//!
//! Missing shadow and crop images are not errors; the layer is simply left
//! out or left unmasked.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::component::{Component, ComponentRepository, FrameVariant};
use crate::composite::{CompositeMode, CompositedFrames, PixelCache};
use crate::descriptor::CharacterDescriptor;
use crate::error::{CastError, CastResult};
use crate::frames::ActionFrames;
use crate::geometry::Point;
use crate::layer::Layer;

/// A component together with the offset the descriptor gave it.
#[derive(Clone)]
struct Placed {
    component: Arc<Component>,
    offset: Point,
}

impl Placed {
    /// Loads a variant of this component's frames as a translated layer.
    fn layer(&self, action: &str, variant: FrameVariant) -> CastResult<Option<Layer>> {
        let frames = load_frames(&self.component, action, variant)?;
        Ok(frames.map(|frames| {
            Layer::from_component(self.component.clone(), action, variant, frames)
                .translated(self.offset)
        }))
    }
}

/// Builds recipes against a component repository.
pub struct RecipeBuilder<'a> {
    repo: &'a dyn ComponentRepository,
    pixels: &'a Arc<PixelCache>,
}

impl<'a> RecipeBuilder<'a> {
    pub fn new(repo: &'a dyn ComponentRepository, pixels: &'a Arc<PixelCache>) -> Self {
        Self { repo, pixels }
    }

    /// Builds the recipe for `descriptor` performing `action`.
    ///
    /// # Errors
    ///
    /// - [`CastError::MissingComponent`] if a slot names an unknown component.
    /// - [`CastError::UnsupportedAction`] if a component has no base frames
    ///   for the action.
    /// - [`CastError::FrameLoad`] if loading any frames fails.
    /// - [`CastError::Composition`] if the descriptor is empty.
    #[tracing::instrument(level = "debug", skip(self, descriptor), fields(components = descriptor.len()))]
    pub fn build(&self, descriptor: &CharacterDescriptor, action: &str) -> CastResult<CompositedFrames> {
        debug!(?descriptor, "compositing action");

        let mut layers = Vec::with_capacity(descriptor.len());
        let mut by_class: HashMap<String, Vec<Placed>> = HashMap::new();
        let mut shadows: BTreeMap<String, Vec<Placed>> = BTreeMap::new();

        for slot in &descriptor.slots {
            let component = self.repo.component(slot.id)?;
            let frames = load_frames(&component, action, FrameVariant::Normal)?.ok_or_else(|| {
                CastError::UnsupportedAction {
                    component: component.to_string(),
                    action: action.to_string(),
                }
            })?;
            let layer = Layer::from_component(component.clone(), action, FrameVariant::Normal, frames)
                .recolored(&slot.colorizations)
                .translated(slot.offset());
            layers.push(layer);

            let placed = Placed {
                component: component.clone(),
                offset: slot.offset(),
            };
            if let Some(shadow) = &component.class.shadow {
                shadows.entry(shadow.clone()).or_default().push(placed.clone());
            }
            by_class
                .entry(component.class.name.clone())
                .or_default()
                .push(placed);
        }

        for (shadow_class, members) in &shadows {
            if let Some(layer) = self.shadow_layer(action, shadow_class, members)? {
                layers.push(layer);
            }
        }

        let layers = layers
            .into_iter()
            .map(|layer| self.masked(action, layer, &by_class))
            .collect::<CastResult<Vec<_>>>()?;

        CompositedFrames::new(CompositeMode::Base, action, layers, self.pixels.clone())
    }

    /// Composites the shadow images of a shadow group into one layer.
    ///
    /// Returns `None` if the shadow class is unknown or no member has a
    /// shadow image for the action.
    fn shadow_layer(
        &self,
        action: &str,
        shadow_class: &str,
        members: &[Placed],
    ) -> CastResult<Option<Layer>> {
        let Some(class) = self.repo.component_class(shadow_class) else {
            warn!(
                shadow_class,
                components = ?members.iter().map(|m| m.component.to_string()).collect::<Vec<_>>(),
                "components reference non-existent shadow class"
            );
            return Ok(None);
        };

        let mut sources = Vec::new();
        for member in members {
            if let Some(layer) = member.layer(action, FrameVariant::Shadow)? {
                sources.push(layer);
            }
        }
        if sources.is_empty() {
            return Ok(None);
        }

        let alpha = class.shadow_alpha;
        let composite = CompositedFrames::new(
            CompositeMode::Shadow { alpha },
            action,
            sources,
            self.pixels.clone(),
        )?;
        let key = composite.key().clone();
        Ok(Some(Layer::synthetic(class, Arc::new(composite), key)))
    }

    /// Clips a layer by the crop images of its mask class, if any.
    fn masked(
        &self,
        action: &str,
        layer: Layer,
        by_class: &HashMap<String, Vec<Placed>>,
    ) -> CastResult<Layer> {
        let Some(donors) = layer.class().mask.as_ref().and_then(|mask| by_class.get(mask)) else {
            return Ok(layer);
        };

        let mut sources = vec![layer.clone()];
        for donor in donors {
            if let Some(crop) = donor.layer(action, FrameVariant::Crop)? {
                sources.push(crop);
            }
        }
        if sources.len() == 1 {
            return Ok(layer);
        }

        let composite = CompositedFrames::new(CompositeMode::Mask, action, sources, self.pixels.clone())?;
        let key = composite.key().clone();
        Ok(layer.with_frames(Arc::new(composite), key))
    }
}

/// Loads frames from a component's provider, tagging failures with context.
fn load_frames(
    component: &Component,
    action: &str,
    variant: FrameVariant,
) -> CastResult<Option<Arc<dyn ActionFrames>>> {
    component
        .frames_for(action, variant)
        .map_err(|err| match err {
            err @ CastError::FrameLoad { .. } => err,
            other => CastError::FrameLoad {
                component: component.to_string(),
                action: action.to_string(),
                variant,
                reason: other.to_string(),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentClass, ComponentId, FrameProvider, MemoryRepository};
    use crate::frames::{MultiFrameImage, RasterFrames, SourceFrame};
    use crate::geometry::{Direction, Rect};
    use crate::layer::{Colorization, FramesKey, LayerSource};
    use crate::raster::PaintOp;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn raster(frames: Vec<RgbaImage>) -> RasterFrames {
        let strip = frames
            .into_iter()
            .map(|img| SourceFrame::untrimmed(img, Point::new(4, 8)))
            .collect();
        RasterFrames::new().with_orientation(Direction::SouthWest, strip)
    }

    /// head#1 + torso#2 (torso masked by heads), boots#5 casting a 0.4 shadow.
    fn repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_class(ComponentClass::new("head", 10));
        repo.add_class(ComponentClass::new("torso", 5).with_mask("head"));
        repo.add_class(ComponentClass::new("boots", 1).with_shadow("feetshadow"));
        repo.add_class(ComponentClass::new("feetshadow", -5).with_shadow_alpha(0.4));
        repo.add_class(ComponentClass::new("cloak", 2).with_shadow("nowhere"));

        repo.add_component(ComponentId(1), "head", "bald").unwrap();
        repo.add_component(ComponentId(2), "torso", "mail").unwrap();
        repo.add_component(ComponentId(5), "boots", "leather").unwrap();
        repo.add_component(ComponentId(6), "cloak", "wool").unwrap();

        let three = || vec![solid(4, 4, [200, 150, 100, 255]); 3];
        repo.add_frames(ComponentId(1), "walk", FrameVariant::Normal, raster(three()));
        repo.add_frames(ComponentId(1), "walk", FrameVariant::Crop, raster(three()));
        repo.add_frames(ComponentId(2), "walk", FrameVariant::Normal, raster(three()));
        repo.add_frames(ComponentId(5), "walk", FrameVariant::Normal, raster(three()));
        repo.add_frames(
            ComponentId(5),
            "walk",
            FrameVariant::Shadow,
            raster(vec![solid(4, 2, [0, 0, 0, 255]); 3]),
        );
        repo.add_frames(ComponentId(6), "walk", FrameVariant::Normal, raster(three()));
        repo
    }

    fn build(repo: &MemoryRepository, desc: &CharacterDescriptor) -> CastResult<CompositedFrames> {
        let pixels = Arc::new(PixelCache::new(usize::MAX));
        RecipeBuilder::new(repo, &pixels).build(desc, "walk")
    }

    #[test]
    fn head_and_torso_masks_the_torso() {
        let repo = repo();
        let desc = CharacterDescriptor::from_ids([ComponentId(1), ComponentId(2)]);
        let recipe = build(&repo, &desc).unwrap();

        let layers = recipe.layers();
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0].key, FramesKey::Component { .. }));
        let FramesKey::Composite { mode, sources, .. } = &layers[1].key else {
            panic!("torso should be masked, got {:?}", layers[1].key);
        };
        assert_eq!(*mode, CompositeMode::Mask);
        assert_eq!(sources.len(), 2);

        let set = recipe.realize(Direction::SouthWest).unwrap();
        assert_eq!(set.frame_count(), 3);
    }

    #[test]
    fn boots_get_a_feetshadow_layer() {
        let repo = repo();
        let desc = CharacterDescriptor::from_ids([ComponentId(5)]);
        let recipe = build(&repo, &desc).unwrap();

        let layers = recipe.layers();
        assert_eq!(layers.len(), 2);
        let shadow = &layers[1];
        assert!(matches!(shadow.source, LayerSource::Synthetic { .. }));
        assert_eq!(shadow.class().name, "feetshadow");
        assert_eq!(shadow.component_id(), None);

        // The shadow paints at 40% opacity.
        let frames = shadow.frames.frames(Direction::SouthWest).unwrap();
        let mut dest = RgbaImage::new(4, 4);
        frames.paint_frame(0, &mut dest, 0, 0, PaintOp::Over);
        assert_eq!(dest.get_pixel(0, 0)[3], 102);

        // Painted beneath the boots, which cover it entirely.
        let set = recipe.realize(Direction::SouthWest).unwrap();
        assert_eq!(set.frame(0).image.get_pixel(0, 0).0, [200, 150, 100, 255]);
    }

    #[test]
    fn no_shadow_capable_member_means_no_shadow_layer() {
        let repo = repo();
        let desc = CharacterDescriptor::from_ids([ComponentId(1)]);
        let recipe = build(&repo, &desc).unwrap();
        assert_eq!(recipe.layers().len(), 1);
    }

    #[test]
    fn unknown_shadow_class_is_skipped() {
        let repo = repo();
        let desc = CharacterDescriptor::from_ids([ComponentId(6)]);
        let recipe = build(&repo, &desc).unwrap();
        assert_eq!(recipe.layers().len(), 1);
    }

    #[test]
    fn mask_without_donors_renders_like_no_mask() {
        let repo = repo();
        let masked = build(&repo, &CharacterDescriptor::from_ids([ComponentId(2)])).unwrap();
        assert!(matches!(masked.layers()[0].key, FramesKey::Component { .. }));

        let pixels = Arc::new(PixelCache::new(usize::MAX));
        let torso = repo.component(ComponentId(2)).unwrap();
        let plain = CompositedFrames::new(
            CompositeMode::Base,
            "walk",
            vec![Layer::from_component(
                torso.clone(),
                "walk",
                FrameVariant::Normal,
                torso.frames_for("walk", FrameVariant::Normal).unwrap().unwrap(),
            )],
            pixels,
        )
        .unwrap();

        assert_eq!(
            *masked.realize(Direction::SouthWest).unwrap(),
            *plain.realize(Direction::SouthWest).unwrap()
        );
    }

    #[test]
    fn descriptor_transforms_are_applied() {
        let repo = repo();
        let red_to_blue = Colorization::new([200, 150, 100], [30.0, 1.0, 1.0], [180.0, 0.0, 0.0]);
        let desc = CharacterDescriptor::new()
            .with_colorized(ComponentId(1), vec![red_to_blue])
            .with_translated(ComponentId(5), Point::new(3, 0));
        let recipe = build(&repo, &desc).unwrap();

        assert!(matches!(recipe.layers()[0].key, FramesKey::Recolored { .. }));
        assert!(matches!(recipe.layers()[1].key, FramesKey::Translated { .. }));

        // Shadow members inherit the slot's translation.
        let shadow = recipe.layers()[2].frames.frames(Direction::SouthWest).unwrap();
        assert_eq!(shadow.trimmed_bounds(0), Rect::new(3, 0, 4, 2));
    }

    #[test]
    fn missing_component_aborts() {
        let repo = repo();
        let desc = CharacterDescriptor::from_ids([ComponentId(1), ComponentId(99)]);
        assert_eq!(
            build(&repo, &desc).unwrap_err(),
            CastError::MissingComponent { id: ComponentId(99) }
        );
    }

    #[test]
    fn unsupported_action_aborts() {
        let repo = repo();
        let pixels = Arc::new(PixelCache::new(usize::MAX));
        let desc = CharacterDescriptor::from_ids([ComponentId(1)]);
        let err = RecipeBuilder::new(&repo, &pixels).build(&desc, "dance").unwrap_err();
        assert!(matches!(err, CastError::UnsupportedAction { ref action, .. } if action == "dance"));
    }

    #[test]
    fn default_action_frames_stand_in() {
        let mut repo = repo();
        repo.add_frames(ComponentId(1), "default", FrameVariant::Normal, raster(vec![solid(2, 2, [1, 1, 1, 255])]));
        let pixels = Arc::new(PixelCache::new(usize::MAX));
        let desc = CharacterDescriptor::from_ids([ComponentId(1)]);
        let recipe = RecipeBuilder::new(&repo, &pixels).build(&desc, "dance").unwrap();
        assert_eq!(recipe.realize(Direction::SouthWest).unwrap().frame_count(), 1);
    }

    struct FailingProvider;

    impl FrameProvider for FailingProvider {
        fn frames(
            &self,
            _component: &Component,
            _action: &str,
            _variant: FrameVariant,
        ) -> CastResult<Option<Arc<dyn ActionFrames>>> {
            Err(CastError::config("bundle is truncated"))
        }
    }

    #[test]
    fn provider_failures_become_frame_load_errors() {
        let class = Arc::new(ComponentClass::new("head", 0));
        let component = Component::new(ComponentId(4), "broken", class, Arc::new(FailingProvider));
        let Err(err) = load_frames(&component, "walk", FrameVariant::Normal) else {
            panic!("expected a load failure");
        };
        let CastError::FrameLoad { component, reason, .. } = err else {
            panic!("expected FrameLoad, got {err:?}");
        };
        assert_eq!(component, "head/broken (4)");
        assert!(reason.contains("bundle is truncated"));
    }
}
