//! Character manager.
//!
//! The entry point for hosts. A [`CharacterManager`] owns the action
//! sequence table and both caches:
//!
//! 1. the recipe cache, mapping `(descriptor, action)` to a pixel-free
//!    [`CompositedFrames`],
//! 2. the pixel cache, holding rendered orientations under a byte budget.
//!
//! Recipes are built once per key even under contention; rendered frames are
//! shared between every recipe that resolves to the same layers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::builder::RecipeBuilder;
use crate::cache::{CacheStats, SharedCache};
use crate::component::{ActionSequence, ComponentRepository};
use crate::composite::{CompositedFrames, PixelCache};
use crate::config::ManagerConfig;
use crate::descriptor::CharacterDescriptor;
use crate::error::CastResult;

type RecipeKey = (CharacterDescriptor, String);

/// Builds, caches and hands out composited character frames.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cast_renderer::{
///     CharacterDescriptor, CharacterManager, ComponentClass, ComponentId, Direction,
///     FrameVariant, ManagerConfig, MemoryRepository, MultiFrameImage, Point, RasterFrames,
///     SourceFrame,
/// };
/// use image::{Rgba, RgbaImage};
///
/// let mut repo = MemoryRepository::new();
/// repo.add_class(ComponentClass::new("body", 0));
/// repo.add_component(ComponentId(1), "body", "plain").unwrap();
/// let frame = SourceFrame::untrimmed(RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255])), Point::new(4, 8));
/// repo.add_frames(
///     ComponentId(1),
///     "standing",
///     FrameVariant::Normal,
///     RasterFrames::new().with_orientation(Direction::South, vec![frame]),
/// );
///
/// let manager = CharacterManager::new(Arc::new(repo), ManagerConfig::default());
/// let desc = CharacterDescriptor::from_ids([ComponentId(1)]);
/// let recipe = manager.get_action_frames(&desc, "standing").unwrap();
/// let frames = recipe.realize(Direction::South).unwrap();
/// assert_eq!(frames.frame_count(), 1);
/// ```
pub struct CharacterManager {
    repo: Arc<dyn ComponentRepository>,
    actions: HashMap<String, ActionSequence>,
    recipes: SharedCache<RecipeKey, Arc<CompositedFrames>>,
    pixels: Arc<PixelCache>,
    config: ManagerConfig,
    last_stats_report: Mutex<Option<Instant>>,
}

impl CharacterManager {
    /// Creates a manager over a component repository.
    ///
    /// The action sequence table is read from the repository once, here.
    pub fn new(repo: Arc<dyn ComponentRepository>, config: ManagerConfig) -> Self {
        let actions: HashMap<_, _> = repo
            .action_sequences()
            .into_iter()
            .map(|seq| (seq.name.clone(), seq))
            .collect();

        debug!(
            kilobytes = config.cache_kilobytes,
            recipe_capacity = ?config.recipe_capacity,
            actions = actions.len(),
            "creating action frame cache"
        );

        Self {
            recipes: SharedCache::new(config.recipe_budget()),
            pixels: Arc::new(PixelCache::new(config.cache_budget_bytes())),
            repo,
            actions,
            config,
            last_stats_report: Mutex::new(None),
        }
    }

    /// Returns the recipe for a character performing an action.
    ///
    /// Recipes are cached; concurrent requests for the same key build it
    /// once. Failed builds are not cached.
    ///
    /// # Errors
    ///
    /// See [`RecipeBuilder::build`].
    pub fn get_action_frames(
        &self,
        descriptor: &CharacterDescriptor,
        action: &str,
    ) -> CastResult<Arc<CompositedFrames>> {
        let key = (descriptor.clone(), action.to_string());
        let recipe = self.recipes.get_or_try_insert_with(
            &key,
            || {
                RecipeBuilder::new(self.repo.as_ref(), &self.pixels)
                    .build(descriptor, action)
                    .map(Arc::new)
            },
            |_| 1,
        )?;
        self.report_stats();
        Ok(recipe)
    }

    /// Warms the recipe cache for a character and action.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn prefetch(&self, descriptor: &CharacterDescriptor, action: &str) {
        if let Err(err) = self.get_action_frames(descriptor, action) {
            warn!(?descriptor, action, %err, "failed to resolve action sequence");
        }
    }

    /// Looks up an action sequence by name.
    pub fn get_action_sequence(&self, name: &str) -> Option<&ActionSequence> {
        self.actions.get(name)
    }

    pub fn action_sequences(&self) -> impl Iterator<Item = &ActionSequence> {
        self.actions.values()
    }

    pub fn component_repository(&self) -> &Arc<dyn ComponentRepository> {
        &self.repo
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Bytes of rendered frames currently held by the pixel cache.
    pub fn estimated_cache_memory_usage(&self) -> usize {
        self.pixels.weight()
    }

    /// Pixel cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.pixels.stats()
    }

    /// Number of rendered orientations in the pixel cache.
    pub fn cached_frame_sets(&self) -> usize {
        self.pixels.len()
    }

    /// Number of recipes in the recipe cache.
    pub fn cached_recipes(&self) -> usize {
        self.recipes.len()
    }

    /// Logs pixel cache usage, at most once per configured interval.
    fn report_stats(&self) {
        let interval = Duration::from_secs(self.config.stats_interval_secs);
        {
            let mut last = self
                .last_stats_report
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|at| at.elapsed() < interval) {
                return;
            }
            *last = Some(Instant::now());
        }

        let stats = self.cache_stats();
        debug!(
            mem_kb = self.estimated_cache_memory_usage() / 1024,
            size = self.cached_frame_sets(),
            hits = stats.hits,
            misses = stats.misses,
            "character frame cache"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentClass, ComponentId, FrameVariant, MemoryRepository};
    use crate::error::CastError;
    use crate::frames::{MultiFrameImage, RasterFrames, SourceFrame};
    use crate::geometry::{Direction, Point};
    use image::{Rgba, RgbaImage};
    use std::thread;

    fn raster(w: u32, h: u32, orients: &[Direction]) -> RasterFrames {
        orients.iter().fold(RasterFrames::new(), |frames, &orient| {
            let img = RgbaImage::from_pixel(w, h, Rgba([40, 80, 120, 255]));
            frames.with_orientation(orient, vec![SourceFrame::untrimmed(img, Point::new(0, h as i32))])
        })
    }

    fn repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_action(ActionSequence::new("walk", 8.0, Point::new(16, 40), Direction::ALL.to_vec()));
        repo.add_action(ActionSequence::new("standing", 1.0, Point::new(16, 40), Direction::ALL.to_vec()));
        repo.add_class(ComponentClass::new("body", 0));
        repo.add_class(ComponentClass::new("hat", 5));
        repo.add_component(ComponentId(1), "body", "plain").unwrap();
        repo.add_component(ComponentId(2), "hat", "cap").unwrap();
        repo.add_component(ComponentId(3), "body", "huge").unwrap();
        repo.add_frames(ComponentId(1), "walk", FrameVariant::Normal, raster(8, 8, &Direction::ALL));
        repo.add_frames(ComponentId(2), "walk", FrameVariant::Normal, raster(4, 4, &Direction::ALL));
        // 115 * 115 * 4 bytes: just over 50KB per orientation.
        repo.add_frames(
            ComponentId(3),
            "walk",
            FrameVariant::Normal,
            raster(115, 115, &[Direction::North, Direction::South]),
        );
        repo
    }

    fn manager(config: ManagerConfig) -> CharacterManager {
        CharacterManager::new(Arc::new(repo()), config)
    }

    #[test]
    fn equal_descriptors_share_recipes_and_pixels() {
        let manager = manager(ManagerConfig::default());
        let a = CharacterDescriptor::from_ids([ComponentId(1), ComponentId(2)]);
        let b = CharacterDescriptor::new()
            .with_component(ComponentId(1))
            .with_component(ComponentId(2));

        let ra = manager.get_action_frames(&a, "walk").unwrap();
        let rb = manager.get_action_frames(&b, "walk").unwrap();
        assert!(Arc::ptr_eq(&ra, &rb));

        let fa = ra.realize(Direction::East).unwrap();
        let fb = rb.realize(Direction::East).unwrap();
        assert!(Arc::ptr_eq(&fa, &fb));
        assert_eq!(manager.cache_stats().hits, 1);
    }

    #[test]
    fn different_descriptors_with_identical_layers_share_pixels() {
        let manager = manager(ManagerConfig::default());
        let plain = CharacterDescriptor::from_ids([ComponentId(1)]);
        let zero_offset = CharacterDescriptor::new().with_translated(ComponentId(1), Point::default());
        assert_ne!(plain, zero_offset);

        let ra = manager.get_action_frames(&plain, "walk").unwrap();
        let rb = manager.get_action_frames(&zero_offset, "walk").unwrap();
        assert!(!Arc::ptr_eq(&ra, &rb));
        assert_eq!(manager.cached_recipes(), 2);

        let fa = ra.realize(Direction::North).unwrap();
        let fb = rb.realize(Direction::North).unwrap();
        assert!(Arc::ptr_eq(&fa, &fb));
        assert_eq!(manager.cached_frame_sets(), 1);
    }

    #[test]
    fn oversized_entry_survives_until_next_insert() {
        let manager = manager(ManagerConfig::new().with_cache_kilobytes(1));
        let recipe = manager
            .get_action_frames(&CharacterDescriptor::from_ids([ComponentId(3)]), "walk")
            .unwrap();

        let north = recipe.realize(Direction::North).unwrap();
        assert_eq!(north.estimated_memory_usage(), 115 * 115 * 4);
        assert_eq!(manager.cached_frame_sets(), 1);
        assert!(manager.estimated_cache_memory_usage() > manager.config().cache_budget_bytes());
        assert!(Arc::ptr_eq(&north, &recipe.realize(Direction::North).unwrap()));

        recipe.realize(Direction::South).unwrap();
        assert_eq!(manager.cached_frame_sets(), 1);
        assert_eq!(manager.cache_stats().evictions, 1);
        assert_eq!(manager.estimated_cache_memory_usage(), 115 * 115 * 4);
    }

    #[test]
    fn build_errors_propagate_and_are_not_cached() {
        let manager = manager(ManagerConfig::default());
        let missing = CharacterDescriptor::from_ids([ComponentId(1), ComponentId(42)]);
        assert_eq!(
            manager.get_action_frames(&missing, "walk").unwrap_err(),
            CastError::MissingComponent { id: ComponentId(42) }
        );

        let unsupported = CharacterDescriptor::from_ids([ComponentId(1)]);
        assert!(matches!(
            manager.get_action_frames(&unsupported, "standing"),
            Err(CastError::UnsupportedAction { .. })
        ));
        assert_eq!(manager.cached_recipes(), 0);
    }

    #[test]
    fn prefetch_swallows_failures() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let manager = manager(ManagerConfig::default());

        manager.prefetch(&CharacterDescriptor::from_ids([ComponentId(42)]), "walk");
        assert_eq!(manager.cached_recipes(), 0);

        manager.prefetch(&CharacterDescriptor::from_ids([ComponentId(1)]), "walk");
        assert_eq!(manager.cached_recipes(), 1);
    }

    #[test]
    fn realization_errors_leave_the_recipe_usable() {
        let manager = manager(ManagerConfig::default());
        let recipe = manager
            .get_action_frames(&CharacterDescriptor::from_ids([ComponentId(3)]), "walk")
            .unwrap();

        assert!(matches!(recipe.realize(Direction::East), Err(CastError::Composition(_))));
        assert!(recipe.realize(Direction::North).is_ok());
        assert_eq!(manager.cached_recipes(), 1);
    }

    #[test]
    fn action_sequences_are_loaded_once() {
        let manager = manager(ManagerConfig::default());
        let walk = manager.get_action_sequence("walk").unwrap();
        assert_eq!(walk.frames_per_second, 8.0);
        assert_eq!(walk.orients.len(), 8);
        assert!(manager.get_action_sequence("dance").is_none());
        assert_eq!(manager.action_sequences().count(), 2);
        assert!(manager.component_repository().component(ComponentId(2)).is_ok());
    }

    #[test]
    fn recipe_capacity_bounds_the_recipe_cache() {
        let manager = manager(ManagerConfig::new().with_recipe_capacity(1));
        manager
            .get_action_frames(&CharacterDescriptor::from_ids([ComponentId(1)]), "walk")
            .unwrap();
        manager
            .get_action_frames(&CharacterDescriptor::from_ids([ComponentId(2)]), "walk")
            .unwrap();
        assert_eq!(manager.cached_recipes(), 1);
    }

    #[test]
    fn concurrent_requests_share_one_recipe() {
        let manager = Arc::new(manager(ManagerConfig::default()));
        let desc = CharacterDescriptor::from_ids([ComponentId(1), ComponentId(2)]);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let manager = manager.clone();
                let desc = desc.clone();
                thread::spawn(move || {
                    let recipe = manager.get_action_frames(&desc, "walk").unwrap();
                    recipe.realize(Direction::SouthWest).unwrap();
                    recipe
                })
            })
            .collect();
        let recipes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(recipes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(manager.cached_frame_sets(), 1);
    }
}
