//! Character components, their classes and the repository they come from.
//!
//! A [`Component`] is one independently authored body part (a head, a
//! torso, a sword). Its [`ComponentClass`] carries the metadata the
//! compositor needs: paint order, which class masks it and which shadow
//! group it contributes to.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{CastError, CastResult};
use crate::frames::ActionFrames;
use crate::geometry::{Direction, Point};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a component within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which image of a component to load for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameVariant {
    /// The ordinary sprite image.
    Normal,
    /// Silhouette used to build the shadow layer.
    Shadow,
    /// Crop mask used to clip other components.
    Crop,
}

impl fmt::Display for FrameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Shadow => "shadow",
            Self::Crop => "crop",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ComponentClass
// ============================================================================

/// Replaces a class's render priority for particular actions/orientations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct PriorityOverride {
    /// Action this override applies to, or every action if `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Orientations this override applies to, or every orientation if empty.
    #[serde(default)]
    pub orients: Vec<Direction>,

    pub render_priority: i32,
}

impl PriorityOverride {
    fn matches(&self, action: &str, orient: Direction) -> bool {
        self.action.as_deref().is_none_or(|a| a == action)
            && (self.orients.is_empty() || self.orients.contains(&orient))
    }
}

/// Metadata shared by all components of one visual class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComponentClass {
    pub name: String,

    /// Paint order; lower priorities are painted first (further back).
    #[serde(default)]
    pub render_priority: i32,

    /// Checked in order; the first match replaces `render_priority`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_overrides: Vec<PriorityOverride>,

    /// Class whose components' crop images clip members of this class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,

    /// Shadow group this class's shadow images are composited into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<String>,

    /// Opacity used when this class is itself a shadow group.
    #[serde(default = "default_shadow_alpha")]
    pub shadow_alpha: f32,
}

fn default_shadow_alpha() -> f32 {
    1.0
}

impl ComponentClass {
    pub fn new(name: impl Into<String>, render_priority: i32) -> Self {
        Self {
            name: name.into(),
            render_priority,
            priority_overrides: Vec::new(),
            mask: None,
            shadow: None,
            shadow_alpha: default_shadow_alpha(),
        }
    }

    /// Sets the class whose crop images mask this class.
    pub fn with_mask(mut self, mask_class: impl Into<String>) -> Self {
        self.mask = Some(mask_class.into());
        self
    }

    /// Sets the shadow group this class contributes to.
    pub fn with_shadow(mut self, shadow_class: impl Into<String>) -> Self {
        self.shadow = Some(shadow_class.into());
        self
    }

    /// Sets the opacity used when rendering this class as a shadow group.
    ///
    /// Clamped to 0.0-1.0.
    pub fn with_shadow_alpha(mut self, alpha: f32) -> Self {
        self.shadow_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_override(mut self, over: PriorityOverride) -> Self {
        self.priority_overrides.push(over);
        self
    }

    /// Returns true if components of this class cast a shadow.
    pub fn is_shadowed(&self) -> bool {
        self.shadow.is_some()
    }

    /// Render priority for the given action and orientation.
    pub fn render_priority(&self, action: &str, orient: Direction) -> i32 {
        self.priority_overrides
            .iter()
            .find(|o| o.matches(action, orient))
            .map_or(self.render_priority, |o| o.render_priority)
    }
}

// ============================================================================
// ActionSequence
// ============================================================================

/// A named animation and the orientations it is drawn in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ActionSequence {
    pub name: String,
    pub frames_per_second: f32,
    /// Anchor point shared by every frame of the sequence.
    pub origin: Point,
    /// Orientations provided, in sprite-strip order.
    pub orients: Vec<Direction>,
}

impl ActionSequence {
    /// Name of the sequence used when a component lacks frames for an action.
    pub const DEFAULT_SEQUENCE: &'static str = "default";

    pub fn new(
        name: impl Into<String>,
        frames_per_second: f32,
        origin: Point,
        orients: Vec<Direction>,
    ) -> Self {
        Self {
            name: name.into(),
            frames_per_second,
            origin,
            orients,
        }
    }
}

// ============================================================================
// Component
// ============================================================================

/// Loads the frames for a component.
///
/// `Ok(None)` means the component does not provide that action/variant;
/// `Err` means loading failed and aborts whatever requested the frames.
pub trait FrameProvider: Send + Sync {
    fn frames(
        &self,
        component: &Component,
        action: &str,
        variant: FrameVariant,
    ) -> CastResult<Option<Arc<dyn ActionFrames>>>;
}

/// A single body part.
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub class: Arc<ComponentClass>,
    provider: Arc<dyn FrameProvider>,
}

impl Component {
    pub fn new(
        id: ComponentId,
        name: impl Into<String>,
        class: Arc<ComponentClass>,
        provider: Arc<dyn FrameProvider>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            class,
            provider,
        }
    }

    /// Loads this component's frames for an action, or `None` if unsupported.
    pub fn frames_for(
        &self,
        action: &str,
        variant: FrameVariant,
    ) -> CastResult<Option<Arc<dyn ActionFrames>>> {
        self.provider.frames(self, action, variant)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("class", &self.class.name)
            .finish()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.class.name, self.name, self.id)
    }
}

// ============================================================================
// ComponentRepository
// ============================================================================

/// Source of components, classes and action sequences.
pub trait ComponentRepository: Send + Sync {
    /// Every action sequence the repository declares.
    fn action_sequences(&self) -> Vec<ActionSequence>;

    /// Looks up a component, failing with [`CastError::MissingComponent`].
    fn component(&self, id: ComponentId) -> CastResult<Arc<Component>>;

    fn component_class(&self, name: &str) -> Option<Arc<ComponentClass>>;
}

type FrameTable = HashMap<(ComponentId, String, FrameVariant), Arc<dyn ActionFrames>>;

/// Frame provider backed by an in-memory table.
///
/// Falls back to the component's [`ActionSequence::DEFAULT_SEQUENCE`] frames
/// when it has none for the requested action.
#[derive(Default)]
pub struct MemoryFrameProvider {
    table: RwLock<FrameTable>,
}

impl MemoryFrameProvider {
    fn insert(&self, key: (ComponentId, String, FrameVariant), frames: Arc<dyn ActionFrames>) {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, frames);
    }
}

impl FrameProvider for MemoryFrameProvider {
    fn frames(
        &self,
        component: &Component,
        action: &str,
        variant: FrameVariant,
    ) -> CastResult<Option<Arc<dyn ActionFrames>>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let found = table
            .get(&(component.id, action.to_string(), variant))
            .or_else(|| {
                table.get(&(
                    component.id,
                    ActionSequence::DEFAULT_SEQUENCE.to_string(),
                    variant,
                ))
            });
        Ok(found.cloned())
    }
}

/// A [`ComponentRepository`] assembled in memory.
///
/// Hosts that decode their own bundles register classes, components and
/// frames here; it is also what the tests use.
#[derive(Default)]
pub struct MemoryRepository {
    classes: HashMap<String, Arc<ComponentClass>>,
    components: BTreeMap<ComponentId, Arc<Component>>,
    actions: Vec<ActionSequence>,
    provider: Arc<MemoryFrameProvider>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: ComponentClass) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn add_action(&mut self, seq: ActionSequence) {
        self.actions.retain(|a| a.name != seq.name);
        self.actions.push(seq);
    }

    /// Registers a component of an already registered class.
    pub fn add_component(
        &mut self,
        id: ComponentId,
        class_name: &str,
        name: impl Into<String>,
    ) -> CastResult<()> {
        let class = self.classes.get(class_name).cloned().ok_or_else(|| {
            CastError::config(format!("component {id} references unknown class '{class_name}'"))
        })?;
        let provider: Arc<dyn FrameProvider> = self.provider.clone();
        self.components
            .insert(id, Arc::new(Component::new(id, name, class, provider)));
        Ok(())
    }

    /// Registers the frames of a component for an action and variant.
    pub fn add_frames(
        &mut self,
        id: ComponentId,
        action: impl Into<String>,
        variant: FrameVariant,
        frames: impl ActionFrames + 'static,
    ) {
        self.provider
            .insert((id, action.into(), variant), Arc::new(frames));
    }

    /// Ids of every component in the named class, in ascending order.
    pub fn component_ids(&self, class_name: &str) -> Vec<ComponentId> {
        self.components
            .values()
            .filter(|c| c.class.name == class_name)
            .map(|c| c.id)
            .collect()
    }
}

impl ComponentRepository for MemoryRepository {
    fn action_sequences(&self) -> Vec<ActionSequence> {
        self.actions.clone()
    }

    fn component(&self, id: ComponentId) -> CastResult<Arc<Component>> {
        self.components
            .get(&id)
            .cloned()
            .ok_or(CastError::MissingComponent { id })
    }

    fn component_class(&self, name: &str) -> Option<Arc<ComponentClass>> {
        self.classes.get(name).cloned()
    }
}
