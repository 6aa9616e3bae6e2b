//! Character descriptors.
//!
//! A [`CharacterDescriptor`] names the components a character is built from,
//! with optional per-component recoloring and translation. Descriptors are
//! plain values: two descriptors with the same slots are interchangeable and
//! hit the same cache entries.
//!
//! # Example
//!
//! ```
//! use cast_renderer::{CharacterDescriptor, Colorization, ComponentId, Point};
//!
//! let knight = CharacterDescriptor::new()
//!     .with_component(ComponentId(1))
//!     .with_colorized(
//!         ComponentId(2),
//!         vec![Colorization::new([200, 30, 30], [15.0, 0.3, 0.3], [180.0, 0.0, 0.0])],
//!     )
//!     .with_translated(ComponentId(3), Point::new(0, -2));
//!
//! let json = knight.to_json().unwrap();
//! assert_eq!(CharacterDescriptor::from_json(&json).unwrap(), knight);
//! ```

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::geometry::Point;
use crate::layer::Colorization;

// ============================================================================
// ComponentSlot
// ============================================================================

/// One component of a character and how to draw it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComponentSlot {
    pub id: ComponentId,

    /// Recoloring rules applied to this component. Empty means none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colorizations: Vec<Colorization>,

    /// Offset applied to this component. `None` draws it in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Point>,
}

impl ComponentSlot {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            colorizations: Vec::new(),
            translation: None,
        }
    }

    /// Translation to apply, treating `None` as no offset.
    pub fn offset(&self) -> Point {
        self.translation.unwrap_or_default()
    }
}

// ============================================================================
// CharacterDescriptor
// ============================================================================

/// The components making up a character, in order.
///
/// Slot order decides how components are grouped while building a recipe;
/// paint order comes from render priorities instead.
///
/// # JSON Format
///
/// ```json
/// {
///   "slots": [
///     { "id": 1 },
///     { "id": 2, "translation": { "x": 0, "y": -2 } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct CharacterDescriptor {
    #[serde(default)]
    pub slots: Vec<ComponentSlot>,
}

impl CharacterDescriptor {
    /// Creates a descriptor with no components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a descriptor from plain component ids.
    pub fn from_ids(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            slots: ids.into_iter().map(ComponentSlot::new).collect(),
        }
    }

    pub fn with_slot(mut self, slot: ComponentSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Adds a component drawn as authored.
    pub fn with_component(self, id: ComponentId) -> Self {
        self.with_slot(ComponentSlot::new(id))
    }

    /// Adds a recolored component.
    pub fn with_colorized(self, id: ComponentId, colorizations: Vec<Colorization>) -> Self {
        self.with_slot(ComponentSlot {
            colorizations,
            ..ComponentSlot::new(id)
        })
    }

    /// Adds a component drawn at an offset.
    pub fn with_translated(self, id: ComponentId, offset: Point) -> Self {
        self.with_slot(ComponentSlot {
            translation: Some(offset),
            ..ComponentSlot::new(id)
        })
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Serializes the descriptor to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
