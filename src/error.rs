//! Error types for recipe construction and compositing.

use crate::component::{ComponentId, FrameVariant};

pub type CastResult<T> = Result<T, CastError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CastError {
    /// A descriptor referenced a component the repository does not know.
    #[error("no such component: {id}")]
    MissingComponent { id: ComponentId },

    /// A component has no base frames for the requested action.
    #[error("component {component} does not support action '{action}'")]
    UnsupportedAction { component: String, action: String },

    /// The frame provider failed while loading frames for a component.
    #[error("failed to load {variant} frames for {component} action '{action}': {reason}")]
    FrameLoad {
        component: String,
        action: String,
        variant: FrameVariant,
        reason: String,
    },

    /// An invariant was violated while rendering layers together.
    #[error("composition error: {0}")]
    Composition(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CastError {
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for CastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
