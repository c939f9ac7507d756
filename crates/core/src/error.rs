use crate::{
    event::{EventType, PayloadKind},
    scene::{ObjectId, SceneId},
    system::SystemKind,
};

/// Result alias that carries the custom [`EngineError`] type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Common error type for the core crate.
///
/// Lookup misses (a scene or shadow that does not exist) are not errors and
/// never show up here; callers get `None` or a silent no-op instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Free-form failure raised by a collaborator or a precondition check.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration files that could not be parsed or serialised.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The object was removed (or never existed) in the scene that was asked.
    #[error("object {0:?} does not exist")]
    UnknownObject(ObjectId),
    #[error("scene {0:?} does not exist")]
    UnknownScene(SceneId),
    /// A system scene was handed a `UScene` it is not associated with.
    #[error("system scene belongs to {expected:?} but was given {found:?}")]
    SceneMismatch { expected: SceneId, found: SceneId },
    /// An event was registered or published with the wrong payload type.
    #[error("{event:?} carries {expected:?} payloads, got {found:?}")]
    PayloadMismatch {
        event: EventType,
        expected: PayloadKind,
        found: PayloadKind,
    },
    #[error("parenting {object:?} under {parent:?} would create a cycle")]
    HierarchyCycle { object: ObjectId, parent: ObjectId },
    #[error("object {object:?} has no {kind:?} shadow")]
    NotAttached { object: ObjectId, kind: SystemKind },
    /// Device level failures reported by render/audio backends.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl EngineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for EngineError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EngineError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
