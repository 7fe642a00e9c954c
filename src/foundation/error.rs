use crate::foundation::core::FrameIndex;

/// Convenience result type used across annotrack.
pub type AnnotrackResult<T> = Result<T, AnnotrackError>;

/// Error taxonomy for rejected operations.
///
/// Every variant is raised before any state is mutated; callers can retry or correct input
/// without rolling anything back.
#[derive(thiserror::Error, Debug)]
pub enum AnnotrackError {
    /// Invalid caller-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced type, entity, or node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A marker type with the same name already exists.
    #[error("duplicate type name: {0}")]
    DuplicateName(String),

    /// Operation would move an entity across geometric modes.
    #[error("incompatible mode: {0}")]
    IncompatibleMode(String),

    /// Track cannot be split at the requested point.
    #[error("split not possible: {0}")]
    SplitNotPossible(String),

    /// Two tracks both own points at these frames.
    #[error("frame conflict at frames {frames:?}")]
    FrameConflict {
        /// Colliding frames in ascending order.
        frames: Vec<FrameIndex>,
    },

    /// Destructive operation needs explicit confirmation from the caller.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Failure reported by the persistence backend.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Errors when serializing or deserializing rows, styles, or dumps.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnnotrackError {
    /// Build a [`AnnotrackError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`AnnotrackError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`AnnotrackError::IncompatibleMode`] value.
    pub fn incompatible_mode(msg: impl Into<String>) -> Self {
        Self::IncompatibleMode(msg.into())
    }

    /// Build a [`AnnotrackError::SplitNotPossible`] value.
    pub fn split_not_possible(msg: impl Into<String>) -> Self {
        Self::SplitNotPossible(msg.into())
    }

    /// Build a [`AnnotrackError::Persistence`] value.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Build a [`AnnotrackError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for AnnotrackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
