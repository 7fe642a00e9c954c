use crate::foundation::core::{EntityId, FrameIndex, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
/// Layer a style string was read from.
pub enum StyleOrigin {
    /// Style attached to a marker type.
    Type(TypeId),
    /// Style attached to a marker or track.
    Entity(EntityId),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
/// Recoverable data problem. The operation that found it carried on with degraded output.
pub enum Warning {
    /// Style text was not a JSON object; the layer was treated as empty.
    MalformedStyle {
        /// Where the style came from.
        origin: StyleOrigin,
        /// Parser message.
        message: String,
    },
    /// Color string was neither hex nor a known colormap; white was used.
    UnknownColor {
        /// Raw color string.
        raw: String,
    },
    /// Point references a track that does not exist; excluded from connectivity.
    OrphanTrackPoint {
        /// The point entity.
        entity: EntityId,
        /// Missing track id.
        track: EntityId,
    },
    /// A track had two points on the same frame; the later one was excluded.
    DuplicateTrackFrame {
        /// Owning track.
        track: EntityId,
        /// Shared frame.
        frame: FrameIndex,
        /// Point that was excluded.
        entity: EntityId,
    },
}

/// Collects [`Warning`]s in the order they were first seen.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it. Repeats of an identical warning are kept once.
    pub fn warn(&mut self, warning: Warning) {
        if self.warnings.contains(&warning) {
            return;
        }
        tracing::warn!(?warning, "annotation data warning");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Take every recorded warning, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}
