use crate::foundation::error::{AnnotrackError, AnnotrackResult};

pub use kurbo::{Point, Rect, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
/// Position of an image within the annotated sequence.
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Frame `delta` steps earlier, saturating at frame 0.
    pub fn saturating_back(self, delta: u64) -> Self {
        Self(self.0.saturating_sub(delta))
    }

    /// Frame `delta` steps later, saturating at `u64::MAX`.
    pub fn saturating_forward(self, delta: u64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
/// Identifier of a [`crate::MarkerType`].
pub struct TypeId(pub u64);

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
/// Identifier shared by geometric markers and tracks.
pub struct EntityId(pub u64);

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Inclusive frame interval `[start, end]`.
pub struct FrameSpan {
    /// First frame in the span.
    pub start: FrameIndex,
    /// Last frame in the span (inclusive).
    pub end: FrameIndex,
}

impl FrameSpan {
    /// Build a span, rejecting `start > end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> AnnotrackResult<Self> {
        if start.0 > end.0 {
            return Err(AnnotrackError::validation("FrameSpan start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Span covering every frame.
    pub fn unbounded() -> Self {
        Self {
            start: FrameIndex(0),
            end: FrameIndex(u64::MAX),
        }
    }

    /// Whether `f` lies inside the span, both ends included.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 <= self.end.0
    }

    /// Number of frames covered.
    pub fn len_frames(self) -> u64 {
        (self.end.0 - self.start.0).saturating_add(1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Frames shown around the current frame; `None` on either side means unbounded.
pub struct TrackWindow {
    /// Frames before the current frame.
    #[serde(default)]
    pub trailing: Option<u64>,
    /// Frames after the current frame.
    #[serde(default)]
    pub leading: Option<u64>,
}

impl TrackWindow {
    /// Window limited on both sides.
    pub fn bounded(trailing: u64, leading: u64) -> Self {
        Self {
            trailing: Some(trailing),
            leading: Some(leading),
        }
    }

    /// Frames around `frame` that this window exposes.
    pub fn around(self, frame: FrameIndex) -> FrameSpan {
        let start = match self.trailing {
            Some(t) => frame.saturating_back(t),
            None => FrameIndex(0),
        };
        let end = match self.leading {
            Some(l) => frame.saturating_forward(l),
            None => FrameIndex(u64::MAX),
        };
        FrameSpan { start, end }
    }

    /// `[min - trailing, max + leading]` for a track spanning `[min, max]`.
    pub fn widen(self, span: FrameSpan) -> FrameSpan {
        let start = match self.trailing {
            Some(t) => span.start.saturating_back(t),
            None => FrameIndex(0),
        };
        let end = match self.leading {
            Some(l) => span.end.saturating_forward(l),
            None => FrameIndex(u64::MAX),
        };
        FrameSpan { start, end }
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Rgba8 = Rgba8::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// `#rrggbb` or `#rrggbbaa` (alpha omitted when opaque).
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
