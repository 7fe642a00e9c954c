use crate::{
    foundation::core::{EntityId, FrameIndex, Point, TypeId},
    model::{
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A geometric marker placed on one frame.
pub struct Marker {
    /// Frame the marker lives on.
    pub frame: FrameIndex,
    /// Shape of the marker.
    pub geometry: Geometry,
    /// Owning track. Only point geometry may carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<EntityId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// Track-level attributes. Track geometry lives on its member points.
pub struct TrackInfo {
    /// Hidden tracks are not displayed.
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Closed set of entity variants.
pub enum EntityKind {
    /// Point, line, rect, ellipse, or polygon on a frame.
    Marker(Marker),
    /// Trajectory grouping point markers across frames.
    Track(TrackInfo),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// An annotation entity: a marker or a track.
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,
    /// Owning marker type.
    pub type_id: TypeId,
    /// Raw JSON style override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Label override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Variant payload.
    pub kind: EntityKind,
}

impl Entity {
    /// Mode this entity counts as: tracks and track points are [`Mode::Track`].
    pub fn mode(&self) -> Mode {
        match &self.kind {
            EntityKind::Track(_) => Mode::Track,
            EntityKind::Marker(m) if m.track.is_some() => Mode::Track,
            EntityKind::Marker(m) => m.geometry.mode(),
        }
    }

    pub fn marker(&self) -> Option<&Marker> {
        match &self.kind {
            EntityKind::Marker(m) => Some(m),
            EntityKind::Track(_) => None,
        }
    }

    pub fn marker_mut(&mut self) -> Option<&mut Marker> {
        match &mut self.kind {
            EntityKind::Marker(m) => Some(m),
            EntityKind::Track(_) => None,
        }
    }

    pub fn frame(&self) -> Option<FrameIndex> {
        self.marker().map(|m| m.frame)
    }

    pub fn is_track(&self) -> bool {
        matches!(self.kind, EntityKind::Track(_))
    }

    /// Track this point belongs to, if any.
    pub fn track(&self) -> Option<EntityId> {
        self.marker().and_then(|m| m.track)
    }

    /// Top-level entities are listed directly under their type.
    pub fn is_top_level(&self) -> bool {
        self.track().is_none()
    }

    /// Position of a point marker.
    pub fn point(&self) -> Option<Point> {
        match self.marker()?.geometry {
            Geometry::Point(PointGeom { x, y }) => Some(Point::new(x, y)),
            _ => None,
        }
    }

    pub fn hidden(&self) -> bool {
        match &self.kind {
            EntityKind::Track(t) => t.hidden,
            EntityKind::Marker(_) => false,
        }
    }
}
