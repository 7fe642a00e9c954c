//! Pointer interaction: what press, drag, and release do under the active tool.

use crate::{
    foundation::core::{EntityId, FrameIndex, Point, TypeId, Vec2},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{
        geometry::{Geometry, PolygonGeom},
        marker_type::Mode,
    },
    session::session::{Session, SessionUpdate},
    tool::{bus::SessionEvent, machine::Tool},
    tracks::aggregator::{NearestPolicy, TrackTarget},
};

#[derive(Clone, Debug, Default, PartialEq)]
/// Uncommitted pointer state. Discarding it never touches stored entities.
pub enum Interaction {
    #[default]
    Idle,
    /// Line, rect, or ellipse being dragged out; created on release.
    Drawing {
        type_id: TypeId,
        frame: FrameIndex,
        anchor: Point,
        geometry: Geometry,
        dragged: bool,
    },
    /// Polygon collecting vertices. `hover` is the rubber-band vertex.
    Polygon {
        type_id: TypeId,
        frame: FrameIndex,
        points: Vec<Point>,
        hover: Option<Point>,
    },
    /// Stored entity following the pointer.
    Dragging {
        id: EntityId,
        last: Point,
        moved: bool,
    },
}

impl Session {
    /// Shape to draw for the uncommitted interaction, if any.
    pub fn preview(&self) -> Option<Geometry> {
        match &self.interaction {
            Interaction::Drawing { geometry, .. } => Some(geometry.clone()),
            Interaction::Polygon { points, hover, .. } => {
                let mut points = points.clone();
                points.extend(*hover);
                Some(Geometry::Polygon(PolygonGeom {
                    points,
                    closed: false,
                }))
            }
            Interaction::Idle | Interaction::Dragging { .. } => None,
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Closest visible entity on the current frame within the hit tolerance. Ties go to the
    /// lower id.
    pub fn hit_test(&self, pos: Point) -> Option<EntityId> {
        let mut best: Option<(EntityId, f64)> = None;
        for e in self.store.query_by_frame(self.frame, None) {
            let Some(marker) = e.marker() else {
                continue;
            };
            if self.store.types().get(e.type_id).is_none_or(|t| t.hidden) {
                continue;
            }
            if let Some(track) = marker.track
                && self.store.get(track).is_none_or(|t| t.hidden())
            {
                continue;
            }
            let d = marker.geometry.distance_to(pos);
            if d > self.config.hit_tolerance {
                continue;
            }
            if best.is_none_or(|(id, bd)| d < bd || (d == bd && e.id < id)) {
                best = Some((e.id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Pointer pressed at `pos`.
    pub fn press(&mut self, pos: Point) -> AnnotrackResult<SessionUpdate> {
        match self.annotation_tool() {
            Tool::Add => self.press_add(pos),
            Tool::Delete => match self.hit_test(pos) {
                Some(id) => self.delete_entity(id),
                None => Ok(SessionUpdate::default()),
            },
            Tool::Retype => {
                let new_type = self.require_active_type()?;
                match self.hit_test(pos) {
                    Some(id) => self.retype_entity(id, new_type),
                    None => Ok(SessionUpdate::default()),
                }
            }
            Tool::Inactive => {
                if let Some(id) = self.hit_test(pos) {
                    self.start_drag(id, pos);
                }
                Ok(SessionUpdate::default())
            }
        }
    }

    fn press_add(&mut self, pos: Point) -> AnnotrackResult<SessionUpdate> {
        let type_id = self.require_active_type()?;
        let mode = self.store.types().require(type_id)?.mode;
        let frame = self.frame;

        match mode {
            Mode::Point => {
                let update = self.add_marker(type_id, frame, Geometry::anchored(mode, pos))?;
                if let Some(id) = update.created.first() {
                    self.start_drag(*id, pos);
                }
                Ok(update)
            }
            Mode::Track => {
                let target = self.track_target(type_id, pos);
                let (outcome, update) = self.add_track_point(target, frame, pos)?;
                self.active_track = Some(outcome.track);
                self.start_drag(outcome.entity, pos);
                Ok(update)
            }
            Mode::Polygon => self.press_polygon(type_id, pos),
            Mode::Line | Mode::Rect | Mode::Ellipse => {
                self.interaction = Interaction::Drawing {
                    type_id,
                    frame,
                    anchor: pos,
                    geometry: Geometry::anchored(mode, pos),
                    dragged: false,
                };
                Ok(SessionUpdate::default())
            }
        }
    }

    /// Active track first, then the nearest open track if enabled, else a new track.
    fn track_target(&self, type_id: TypeId, pos: Point) -> TrackTarget {
        if let Some(track) = self.active_track
            && self.tracks.contains_track(track)
            && self.store.get(track).is_some_and(|t| t.type_id == type_id)
        {
            return TrackTarget::Existing(track);
        }
        if self.config.connect_nearest
            && let Some((track, _)) = self.tracks.nearest_track(
                &self.store,
                type_id,
                pos,
                self.frame,
                NearestPolicy::Uncapped,
            )
        {
            return TrackTarget::Existing(track);
        }
        TrackTarget::New(type_id)
    }

    fn press_polygon(&mut self, type_id: TypeId, pos: Point) -> AnnotrackResult<SessionUpdate> {
        let radius = self.config.polygon_close_radius;
        match &mut self.interaction {
            Interaction::Polygon {
                type_id: pending,
                points,
                hover,
                ..
            } if *pending == type_id => {
                let closes = points.len() >= 3 && points[0].distance(pos) <= radius;
                if !closes {
                    points.push(pos);
                    *hover = None;
                    return Ok(SessionUpdate::default());
                }
            }
            _ => {
                self.interaction = Interaction::Polygon {
                    type_id,
                    frame: self.frame,
                    points: vec![pos],
                    hover: None,
                };
                return Ok(SessionUpdate::default());
            }
        }
        self.close_polygon()
    }

    /// Commit the polygon being built. It needs at least three vertices.
    pub fn close_polygon(&mut self) -> AnnotrackResult<SessionUpdate> {
        let Interaction::Polygon {
            type_id,
            frame,
            points,
            ..
        } = &self.interaction
        else {
            return Err(AnnotrackError::validation("no polygon is being drawn"));
        };
        if points.len() < 3 {
            return Err(AnnotrackError::validation(format!(
                "a polygon needs at least 3 vertices, got {}",
                points.len()
            )));
        }
        let (type_id, frame) = (*type_id, *frame);
        let geometry = Geometry::Polygon(PolygonGeom {
            points: points.clone(),
            closed: true,
        });
        let update = self.add_marker(type_id, frame, geometry)?;
        self.interaction = Interaction::Idle;
        Ok(update)
    }

    /// Pointer moved with the button held.
    pub fn drag(&mut self, pos: Point) -> AnnotrackResult<SessionUpdate> {
        match &mut self.interaction {
            Interaction::Drawing {
                anchor,
                geometry,
                dragged,
                ..
            } => {
                geometry.drag_to(*anchor, pos);
                *dragged = true;
                Ok(SessionUpdate::default())
            }
            Interaction::Polygon { hover, .. } => {
                *hover = Some(pos);
                Ok(SessionUpdate::default())
            }
            Interaction::Dragging { id, last, moved } => {
                let id = *id;
                let delta: Vec2 = pos - *last;
                *last = pos;
                *moved = true;
                let mut geometry = self
                    .store
                    .require(id)?
                    .marker()
                    .map(|m| m.geometry.clone())
                    .ok_or_else(|| {
                        AnnotrackError::validation(format!("entity {} has no geometry", id.0))
                    })?;
                geometry.translate(delta);
                self.set_geometry(id, geometry)
            }
            Interaction::Idle => Ok(SessionUpdate::default()),
        }
    }

    /// Pointer released. Commits a drawn shape or finishes a drag.
    pub fn release(&mut self) -> AnnotrackResult<SessionUpdate> {
        match std::mem::take(&mut self.interaction) {
            Interaction::Drawing {
                type_id,
                frame,
                geometry,
                dragged,
                ..
            } => {
                // A click without a drag would leave a zero-size shape.
                if !dragged {
                    return Ok(SessionUpdate::default());
                }
                self.add_marker(type_id, frame, geometry)
            }
            polygon @ Interaction::Polygon { .. } => {
                self.interaction = polygon;
                Ok(SessionUpdate::default())
            }
            Interaction::Dragging { id, moved, .. } => {
                self.end_display_drag(id);
                if moved {
                    self.bus.emit(&SessionEvent::EntityMoveFinished { id });
                }
                Ok(SessionUpdate::default())
            }
            Interaction::Idle => Ok(SessionUpdate::default()),
        }
    }

    /// Pointer moved without a button. Only polygons react.
    pub fn hover(&mut self, pos: Point) {
        if let Interaction::Polygon { hover, .. } = &mut self.interaction {
            *hover = Some(pos);
        }
    }

    /// Drop uncommitted state. Returns true if anything was discarded.
    pub fn cancel(&mut self) -> bool {
        match std::mem::take(&mut self.interaction) {
            Interaction::Idle => false,
            Interaction::Dragging { id, moved, .. } => {
                self.end_display_drag(id);
                if moved {
                    self.bus.emit(&SessionEvent::EntityMoveFinished { id });
                }
                true
            }
            Interaction::Drawing { .. } | Interaction::Polygon { .. } => {
                tracing::debug!("pending drawing discarded");
                true
            }
        }
    }

    fn start_drag(&mut self, id: EntityId, pos: Point) {
        let shown = self.displayed_as(id);
        self.display_mut().begin_drag(shown);
        self.interaction = Interaction::Dragging {
            id,
            last: pos,
            moved: false,
        };
    }

    fn end_display_drag(&mut self, id: EntityId) {
        let shown = self.displayed_as(id);
        self.display_mut().end_drag(shown);
    }

    /// Display item an entity is drawn in: track points live in their track's item.
    fn displayed_as(&self, id: EntityId) -> EntityId {
        self.tracks.track_of(id).unwrap_or(id)
    }

    fn require_active_type(&self) -> AnnotrackResult<TypeId> {
        let id = self
            .active_type
            .ok_or_else(|| AnnotrackError::validation("no active marker type selected"))?;
        self.store.types().require(id)?;
        Ok(id)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/interaction.rs"]
mod tests;
