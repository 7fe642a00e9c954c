use std::collections::{BTreeMap, HashMap};

use crate::{
    foundation::core::{EntityId, FrameIndex, FrameSpan, Point, TrackWindow, TypeId},
    foundation::diagnostics::{Diagnostics, Warning},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{
        entity::Entity,
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
    store::entity_store::EntityStore,
    tracks::connectivity::{Segment, connectivity},
};

#[derive(Clone, Debug, PartialEq)]
/// Cached view of one track member.
pub struct TrackPoint {
    /// Point position.
    pub pos: Point,
    /// Backing point entity.
    pub entity: EntityId,
    /// Entity-level style override.
    pub style: Option<String>,
    /// Entity-level text override.
    pub text: Option<String>,
}

impl TrackPoint {
    fn from_entity(e: &Entity) -> Option<Self> {
        Some(Self {
            pos: e.point()?,
            entity: e.id,
            style: e.style.clone(),
            text: e.text.clone(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where [`TrackAggregator::add_point`] puts the point.
pub enum TrackTarget {
    /// Append to (or move within) an existing track.
    Existing(EntityId),
    /// Start a new track of this type.
    New(TypeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    pub track: EntityId,
    pub entity: EntityId,
    /// The track row was created by this call.
    pub created_track: bool,
    /// The frame already had a point, which was moved instead of inserted.
    pub moved: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Result of removing points from a track.
pub enum RemoveOutcome {
    /// The track still has points.
    PointsRemoved {
        track: EntityId,
        removed: Vec<EntityId>,
    },
    /// The last point went away and the track was deleted with it.
    TrackDeleted {
        track: EntityId,
        removed: Vec<EntityId>,
    },
}

impl RemoveOutcome {
    pub fn track(&self) -> EntityId {
        match self {
            RemoveOutcome::PointsRemoved { track, .. } | RemoveOutcome::TrackDeleted { track, .. } => {
                *track
            }
        }
    }

    /// Point entities removed, in frame order.
    pub fn removed(&self) -> &[EntityId] {
        match self {
            RemoveOutcome::PointsRemoved { removed, .. }
            | RemoveOutcome::TrackDeleted { removed, .. } => removed,
        }
    }

    pub fn track_deleted(&self) -> bool {
        matches!(self, RemoveOutcome::TrackDeleted { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Distance rule for picking the track a new point continues.
pub enum NearestPolicy {
    /// Any distance qualifies. Used by the interactive track tool.
    Uncapped,
    /// Only tracks within the given distance qualify. Used for detection assignment.
    Capped(f64),
}

impl NearestPolicy {
    fn admits(self, distance: f64) -> bool {
        match self {
            NearestPolicy::Uncapped => true,
            NearestPolicy::Capped(max) => distance <= max,
        }
    }
}

/// Per-track sparse frame maps, kept consistent with the entity store.
///
/// Every mutation writes through to the store first, so a failed call leaves both sides as they
/// were. A track whose last point is removed is deleted in the same call.
#[derive(Clone, Debug)]
pub struct TrackAggregator {
    tracks: BTreeMap<EntityId, BTreeMap<FrameIndex, TrackPoint>>,
    owner: HashMap<EntityId, EntityId>,
    current: FrameIndex,
    view: FrameSpan,
    window: TrackWindow,
}

impl Default for TrackAggregator {
    fn default() -> Self {
        Self::new(TrackWindow::default())
    }
}

impl TrackAggregator {
    pub fn new(window: TrackWindow) -> Self {
        Self {
            tracks: BTreeMap::new(),
            owner: HashMap::new(),
            current: FrameIndex(0),
            view: FrameSpan::unbounded(),
            window,
        }
    }

    pub fn window(&self) -> TrackWindow {
        self.window
    }

    pub fn set_window(&mut self, window: TrackWindow) {
        self.window = window;
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.current
    }

    pub fn set_current_frame(&mut self, frame: FrameIndex) {
        self.current = frame;
    }

    /// Frames the viewer has loaded; trajectory drawing is clipped to it.
    pub fn view(&self) -> FrameSpan {
        self.view
    }

    pub fn set_view(&mut self, view: FrameSpan) {
        self.view = view;
    }

    /// Reconstruct every frame map from the store.
    ///
    /// Points whose track is missing are reported as orphans and left out. A second point on an
    /// already occupied frame is reported and left out. Tracks that end up with no points are
    /// deleted from the store; their ids are returned.
    #[tracing::instrument(skip(self, store, diagnostics))]
    pub fn rebuild(
        &mut self,
        store: &mut EntityStore,
        diagnostics: &mut Diagnostics,
    ) -> AnnotrackResult<Vec<EntityId>> {
        self.tracks.clear();
        self.owner.clear();

        for e in store.iter().filter(|e| e.is_track()) {
            self.tracks.insert(e.id, BTreeMap::new());
        }

        for e in store.iter() {
            let (Some(track), Some(frame)) = (e.track(), e.frame()) else {
                continue;
            };
            let Some(frames) = self.tracks.get_mut(&track) else {
                diagnostics.warn(Warning::OrphanTrackPoint {
                    entity: e.id,
                    track,
                });
                continue;
            };
            let Some(point) = TrackPoint::from_entity(e) else {
                continue;
            };
            if frames.contains_key(&frame) {
                diagnostics.warn(Warning::DuplicateTrackFrame {
                    track,
                    frame,
                    entity: e.id,
                });
                continue;
            }
            frames.insert(frame, point);
            self.owner.insert(e.id, track);
        }

        let empty: Vec<EntityId> = self
            .tracks
            .iter()
            .filter(|(_, frames)| frames.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in &empty {
            self.tracks.remove(id);
            store.remove(*id)?;
        }

        tracing::debug!(
            tracks = self.tracks.len(),
            dropped_empty = empty.len(),
            "track maps rebuilt"
        );
        Ok(empty)
    }

    // ---- lookups ----

    pub fn track_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn contains_track(&self, track: EntityId) -> bool {
        self.tracks.contains_key(&track)
    }

    pub fn points(&self, track: EntityId) -> Option<&BTreeMap<FrameIndex, TrackPoint>> {
        self.tracks.get(&track)
    }

    pub fn point_count(&self, track: EntityId) -> usize {
        self.tracks.get(&track).map_or(0, BTreeMap::len)
    }

    pub fn point_at(&self, track: EntityId, frame: FrameIndex) -> Option<&TrackPoint> {
        self.tracks.get(&track)?.get(&frame)
    }

    /// Track owning a point entity.
    pub fn track_of(&self, entity: EntityId) -> Option<EntityId> {
        self.owner.get(&entity).copied()
    }

    /// Point entities of a track in frame order.
    pub fn point_entities(&self, track: EntityId) -> Vec<EntityId> {
        self.tracks
            .get(&track)
            .map(|frames| frames.values().map(|p| p.entity).collect())
            .unwrap_or_default()
    }

    /// First and last observed frame.
    pub fn span(&self, track: EntityId) -> Option<FrameSpan> {
        let frames = self.tracks.get(&track)?;
        let (first, _) = frames.first_key_value()?;
        let (last, _) = frames.last_key_value()?;
        Some(FrameSpan {
            start: *first,
            end: *last,
        })
    }

    // ---- mutation ----

    /// Put a point of `target` at `frame`.
    ///
    /// If the track already has a point on that frame, the point is moved. A
    /// [`TrackTarget::New`] target creates the track row together with its first point.
    pub fn add_point(
        &mut self,
        store: &mut EntityStore,
        target: TrackTarget,
        frame: FrameIndex,
        pos: Point,
    ) -> AnnotrackResult<AddOutcome> {
        let (track, created_track) = match target {
            TrackTarget::Existing(track) => {
                if !self.tracks.contains_key(&track) {
                    return Err(AnnotrackError::not_found(format!("track {}", track.0)));
                }
                (track, false)
            }
            TrackTarget::New(type_id) => (store.insert_track(type_id)?, true),
        };

        if let Some(existing) = self.point_at(track, frame) {
            let entity = existing.entity;
            self.move_point(store, track, frame, pos)?;
            return Ok(AddOutcome {
                track,
                entity,
                created_track,
                moved: true,
            });
        }

        let entity = match store.insert_track_point(track, frame, pos) {
            Ok(id) => id,
            Err(e) => {
                if created_track {
                    store.remove(track)?;
                }
                return Err(e);
            }
        };
        self.tracks.entry(track).or_default().insert(
            frame,
            TrackPoint {
                pos,
                entity,
                style: None,
                text: None,
            },
        );
        self.owner.insert(entity, track);
        Ok(AddOutcome {
            track,
            entity,
            created_track,
            moved: false,
        })
    }

    /// Change the position of the point a track has on `frame`.
    pub fn move_point(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
        frame: FrameIndex,
        pos: Point,
    ) -> AnnotrackResult<EntityId> {
        let point = self
            .tracks
            .get_mut(&track)
            .and_then(|frames| frames.get_mut(&frame))
            .ok_or_else(|| {
                AnnotrackError::not_found(format!(
                    "track {} has no point at frame {}",
                    track.0, frame.0
                ))
            })?;
        store.modify(point.entity, |e| {
            if let Some(m) = e.marker_mut() {
                m.geometry = Geometry::Point(PointGeom { x: pos.x, y: pos.y });
            }
        })?;
        point.pos = pos;
        Ok(point.entity)
    }

    /// Re-read the cached position, style, and text of a point after it changed in the store.
    pub fn refresh_point(&mut self, store: &EntityStore, entity: EntityId) {
        let Some(track) = self.track_of(entity) else {
            return;
        };
        let Some(e) = store.get(entity) else {
            return;
        };
        let (Some(frame), Some(fresh)) = (e.frame(), TrackPoint::from_entity(e)) else {
            return;
        };
        if let Some(point) = self.tracks.get_mut(&track).and_then(|f| f.get_mut(&frame)) {
            *point = fresh;
        }
    }

    pub fn remove_point(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
        frame: FrameIndex,
    ) -> AnnotrackResult<RemoveOutcome> {
        let entity = self.point_at(track, frame).map(|p| p.entity).ok_or_else(|| {
            AnnotrackError::not_found(format!(
                "track {} has no point at frame {}",
                track.0, frame.0
            ))
        })?;
        store.remove(entity)?;
        if let Some(frames) = self.tracks.get_mut(&track) {
            frames.remove(&frame);
        }
        self.owner.remove(&entity);
        self.finish_removal(store, track, vec![entity])
    }

    /// Remove a point by entity id, whichever track holds it.
    ///
    /// Points that reference a track but were left out of the frame maps (orphans and duplicate
    /// frames) are removed from the store directly.
    pub fn remove_entity(
        &mut self,
        store: &mut EntityStore,
        entity: EntityId,
    ) -> AnnotrackResult<RemoveOutcome> {
        let e = store.require(entity)?;
        let Some(referenced) = e.track() else {
            return Err(AnnotrackError::validation(format!(
                "entity {} is not a track point",
                entity.0
            )));
        };
        let frame = e.frame();
        match (self.track_of(entity), frame) {
            (Some(track), Some(frame)) => self.remove_point(store, track, frame),
            _ => {
                store.remove(entity)?;
                Ok(RemoveOutcome::PointsRemoved {
                    track: referenced,
                    removed: vec![entity],
                })
            }
        }
    }

    /// Remove every point at or after `from`.
    pub fn remove_after(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
        from: FrameIndex,
    ) -> AnnotrackResult<RemoveOutcome> {
        let frames = self
            .tracks
            .get_mut(&track)
            .ok_or_else(|| AnnotrackError::not_found(format!("track {}", track.0)))?;
        let tail = frames.split_off(&from);
        let mut removed = Vec::with_capacity(tail.len());
        for point in tail.values() {
            store.remove(point.entity)?;
            self.owner.remove(&point.entity);
            removed.push(point.entity);
        }
        self.finish_removal(store, track, removed)
    }

    /// Remove a track with all its points.
    pub fn delete_track(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
    ) -> AnnotrackResult<RemoveOutcome> {
        self.remove_after(store, track, FrameIndex(0))
    }

    fn finish_removal(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
        removed: Vec<EntityId>,
    ) -> AnnotrackResult<RemoveOutcome> {
        if self.tracks.get(&track).is_some_and(BTreeMap::is_empty) {
            self.tracks.remove(&track);
            store.remove(track)?;
            tracing::debug!(track = track.0, "last point removed, track deleted");
            return Ok(RemoveOutcome::TrackDeleted { track, removed });
        }
        Ok(RemoveOutcome::PointsRemoved { track, removed })
    }

    /// Move the points at and after `at_entity`'s frame into a new track of the same type.
    ///
    /// Returns the new track id. The original track keeps everything before the split frame.
    #[tracing::instrument(skip(self, store))]
    pub fn split(
        &mut self,
        store: &mut EntityStore,
        track: EntityId,
        at_entity: EntityId,
    ) -> AnnotrackResult<EntityId> {
        let frames = self
            .tracks
            .get(&track)
            .ok_or_else(|| AnnotrackError::not_found(format!("track {}", track.0)))?;
        let at = frames
            .iter()
            .find(|(_, p)| p.entity == at_entity)
            .map(|(f, _)| *f)
            .ok_or_else(|| {
                AnnotrackError::not_found(format!(
                    "entity {} is not a point of track {}",
                    at_entity.0, track.0
                ))
            })?;
        if frames.len() == 1 {
            return Err(AnnotrackError::split_not_possible(format!(
                "entity {} is the only point of track {}",
                at_entity.0, track.0
            )));
        }
        if frames.first_key_value().is_some_and(|(first, _)| *first == at) {
            return Err(AnnotrackError::split_not_possible(format!(
                "entity {} is the first point of track {}; nothing would remain",
                at_entity.0, track.0
            )));
        }

        let source = store.require(track)?.clone();
        let new_track = store.insert_track(source.type_id)?;
        store.modify(new_track, |e| {
            e.style = source.style.clone();
            e.text = source.text.clone();
        })?;

        let tail = match self.tracks.get_mut(&track) {
            Some(frames) => frames.split_off(&at),
            None => BTreeMap::new(),
        };
        for point in tail.values() {
            store.modify(point.entity, |e| {
                if let Some(m) = e.marker_mut() {
                    m.track = Some(new_track);
                }
            })?;
            self.owner.insert(point.entity, new_track);
        }
        tracing::debug!(
            track = track.0,
            new_track = new_track.0,
            moved = tail.len(),
            "track split"
        );
        self.tracks.insert(new_track, tail);
        Ok(new_track)
    }

    /// Move every point of `b` into `a` and delete `b`.
    ///
    /// Fails with [`AnnotrackError::FrameConflict`] listing the shared frames; nothing is changed
    /// in that case. Moved points take `a`'s type.
    #[tracing::instrument(skip(self, store))]
    pub fn merge(&mut self, store: &mut EntityStore, a: EntityId, b: EntityId) -> AnnotrackResult<()> {
        if a == b {
            return Err(AnnotrackError::validation("cannot merge a track with itself"));
        }
        let fa = self
            .tracks
            .get(&a)
            .ok_or_else(|| AnnotrackError::not_found(format!("track {}", a.0)))?;
        let fb = self
            .tracks
            .get(&b)
            .ok_or_else(|| AnnotrackError::not_found(format!("track {}", b.0)))?;
        let frames: Vec<FrameIndex> = fb.keys().filter(|f| fa.contains_key(f)).copied().collect();
        if !frames.is_empty() {
            return Err(AnnotrackError::FrameConflict { frames });
        }

        let type_a = store.require(a)?.type_id;
        let moved = self.tracks.remove(&b).unwrap_or_default();
        let count = moved.len();
        for (frame, point) in moved {
            store.modify(point.entity, |e| {
                e.type_id = type_a;
                if let Some(m) = e.marker_mut() {
                    m.track = Some(a);
                }
            })?;
            self.owner.insert(point.entity, a);
            self.tracks.entry(a).or_default().insert(frame, point);
        }
        store.remove(b)?;
        tracing::debug!(into = a.0, from = b.0, moved = count, "tracks merged");
        Ok(())
    }

    // ---- drawing queries ----

    /// Solid and gap segments over the whole track.
    pub fn connectivity(&self, track: EntityId) -> Vec<Segment> {
        self.tracks
            .get(&track)
            .map(|frames| connectivity(frames.keys().copied()))
            .unwrap_or_default()
    }

    /// Whether the track is drawn at the current frame.
    pub fn is_visible(&self, track: EntityId) -> bool {
        self.is_visible_at(track, self.current)
    }

    /// A track is eligible at `frame` if it has a point there, or `frame` falls inside its
    /// observed span widened by the trailing and leading margins.
    pub fn is_visible_at(&self, track: EntityId, frame: FrameIndex) -> bool {
        let Some(frames) = self.tracks.get(&track) else {
            return false;
        };
        if frames.contains_key(&frame) {
            return true;
        }
        self.span(track)
            .is_some_and(|span| self.window.widen(span).contains(frame))
    }

    /// Points inside `[frame - trailing, frame + leading]`, clipped to the view.
    pub fn points_in_window(
        &self,
        track: EntityId,
        frame: FrameIndex,
    ) -> Vec<(FrameIndex, &TrackPoint)> {
        let Some(frames) = self.tracks.get(&track) else {
            return Vec::new();
        };
        let around = self.window.around(frame);
        let start = around.start.max(self.view.start);
        let end = around.end.min(self.view.end);
        if start > end {
            return Vec::new();
        }
        frames.range(start..=end).map(|(f, p)| (*f, p)).collect()
    }

    /// Segments between the points returned by [`Self::points_in_window`].
    pub fn window_segments(&self, track: EntityId, frame: FrameIndex) -> Vec<Segment> {
        connectivity(self.points_in_window(track, frame).into_iter().map(|(f, _)| f))
    }

    /// Latest point at or before `frame`, else the earliest point.
    pub fn last_known(&self, track: EntityId, frame: FrameIndex) -> Option<(FrameIndex, &TrackPoint)> {
        let frames = self.tracks.get(&track)?;
        frames
            .range(..=frame)
            .next_back()
            .or_else(|| frames.iter().next())
            .map(|(f, p)| (*f, p))
    }

    /// Track of `type_id` whose last-known point is closest to `pos`.
    ///
    /// Tracks that already have a point on `frame` are skipped. Ties go to the lower track id.
    pub fn nearest_track(
        &self,
        store: &EntityStore,
        type_id: TypeId,
        pos: Point,
        frame: FrameIndex,
        policy: NearestPolicy,
    ) -> Option<(EntityId, f64)> {
        let mut best: Option<(EntityId, f64)> = None;
        for (track, last) in self.open_tracks_of(store, type_id, frame) {
            let distance = last.distance(pos);
            if !policy.admits(distance) {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((track, distance));
            }
        }
        best
    }

    /// Continue tracks with a frame of detections.
    ///
    /// Candidate tracks are those of `type_id` without a point on `frame`. Pairs are matched
    /// closest first, each track and detection used at most once, and only within
    /// `max_distance`. Unmatched detections start new tracks. Outcomes follow detection order.
    pub fn assign_detections(
        &mut self,
        store: &mut EntityStore,
        type_id: TypeId,
        frame: FrameIndex,
        detections: &[Point],
        max_distance: f64,
    ) -> AnnotrackResult<Vec<AddOutcome>> {
        if max_distance.is_nan() || max_distance < 0.0 {
            return Err(AnnotrackError::validation(
                "assignment distance must be a non-negative number",
            ));
        }
        let t = store.types().require(type_id)?;
        if t.mode != Mode::Track {
            return Err(AnnotrackError::incompatible_mode(format!(
                "type '{}' is not a track type",
                t.name
            )));
        }

        let candidates = self.open_tracks_of(store, type_id, frame);
        let policy = NearestPolicy::Capped(max_distance);
        let mut pairs = Vec::new();
        for (ti, (_, last)) in candidates.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let distance = last.distance(*det);
                if policy.admits(distance) {
                    pairs.push((distance, ti, di));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut track_taken = vec![false; candidates.len()];
        let mut assigned: Vec<Option<EntityId>> = vec![None; detections.len()];
        for (_, ti, di) in pairs {
            if track_taken[ti] || assigned[di].is_some() {
                continue;
            }
            track_taken[ti] = true;
            assigned[di] = Some(candidates[ti].0);
        }

        let mut out = Vec::with_capacity(detections.len());
        for (det, slot) in detections.iter().zip(assigned) {
            let target = match slot {
                Some(track) => TrackTarget::Existing(track),
                None => TrackTarget::New(type_id),
            };
            out.push(self.add_point(store, target, frame, *det)?);
        }
        tracing::debug!(
            frame = frame.0,
            detections = detections.len(),
            new_tracks = out.iter().filter(|o| o.created_track).count(),
            "detections assigned"
        );
        Ok(out)
    }

    fn open_tracks_of(
        &self,
        store: &EntityStore,
        type_id: TypeId,
        frame: FrameIndex,
    ) -> Vec<(EntityId, Point)> {
        self.tracks
            .iter()
            .filter(|(track, frames)| {
                !frames.contains_key(&frame)
                    && store.get(**track).is_some_and(|e| e.type_id == type_id)
            })
            .filter_map(|(track, _)| {
                self.last_known(*track, frame)
                    .map(|(_, p)| (*track, p.pos))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tracks/aggregator.rs"]
mod tests;
