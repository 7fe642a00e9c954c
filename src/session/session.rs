use std::fmt;

use crate::{
    counter::Counter,
    foundation::core::{EntityId, FrameIndex, Point, TypeId},
    foundation::diagnostics::{Diagnostics, Warning},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{
        entity::{Entity, EntityKind},
        geometry::Geometry,
        marker_type::{MarkerType, Mode},
    },
    registry::{
        retype::{self, RetypeOutcome},
        types::TypeDefinition,
    },
    session::{config::SessionConfig, interaction::Interaction},
    store::{
        entity_store::{EntityStore, SaveReport},
        persistence::PersistenceBackend,
    },
    style::resolver::{EffectiveStyle, StyleResolver},
    sync::display::{DisplayOp, DisplaySink, DisplaySynchronizer, Scene},
    tool::{
        bus::{EventBus, ListenerId, SessionEvent},
        machine::{ModuleId, Tool, ToolBox},
    },
    tracks::aggregator::{AddOutcome, RemoveOutcome, TrackAggregator, TrackTarget},
    tree::index::{NodeKey, TreeChange, TreeIndex},
};

/// Module the session's own pointer interaction belongs to.
pub const ANNOTATION_MODULE: ModuleId = ModuleId(0);

#[derive(Clone, Debug, Default, PartialEq)]
/// What one session operation changed, for the caller to mirror.
pub struct SessionUpdate {
    pub created: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub display: Vec<DisplayOp>,
    pub tree: Vec<TreeChange>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.removed.is_empty()
            && self.display.is_empty()
            && self.tree.is_empty()
    }

    fn absorb(&mut self, other: SessionUpdate) {
        self.created.extend(other.created);
        self.removed.extend(other.removed);
        self.display.extend(other.display);
        self.tree.extend(other.tree);
    }
}

/// Composition root owning every component of an annotation project.
///
/// Each mutating call runs the whole pipeline before it returns: the store changes, track maps
/// follow, the display is diffed for the current frame, the tree is patched, counters are
/// adjusted, and events go out on the bus. Nothing is written to the backend until a checkpoint
/// (tool deactivation, frame change, or [`Session::save`]).
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) store: EntityStore,
    pub(crate) tracks: TrackAggregator,
    resolver: StyleResolver,
    display: DisplaySynchronizer,
    sinks: Vec<Box<dyn DisplaySink>>,
    pub(crate) tree: TreeIndex,
    counter: Counter,
    pub(crate) bus: EventBus,
    pub(crate) tools: ToolBox,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) frame: FrameIndex,
    pub(crate) active_type: Option<TypeId>,
    pub(crate) active_track: Option<EntityId>,
    pub(crate) interaction: Interaction,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("frame", &self.frame)
            .field("entities", &self.store.len())
            .field("types", &self.store.types().len())
            .field("displayed", &self.display.len())
            .field("tree_nodes", &self.tree.len())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Empty project on an in-memory backend.
    pub fn new(config: SessionConfig) -> AnnotrackResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, EntityStore::in_memory()))
    }

    /// Load a project from `backend` and derive every view from it.
    #[tracing::instrument(skip(config, backend))]
    pub fn open(
        config: SessionConfig,
        backend: Box<dyn PersistenceBackend>,
    ) -> AnnotrackResult<Self> {
        config.validate()?;
        let store = EntityStore::open(backend)?;
        let mut session = Self::assemble(config, store);
        let dropped = session
            .tracks
            .rebuild(&mut session.store, &mut session.diagnostics)?;
        if !dropped.is_empty() {
            tracing::debug!(dropped = dropped.len(), "empty tracks removed on open");
        }
        session.counter = Counter::rebuild(&session.store);
        session.tree = TreeIndex::build(&session.store);
        session.sync_display();
        tracing::debug!(
            entities = session.store.len(),
            tracks = session.tracks.track_ids().count(),
            warnings = session.diagnostics.warnings().len(),
            "session opened"
        );
        Ok(session)
    }

    fn assemble(config: SessionConfig, store: EntityStore) -> Self {
        let mut tools = ToolBox::new();
        tools.register(ANNOTATION_MODULE);
        let tracks = TrackAggregator::new(config.window());
        Self {
            config,
            store,
            tracks,
            resolver: StyleResolver::new(),
            display: DisplaySynchronizer::new(),
            sinks: Vec::new(),
            tree: TreeIndex::default(),
            counter: Counter::new(),
            bus: EventBus::new(),
            tools,
            diagnostics: Diagnostics::new(),
            frame: FrameIndex(0),
            active_type: None,
            active_track: None,
            interaction: Interaction::default(),
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn tracks(&self) -> &TrackAggregator {
        &self.tracks
    }

    pub fn display(&self) -> &DisplaySynchronizer {
        &self.display
    }

    pub fn tree(&self) -> &TreeIndex {
        &self.tree
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    pub fn tools(&self) -> &ToolBox {
        &self.tools
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.diagnostics.drain()
    }

    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    pub fn active_type(&self) -> Option<TypeId> {
        self.active_type
    }

    pub fn active_track(&self) -> Option<EntityId> {
        self.active_track
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            store: &self.store,
            tracks: &self.tracks,
            counter: &self.counter,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SessionEvent) + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Receive every display op from now on.
    pub fn add_display_sink(&mut self, sink: Box<dyn DisplaySink>) {
        self.sinks.push(sink);
    }

    pub fn resolve_style(&mut self, id: EntityId) -> AnnotrackResult<EffectiveStyle> {
        self.resolver.resolve_in(&self.store, id, &mut self.diagnostics)
    }

    // ---- frames and checkpoints ----

    /// Move to another frame. Drops any uncommitted drawing and, if configured, flushes first.
    pub fn set_frame(&mut self, frame: FrameIndex) -> AnnotrackResult<SessionUpdate> {
        if frame == self.frame && self.display.frame() == Some(frame) {
            return Ok(SessionUpdate::default());
        }
        if self.config.autosave_on_frame_change {
            self.checkpoint("frame change")?;
        }
        self.cancel();
        self.frame = frame;
        self.tracks.set_current_frame(frame);
        Ok(SessionUpdate {
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    /// Diff the display against the current frame.
    pub fn refresh(&mut self) -> Vec<DisplayOp> {
        self.sync_display()
    }

    /// Flush every pending change to the backend.
    pub fn save(&mut self) -> AnnotrackResult<SaveReport> {
        self.store.save()
    }

    pub(crate) fn checkpoint(&mut self, reason: &str) -> AnnotrackResult<Option<SaveReport>> {
        if !self.store.is_dirty() {
            return Ok(None);
        }
        let report = self.store.save()?;
        tracing::debug!(reason, ?report, "checkpoint");
        Ok(Some(report))
    }

    // ---- tools ----

    pub fn register_module(&mut self, module: ModuleId) {
        self.tools.register(module);
    }

    /// Explicit tool selection on `module`.
    ///
    /// Other modules deactivate. If the annotation module loses its tool, pending drawing is
    /// discarded and a checkpoint runs.
    pub fn select_tool(&mut self, module: ModuleId, tool: Tool) -> AnnotrackResult<Vec<ModuleId>> {
        let before = self.annotation_tool();
        let deactivated = self.tools.select(module, tool, &mut self.bus)?;
        self.after_tool_change(before)?;
        Ok(deactivated)
    }

    pub fn press_temporary(&mut self, module: ModuleId, tool: Tool) -> AnnotrackResult<()> {
        let before = self.annotation_tool();
        self.tools
            .machine_mut(module)
            .ok_or_else(|| AnnotrackError::not_found(format!("tool module {module}")))?
            .press_temporary(tool);
        self.after_tool_change(before)
    }

    pub fn release_temporary(&mut self, module: ModuleId) -> AnnotrackResult<()> {
        let before = self.annotation_tool();
        self.tools
            .machine_mut(module)
            .ok_or_else(|| AnnotrackError::not_found(format!("tool module {module}")))?
            .release_temporary();
        self.after_tool_change(before)
    }

    /// Tool the pointer interaction currently follows.
    pub fn annotation_tool(&self) -> Tool {
        self.tools
            .machine(ANNOTATION_MODULE)
            .map_or(Tool::Inactive, |m| m.active())
    }

    fn after_tool_change(&mut self, before: Tool) -> AnnotrackResult<()> {
        let after = self.annotation_tool();
        if after != before {
            self.cancel();
        }
        if before.is_active() && !after.is_active() {
            self.checkpoint("tool deactivated")?;
        }
        Ok(())
    }

    /// Type used by the add and retype tools.
    pub fn set_active_type(&mut self, type_id: Option<TypeId>) -> AnnotrackResult<()> {
        if let Some(t) = type_id {
            self.store.types().require(t)?;
        }
        if self.active_type != type_id {
            self.cancel();
            self.active_track = None;
        }
        self.active_type = type_id;
        Ok(())
    }

    /// Track that track clicks extend.
    pub fn set_active_track(&mut self, track: Option<EntityId>) -> AnnotrackResult<()> {
        if let Some(t) = track
            && !self.tracks.contains_track(t)
        {
            return Err(AnnotrackError::not_found(format!("track {}", t.0)));
        }
        self.active_track = track;
        Ok(())
    }

    // ---- types ----

    /// Create a type and give it a tree root.
    pub fn create_type(&mut self, name: &str, mode: Mode, color: &str) -> AnnotrackResult<TypeId> {
        let t = self.store.create_type(name, mode, color)?;
        self.tree.upsert_type(&self.store, t.id);
        tracing::debug!(type_id = t.id.0, name = %t.name, mode = %t.mode, "type created");
        Ok(t.id)
    }

    /// Idempotent bulk import. Returns the ids of types that were created.
    pub fn define_types(&mut self, defs: &[TypeDefinition]) -> AnnotrackResult<Vec<TypeId>> {
        let created = self.store.define_types(defs)?;
        for id in &created {
            self.tree.upsert_type(&self.store, *id);
        }
        Ok(created)
    }

    pub fn rename_type(&mut self, id: TypeId, name: &str) -> AnnotrackResult<SessionUpdate> {
        let name = name.to_string();
        self.edit_type(id, |t| t.name = name)
    }

    pub fn set_type_color(&mut self, id: TypeId, color: &str) -> AnnotrackResult<SessionUpdate> {
        let color = color.to_string();
        self.edit_type(id, |t| t.color = color)
    }

    pub fn set_type_style(
        &mut self,
        id: TypeId,
        style: Option<String>,
    ) -> AnnotrackResult<SessionUpdate> {
        self.edit_type(id, |t| t.style = style)
    }

    pub fn set_type_text(
        &mut self,
        id: TypeId,
        text: Option<String>,
    ) -> AnnotrackResult<SessionUpdate> {
        self.edit_type(id, |t| t.text = text)
    }

    pub fn set_type_hidden(&mut self, id: TypeId, hidden: bool) -> AnnotrackResult<SessionUpdate> {
        self.edit_type(id, |t| t.hidden = hidden)
    }

    fn edit_type(
        &mut self,
        id: TypeId,
        f: impl FnOnce(&mut MarkerType),
    ) -> AnnotrackResult<SessionUpdate> {
        self.store.update_type(id, f)?;
        let tree = self.tree.upsert_type(&self.store, id);
        Ok(SessionUpdate {
            display: self.sync_display(),
            tree,
            ..SessionUpdate::default()
        })
    }

    /// Switch a type's mode, deleting its entities. Needs `confirm` if it has any.
    pub fn change_mode(
        &mut self,
        type_id: TypeId,
        mode: Mode,
        confirm: bool,
    ) -> AnnotrackResult<SessionUpdate> {
        let outcome = retype::change_mode(&mut self.store, &mut self.tracks, type_id, mode, confirm)?;
        self.cancel();
        Ok(self.after_retype(type_id, outcome))
    }

    /// Delete a type, optionally moving its entities to a type of the same mode.
    pub fn delete_type(
        &mut self,
        type_id: TypeId,
        reassign_to: Option<TypeId>,
    ) -> AnnotrackResult<SessionUpdate> {
        let outcome = retype::delete_type(&mut self.store, &mut self.tracks, type_id, reassign_to)?;
        self.cancel();
        if self.active_type == Some(type_id) {
            self.active_type = None;
        }
        let mut update = self.after_retype(type_id, outcome);
        update.tree.extend(self.tree.remove_type(type_id));
        self.counter.remove_type(type_id);
        Ok(update)
    }

    fn after_retype(&mut self, type_id: TypeId, outcome: RetypeOutcome) -> SessionUpdate {
        let mut update = SessionUpdate::default();
        for id in &outcome.removed {
            update
                .tree
                .extend(self.tree.delete_entry(&self.store, NodeKey::Entity(*id)));
            self.bus.emit(&SessionEvent::EntityRemoved { id: *id, type_id });
        }
        for id in &outcome.changed {
            update.tree.extend(self.tree.update_entity(&self.store, *id));
        }
        if self.active_track.is_some_and(|t| !self.tracks.contains_track(t)) {
            self.active_track = None;
        }
        update.tree.extend(self.tree.upsert_type(&self.store, type_id));
        self.counter = Counter::rebuild(&self.store);
        update.removed = outcome.removed;
        update.display = self.sync_display();
        update
    }

    // ---- entities ----

    /// Create a standalone marker.
    pub fn add_marker(
        &mut self,
        type_id: TypeId,
        frame: FrameIndex,
        geometry: Geometry,
    ) -> AnnotrackResult<SessionUpdate> {
        let id = self.store.create(type_id, frame, geometry)?;
        self.counter.increment(type_id);
        let tree = self.tree.update_entity(&self.store, id);
        self.bus.emit(&SessionEvent::EntityAdded {
            id,
            type_id,
            frame: Some(frame),
        });
        Ok(SessionUpdate {
            created: vec![id],
            removed: Vec::new(),
            display: self.sync_display(),
            tree,
        })
    }

    /// Add or move a track point. Returns the aggregator outcome with the update.
    pub fn add_track_point(
        &mut self,
        target: TrackTarget,
        frame: FrameIndex,
        pos: Point,
    ) -> AnnotrackResult<(AddOutcome, SessionUpdate)> {
        let outcome = self.tracks.add_point(&mut self.store, target, frame, pos)?;
        let update = self.after_track_add(outcome, frame)?;
        Ok((outcome, update))
    }

    /// Continue open tracks with a frame of detections, capped by the configured distance.
    pub fn assign_detections(
        &mut self,
        type_id: TypeId,
        frame: FrameIndex,
        detections: &[Point],
    ) -> AnnotrackResult<(Vec<AddOutcome>, SessionUpdate)> {
        let outcomes = self.tracks.assign_detections(
            &mut self.store,
            type_id,
            frame,
            detections,
            self.config.assign_max_distance,
        )?;
        let mut update = SessionUpdate::default();
        for outcome in &outcomes {
            update.absorb(self.after_track_add(*outcome, frame)?);
        }
        Ok((outcomes, update))
    }

    fn after_track_add(
        &mut self,
        outcome: AddOutcome,
        frame: FrameIndex,
    ) -> AnnotrackResult<SessionUpdate> {
        let mut update = SessionUpdate::default();
        let type_id = self.store.require(outcome.track)?.type_id;
        if outcome.created_track {
            self.counter.increment(type_id);
            update.created.push(outcome.track);
            update
                .tree
                .extend(self.tree.update_entity(&self.store, outcome.track));
            self.bus.emit(&SessionEvent::EntityAdded {
                id: outcome.track,
                type_id,
                frame: None,
            });
        }
        update
            .tree
            .extend(self.tree.update_entity(&self.store, outcome.entity));
        if outcome.moved {
            self.bus.emit(&SessionEvent::EntityMoved { id: outcome.entity });
            self.bus
                .emit(&SessionEvent::EntityMoveFinished { id: outcome.entity });
        } else {
            update.created.push(outcome.entity);
            self.bus.emit(&SessionEvent::EntityAdded {
                id: outcome.entity,
                type_id,
                frame: Some(frame),
            });
        }
        update.display = self.sync_display();
        Ok(update)
    }

    /// Replace an entity's geometry. Track points only accept point geometry.
    pub fn set_geometry(
        &mut self,
        id: EntityId,
        geometry: Geometry,
    ) -> AnnotrackResult<SessionUpdate> {
        let e = self.store.require(id)?;
        match (e.track(), e.frame()) {
            (Some(track), Some(frame)) if self.tracks.track_of(id) == Some(track) => {
                let Geometry::Point(p) = geometry else {
                    return Err(AnnotrackError::incompatible_mode(
                        "track points only take point geometry",
                    ));
                };
                self.tracks
                    .move_point(&mut self.store, track, frame, Point::new(p.x, p.y))?;
            }
            _ => self.store.update(id, |e| {
                if let Some(m) = e.marker_mut() {
                    m.geometry = geometry;
                }
            })?,
        }
        self.bus.emit(&SessionEvent::EntityMoved { id });
        Ok(SessionUpdate {
            tree: self.tree.update_entity(&self.store, id),
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    pub fn set_entity_style(
        &mut self,
        id: EntityId,
        style: Option<String>,
    ) -> AnnotrackResult<SessionUpdate> {
        self.store.set_style(id, style)?;
        self.tracks.refresh_point(&self.store, id);
        Ok(SessionUpdate {
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    pub fn set_entity_text(
        &mut self,
        id: EntityId,
        text: Option<String>,
    ) -> AnnotrackResult<SessionUpdate> {
        self.store.set_text(id, text)?;
        self.tracks.refresh_point(&self.store, id);
        Ok(SessionUpdate {
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    pub fn set_track_hidden(&mut self, track: EntityId, hidden: bool) -> AnnotrackResult<SessionUpdate> {
        self.store.update(track, |e| {
            if let EntityKind::Track(info) = &mut e.kind {
                info.hidden = hidden;
            }
        })?;
        Ok(SessionUpdate {
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    /// Delete any entity. Track points go through the aggregator, which deletes the track
    /// with its last point; a track goes with all its points.
    pub fn delete_entity(&mut self, id: EntityId) -> AnnotrackResult<SessionUpdate> {
        let e = self.store.require(id)?;
        let type_id = e.type_id;
        let removal = if e.is_track() {
            Some(self.tracks.delete_track(&mut self.store, id)?)
        } else if e.track().is_some() {
            Some(self.tracks.remove_entity(&mut self.store, id)?)
        } else {
            self.store.delete(id)?;
            None
        };

        let mut update = SessionUpdate::default();
        match removal {
            None => {
                self.counter.decrement(type_id);
                update.removed.push(id);
            }
            Some(outcome) => update.absorb(self.after_track_removal(type_id, &outcome)),
        }
        for removed in &update.removed {
            update
                .tree
                .extend(self.tree.delete_entry(&self.store, NodeKey::Entity(*removed)));
            self.bus.emit(&SessionEvent::EntityRemoved {
                id: *removed,
                type_id,
            });
        }
        update.display = self.sync_display();
        Ok(update)
    }

    fn after_track_removal(&mut self, type_id: TypeId, outcome: &RemoveOutcome) -> SessionUpdate {
        let mut update = SessionUpdate {
            removed: outcome.removed().to_vec(),
            ..SessionUpdate::default()
        };
        if outcome.track_deleted() {
            self.counter.decrement(type_id);
            update.removed.push(outcome.track());
            if self.active_track == Some(outcome.track()) {
                self.active_track = None;
            }
        }
        update
    }

    /// Remove every point of `track` at or after `from`.
    pub fn delete_track_after(
        &mut self,
        track: EntityId,
        from: FrameIndex,
    ) -> AnnotrackResult<SessionUpdate> {
        let type_id = self.store.require(track)?.type_id;
        let outcome = self.tracks.remove_after(&mut self.store, track, from)?;
        let mut update = self.after_track_removal(type_id, &outcome);
        for removed in &update.removed {
            update
                .tree
                .extend(self.tree.delete_entry(&self.store, NodeKey::Entity(*removed)));
            self.bus.emit(&SessionEvent::EntityRemoved {
                id: *removed,
                type_id,
            });
        }
        if !outcome.track_deleted() {
            update.tree.extend(self.tree.refresh(&self.store, NodeKey::Entity(track)));
        }
        update.display = self.sync_display();
        Ok(update)
    }

    /// Move an entity to another type of the same mode. A track point retypes its whole track.
    pub fn retype_entity(&mut self, id: EntityId, new_type: TypeId) -> AnnotrackResult<SessionUpdate> {
        let e = self.store.require(id)?;
        let target = e.track().unwrap_or(id);
        let old_type = self.store.require(target)?.type_id;
        let outcome = retype::change_type(&mut self.store, target, new_type)?;
        if outcome.changed.is_empty() {
            return Ok(SessionUpdate::default());
        }
        self.counter.transfer(old_type, new_type);
        let mut tree = Vec::new();
        for changed in &outcome.changed {
            tree.extend(self.tree.update_entity(&self.store, *changed));
        }
        tree.extend(self.tree.refresh(&self.store, NodeKey::Type(old_type)));
        Ok(SessionUpdate {
            tree,
            display: self.sync_display(),
            ..SessionUpdate::default()
        })
    }

    /// Split `track` at the point `at_entity`; the tail becomes a new track.
    pub fn split_track(
        &mut self,
        track: EntityId,
        at_entity: EntityId,
    ) -> AnnotrackResult<(EntityId, SessionUpdate)> {
        let new_track = self.tracks.split(&mut self.store, track, at_entity)?;
        let type_id = self.store.require(new_track)?.type_id;
        self.counter.increment(type_id);

        let mut tree = self.tree.update_entity(&self.store, new_track);
        for point in self.tracks.point_entities(new_track) {
            tree.extend(self.tree.update_entity(&self.store, point));
        }
        tree.extend(self.tree.refresh(&self.store, NodeKey::Entity(track)));
        self.bus.emit(&SessionEvent::EntityAdded {
            id: new_track,
            type_id,
            frame: None,
        });
        let update = SessionUpdate {
            created: vec![new_track],
            removed: Vec::new(),
            display: self.sync_display(),
            tree,
        };
        Ok((new_track, update))
    }

    /// Merge track `b` into `a`. Fails without changes if they share a frame.
    pub fn merge_tracks(&mut self, a: EntityId, b: EntityId) -> AnnotrackResult<SessionUpdate> {
        let moved = self.tracks.point_entities(b);
        let type_b = self.store.require(b)?.type_id;
        self.tracks.merge(&mut self.store, a, b)?;
        self.counter.decrement(type_b);
        if self.active_track == Some(b) {
            self.active_track = Some(a);
        }

        let mut tree = Vec::new();
        for point in moved {
            tree.extend(self.tree.update_entity(&self.store, point));
        }
        tree.extend(self.tree.delete_entry(&self.store, NodeKey::Entity(b)));
        tree.extend(self.tree.refresh(&self.store, NodeKey::Entity(a)));
        self.bus.emit(&SessionEvent::EntityRemoved {
            id: b,
            type_id: type_b,
        });
        Ok(SessionUpdate {
            created: Vec::new(),
            removed: vec![b],
            display: self.sync_display(),
            tree,
        })
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    // ---- tree ----

    pub fn expand_node(&mut self, key: NodeKey) -> AnnotrackResult<()> {
        self.tree.expand(&self.store, key)
    }

    pub fn collapse_node(&mut self, key: NodeKey) {
        self.tree.collapse(key);
    }

    /// Apply subtree loads that finished in the background.
    pub fn poll_tree(&mut self) -> Vec<TreeChange> {
        self.tree.poll(&self.store)
    }

    /// Block until every subtree load is applied.
    pub fn finish_tree_loads(&mut self) -> Vec<TreeChange> {
        self.tree.finish_loads(&self.store)
    }

    /// Expand the ancestors of `id` and select it.
    pub fn reveal(&mut self, id: EntityId) -> AnnotrackResult<()> {
        self.tree.expand_path(&self.store, NodeKey::Entity(id))
    }

    // ---- display ----

    pub(crate) fn sync_display(&mut self) -> Vec<DisplayOp> {
        let scene = Scene {
            store: &self.store,
            tracks: &self.tracks,
            counter: &self.counter,
        };
        let ops = self.display.sync(scene, self.frame, &mut self.diagnostics);
        for sink in &mut self.sinks {
            self.display.dispatch(&ops, sink.as_mut());
        }
        ops
    }

    pub(crate) fn display_mut(&mut self) -> &mut DisplaySynchronizer {
        &mut self.display
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/session.rs"]
mod tests;
