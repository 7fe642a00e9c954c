use std::collections::{BTreeMap, HashMap};

use crate::{
    counter::Counter,
    foundation::core::{EntityId, FrameIndex, Point, TypeId},
    foundation::diagnostics::Diagnostics,
    render::primitive::{EntityView, PrimitiveGeometry, RenderPrimitive, render_primitive},
    store::entity_store::EntityStore,
    style::{
        resolver::StyleResolver,
        text::{TextContext, resolve_text},
    },
    tracks::aggregator::TrackAggregator,
};

/// Read-only view of the components a display pass looks at.
#[derive(Clone, Copy, Debug)]
pub struct Scene<'a> {
    pub store: &'a EntityStore,
    pub tracks: &'a TrackAggregator,
    pub counter: &'a Counter,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
/// Display content of one entity. Two items are equal iff nothing visible changed.
pub struct DisplayedItem {
    pub id: EntityId,
    pub type_id: TypeId,
    pub primitive: RenderPrimitive,
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Interaction state of a displayed item. Never persisted.
pub struct ViewState {
    pub dragging: bool,
    /// Grabber positions for resizing.
    pub handles: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DisplayOp {
    Create(DisplayedItem),
    Update(DisplayedItem),
    Destroy { id: EntityId },
}

impl DisplayOp {
    pub fn id(&self) -> EntityId {
        match self {
            DisplayOp::Create(item) | DisplayOp::Update(item) => item.id,
            DisplayOp::Destroy { id } => *id,
        }
    }
}

/// Receiver of display changes. Every method is optional.
pub trait DisplaySink {
    fn created(&mut self, _item: &DisplayedItem, _view: &ViewState) {}

    fn updated(&mut self, _item: &DisplayedItem, _view: &ViewState) {}

    fn destroyed(&mut self, _id: EntityId) {}
}

/// Keeps the set of displayed items equal to what the store says should be on screen.
///
/// Each [`DisplaySynchronizer::sync`] computes the target set for a frame and diffs it by id
/// against what is displayed: new ids are created, changed ones updated in place, missing ones
/// destroyed. An id present on both sides is never destroyed and recreated, so its
/// [`ViewState`] survives.
#[derive(Clone, Debug, Default)]
pub struct DisplaySynchronizer {
    resolver: StyleResolver,
    displayed: HashMap<EntityId, DisplayedItem>,
    views: HashMap<EntityId, ViewState>,
    frame: Option<FrameIndex>,
}

impl DisplaySynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame of the last sync.
    pub fn frame(&self) -> Option<FrameIndex> {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.displayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }

    pub fn item(&self, id: EntityId) -> Option<&DisplayedItem> {
        self.displayed.get(&id)
    }

    pub fn view_state(&self, id: EntityId) -> Option<&ViewState> {
        self.views.get(&id)
    }

    /// Displayed ids in ascending order.
    pub fn displayed_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.displayed.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Mark an item as being dragged. Returns false if it is not displayed.
    pub fn begin_drag(&mut self, id: EntityId) -> bool {
        match self.views.get_mut(&id) {
            Some(v) => {
                v.dragging = true;
                true
            }
            None => false,
        }
    }

    pub fn end_drag(&mut self, id: EntityId) {
        if let Some(v) = self.views.get_mut(&id) {
            v.dragging = false;
        }
    }

    /// Diff the display against the target set of `frame`.
    ///
    /// Destroys come first, then creates and updates in id order.
    #[tracing::instrument(skip(self, scene, diagnostics))]
    pub fn sync(
        &mut self,
        scene: Scene<'_>,
        frame: FrameIndex,
        diagnostics: &mut Diagnostics,
    ) -> Vec<DisplayOp> {
        let target = self.target_set(scene, frame, diagnostics);
        let mut ops = Vec::new();

        let mut stale: Vec<EntityId> = self
            .displayed
            .keys()
            .filter(|id| !target.contains_key(id))
            .copied()
            .collect();
        stale.sort_unstable();
        for id in stale {
            self.displayed.remove(&id);
            self.views.remove(&id);
            ops.push(DisplayOp::Destroy { id });
        }

        for (id, item) in target {
            match self.displayed.get(&id) {
                Some(old) if *old == item => {}
                Some(_) => {
                    let view = self.views.entry(id).or_default();
                    view.handles = handles_of(&item.primitive);
                    self.displayed.insert(id, item.clone());
                    ops.push(DisplayOp::Update(item));
                }
                None => {
                    self.views.insert(
                        id,
                        ViewState {
                            dragging: false,
                            handles: handles_of(&item.primitive),
                        },
                    );
                    self.displayed.insert(id, item.clone());
                    ops.push(DisplayOp::Create(item));
                }
            }
        }

        self.frame = Some(frame);
        if !ops.is_empty() {
            tracing::debug!(ops = ops.len(), displayed = self.displayed.len(), "display synced");
        }
        ops
    }

    /// [`Self::sync`], then hand every op to `sink`.
    pub fn sync_into(
        &mut self,
        scene: Scene<'_>,
        frame: FrameIndex,
        diagnostics: &mut Diagnostics,
        sink: &mut dyn DisplaySink,
    ) -> Vec<DisplayOp> {
        let ops = self.sync(scene, frame, diagnostics);
        self.dispatch(&ops, sink);
        ops
    }

    pub fn dispatch(&self, ops: &[DisplayOp], sink: &mut dyn DisplaySink) {
        let idle = ViewState::default();
        for op in ops {
            match op {
                DisplayOp::Create(item) => {
                    sink.created(item, self.views.get(&item.id).unwrap_or(&idle));
                }
                DisplayOp::Update(item) => {
                    sink.updated(item, self.views.get(&item.id).unwrap_or(&idle));
                }
                DisplayOp::Destroy { id } => sink.destroyed(*id),
            }
        }
    }

    /// Destroy everything, e.g. when the project is closed.
    pub fn clear(&mut self) -> Vec<DisplayOp> {
        let ids = self.displayed_ids();
        self.displayed.clear();
        self.views.clear();
        self.frame = None;
        ids.into_iter().map(|id| DisplayOp::Destroy { id }).collect()
    }

    fn target_set(
        &self,
        scene: Scene<'_>,
        frame: FrameIndex,
        diagnostics: &mut Diagnostics,
    ) -> BTreeMap<EntityId, DisplayedItem> {
        let Scene {
            store,
            tracks,
            counter,
        } = scene;
        let mut target = BTreeMap::new();

        for e in store.query_by_frame(frame, None) {
            if e.track().is_some() {
                continue;
            }
            let (Some(ty), Some(marker)) = (store.types().get(e.type_id), e.marker()) else {
                continue;
            };
            if ty.hidden {
                continue;
            }
            let style = self.resolver.resolve(ty, None, e, diagnostics);
            let mut primitive = render_primitive(EntityView::Marker(&marker.geometry), &style);
            primitive.label = resolve_text(e, ty, TextContext {
                count: counter.get(ty.id),
            });
            target.insert(
                e.id,
                DisplayedItem {
                    id: e.id,
                    type_id: ty.id,
                    primitive,
                },
            );
        }

        for track in tracks.track_ids() {
            if !tracks.is_visible_at(track, frame) {
                continue;
            }
            let Some(track_entity) = store.get(track) else {
                continue;
            };
            let Some(ty) = store.types().get(track_entity.type_id) else {
                continue;
            };
            if ty.hidden || track_entity.hidden() {
                continue;
            }

            // The point on this frame, if any, styles and labels the whole item.
            let current = tracks
                .point_at(track, frame)
                .and_then(|p| store.get(p.entity));
            let (style, label_source) = match current {
                Some(point) => (
                    self.resolver
                        .resolve(ty, Some(track_entity), point, diagnostics),
                    point,
                ),
                None => (
                    self.resolver.resolve(ty, None, track_entity, diagnostics),
                    track_entity,
                ),
            };
            let window: Vec<(FrameIndex, Point)> = tracks
                .points_in_window(track, frame)
                .into_iter()
                .map(|(f, p)| (f, p.pos))
                .collect();
            let mut primitive = render_primitive(
                EntityView::Track {
                    points: &window,
                    current: frame,
                },
                &style,
            );
            primitive.label = resolve_text(label_source, ty, TextContext {
                count: counter.get(ty.id),
            });
            target.insert(
                track,
                DisplayedItem {
                    id: track,
                    type_id: ty.id,
                    primitive,
                },
            );
        }

        target
    }
}

fn handles_of(primitive: &RenderPrimitive) -> Vec<Point> {
    match &primitive.geometry {
        PrimitiveGeometry::Shape(g) => g.handles(),
        PrimitiveGeometry::Trajectory { current, .. } => current.iter().copied().collect(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/display.rs"]
mod tests;
