//! annotrack is the data model and synchronization engine of a frame-sequence annotation tool.
//!
//! Markers (points, lines, rectangles, ellipses, polygons) live on individual frames of an image
//! sequence. Point markers can be linked across frames into tracks. The crate keeps every derived
//! view consistent with the authoritative entity store as the user edits.
//!
//! # Data flow
//!
//! 1. **Tool**: a pointer event is interpreted by the active [`Tool`]
//! 2. **Store**: the [`EntityStore`] mutates one entity and marks its row dirty
//! 3. **Tracks**: the [`TrackAggregator`] updates its sparse per-track frame maps
//! 4. **Style**: the [`StyleResolver`] cascades defaults, type, track, and entity styles
//! 5. **Display**: the [`DisplaySynchronizer`] diffs what should be on screen by entity id
//! 6. **Tree**: the [`TreeIndex`] patches its lazily loaded hierarchy
//! 7. **Counter**: per-type [`Counter`]s are adjusted
//!
//! [`Session`] owns all of these and runs the steps in order for every operation. Rows reach the
//! [`PersistenceBackend`] only at checkpoints, through [`EntityStore::save`].
#![forbid(unsafe_code)]

mod counter;
mod foundation;
mod model;
mod registry;
mod render;
mod session;
mod store;
mod style;
mod sync;
mod tool;
mod tracks;
mod tree;

pub use crate::counter::Counter;
pub use crate::foundation::core::{
    EntityId, FrameIndex, FrameSpan, Point, Rect, Rgba8, TrackWindow, TypeId, Vec2,
};
pub use crate::foundation::diagnostics::{Diagnostics, StyleOrigin, Warning};
pub use crate::foundation::error::{AnnotrackError, AnnotrackResult};
pub use crate::model::entity::{Entity, EntityKind, Marker, TrackInfo};
pub use crate::model::geometry::{
    EllipseGeom, Geometry, LineGeom, PointGeom, PolygonGeom, RectGeom,
};
pub use crate::model::marker_type::{MarkerType, Mode};
pub use crate::registry::retype::{RetypeOutcome, change_mode, change_type, delete_type};
pub use crate::registry::types::{TypeDefinition, TypeRegistry};
pub use crate::render::primitive::{
    EntityView, PrimitiveGeometry, RenderPrimitive, TrajectorySegment, render_primitive,
};
pub use crate::session::config::SessionConfig;
pub use crate::session::interaction::Interaction;
pub use crate::session::session::{ANNOTATION_MODULE, Session, SessionUpdate};
pub use crate::store::entity_store::{EntityStore, SaveReport};
pub use crate::store::memory::{MemoryBackend, WriteStats};
pub use crate::store::persistence::{Fields, PersistenceBackend, RowFilter, Table};
pub use crate::style::color::{ColorSpec, DEFAULT_COLORMAP_COUNT, resolve_color};
pub use crate::style::colormap::{Colormap, colormap_index};
pub use crate::style::resolver::{
    EffectiveStyle, LineStyle, StyleMap, StyleResolver, TrackStyle, Transform, parse_layer,
};
pub use crate::style::text::{TextContext, resolve_text};
pub use crate::sync::display::{
    DisplayOp, DisplaySink, DisplaySynchronizer, DisplayedItem, Scene, ViewState,
};
pub use crate::tool::bus::{EventBus, ListenerId, SessionEvent};
pub use crate::tool::machine::{ModuleId, Tool, ToolBox, ToolMachine};
pub use crate::tracks::aggregator::{
    AddOutcome, NearestPolicy, RemoveOutcome, TrackAggregator, TrackPoint, TrackTarget,
};
pub use crate::tracks::connectivity::{Segment, SegmentKind, connectivity};
pub use crate::tree::index::{
    InsertHint, NodeKey, SortKey, TreeChange, TreeEntry, TreeIndex, TreeItem, TreeNode,
    entity_label, type_label,
};
