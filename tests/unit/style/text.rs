use super::*;
use crate::{
    foundation::core::{EntityId, FrameIndex, TypeId},
    model::{
        entity::{EntityKind, Marker},
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
};

fn point_entity(text: Option<&str>, track: Option<u64>) -> Entity {
    Entity {
        id: EntityId(7),
        type_id: TypeId(1),
        style: None,
        text: text.map(str::to_string),
        kind: EntityKind::Marker(Marker {
            frame: FrameIndex(12),
            geometry: Geometry::Point(PointGeom { x: 3.5, y: 4.0 }),
            track: track.map(EntityId),
        }),
    }
}

#[test]
fn type_template_fills_placeholders() {
    let mut ty = MarkerType::new(TypeId(1), "cell", Mode::Track, "#fff");
    ty.text = Some("%type #%track_id @%frame (%x, %y) n=%count id=%id".to_string());
    let e = point_entity(None, Some(3));
    assert_eq!(
        resolve_text(&e, &ty, TextContext { count: 5 }).as_deref(),
        Some("cell #3 @12 (3.5, 4) n=5 id=7")
    );
}

#[test]
fn entity_text_wins_and_unknown_tokens_survive() {
    let mut ty = MarkerType::new(TypeId(1), "cell", Mode::Point, "#fff");
    ty.text = Some("type label".to_string());
    let e = point_entity(Some("100% %z %id"), None);
    assert_eq!(
        resolve_text(&e, &ty, TextContext::default()).as_deref(),
        Some("100% %z 7")
    );
}

#[test]
fn no_template_means_no_label() {
    let ty = MarkerType::new(TypeId(1), "cell", Mode::Point, "#fff");
    assert_eq!(resolve_text(&point_entity(None, None), &ty, TextContext::default()), None);
}
