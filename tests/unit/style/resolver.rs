use super::*;
use crate::{
    foundation::core::{FrameIndex, TypeId},
    model::{
        entity::{EntityKind, Marker, TrackInfo},
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
};

fn marker_type(style: Option<&str>) -> MarkerType {
    let mut t = MarkerType::new(TypeId(1), "P1", Mode::Point, "#00ffff");
    t.style = style.map(str::to_string);
    t
}

fn entity(id: u64, style: Option<&str>) -> Entity {
    Entity {
        id: EntityId(id),
        type_id: TypeId(1),
        style: style.map(str::to_string),
        text: None,
        kind: EntityKind::Marker(Marker {
            frame: FrameIndex(0),
            geometry: Geometry::Point(PointGeom { x: 0.0, y: 0.0 }),
            track: None,
        }),
    }
}

#[test]
fn defaults_apply_without_styles() {
    let mut d = Diagnostics::new();
    let s = StyleResolver::new().resolve(&marker_type(None), None, &entity(1, None), &mut d);
    assert_eq!(s.shape, "cross");
    assert_eq!(s.line_width, 2.0);
    assert_eq!(s.line_style, LineStyle::Solid);
    assert_eq!(s.scale, 1.0);
    assert_eq!(s.transform, Transform::Screen);
    assert_eq!(s.color, Rgba8::opaque(0, 255, 255));
    assert!(d.is_empty());
}

#[test]
fn entity_beats_type_beats_default() {
    let mut d = Diagnostics::new();
    let ty = marker_type(Some(r#"{"shape": "ring", "scale": 3, "line-style": "dash"}"#));
    let e = entity(1, Some(r##"{"scale": 5, "color": "#ff0000"}"##));
    let s = StyleResolver::new().resolve(&ty, None, &e, &mut d);
    assert_eq!(s.shape, "ring");
    assert_eq!(s.scale, 5.0);
    assert_eq!(s.line_style, LineStyle::Dash);
    assert_eq!(s.line_width, 2.0);
    assert_eq!(s.color, Rgba8::opaque(255, 0, 0));
}

#[test]
fn track_layer_sits_between_type_and_point() {
    let mut d = Diagnostics::new();
    let ty = marker_type(Some(r#"{"shape": "ring", "scale": 3}"#));
    let track = Entity {
        id: EntityId(10),
        type_id: TypeId(1),
        style: Some(r#"{"scale": 4, "shape": "square", "color": "gray(255)"}"#.to_string()),
        text: None,
        kind: EntityKind::Track(TrackInfo::default()),
    };
    let point = entity(11, Some(r#"{"shape": "circle"}"#));
    let s = StyleResolver::new().resolve(&ty, Some(&track), &point, &mut d);
    assert_eq!(s.shape, "circle");
    assert_eq!(s.scale, 4.0);
    // Colormap entry follows the track id, not the point id.
    assert_eq!(s.color, Rgba8::opaque(10, 10, 10));
}

#[test]
fn malformed_layers_degrade_with_warnings() {
    let mut d = Diagnostics::new();
    let ty = marker_type(Some("{not json"));
    let e = entity(1, Some(r#"{"line-width": "wide", "shape": "ring"}"#));
    let s = StyleResolver::new().resolve(&ty, None, &e, &mut d);
    assert_eq!(s.shape, "ring");
    assert_eq!(s.line_width, 2.0);
    assert_eq!(d.warnings().len(), 2);
    assert!(matches!(
        d.warnings()[0],
        Warning::MalformedStyle {
            origin: StyleOrigin::Type(TypeId(1)),
            ..
        }
    ));

    let mut d = Diagnostics::new();
    let s = StyleResolver::new().resolve(&marker_type(Some("[1, 2]")), None, &entity(1, None), &mut d);
    assert_eq!(s.shape, "cross");
    assert_eq!(d.warnings().len(), 1);
}

#[test]
fn resolving_overrides_is_idempotent() {
    let resolver = StyleResolver::new();
    let cases = [
        (None, None),
        (Some(r#"{"shape": "ring", "color": "jet(7)"}"#), None),
        (
            Some(r#"{"track-gap-line-style": "dot", "font-size": 9.5}"#),
            Some(r##"{"line-width": 0.25, "color": "#10203040"}"##),
        ),
        (Some("garbage"), Some(r#"{"transform": "image"}"#)),
    ];
    for (type_style, entity_style) in cases {
        let mut d = Diagnostics::new();
        let ty = marker_type(type_style);
        let first = resolver.resolve(&ty, None, &entity(3, entity_style), &mut d);

        let overrides = first.to_override_string().unwrap();
        let again = resolver.resolve(&ty, None, &entity(3, Some(&overrides)), &mut d);
        assert_eq!(again, first);
    }
}

#[test]
fn resolve_in_reads_the_store() {
    let mut store = EntityStore::in_memory();
    let t = store.create_type("P1", Mode::Point, "#123").unwrap();
    let id = store
        .create(
            t.id,
            FrameIndex(0),
            Geometry::Point(PointGeom { x: 1.0, y: 1.0 }),
        )
        .unwrap();
    let mut d = Diagnostics::new();
    let s = StyleResolver::new().resolve_in(&store, id, &mut d).unwrap();
    assert_eq!(s.color, Rgba8::opaque(0x11, 0x22, 0x33));
}

#[test]
fn invalid_entity_values_keep_the_type_layer_value() {
    let mut d = Diagnostics::new();
    let ty = marker_type(Some(r##"{"color": "#ff0000", "line-width": 3}"##));
    let e = entity(1, Some(r#"{"color": 5, "line-width": -1}"#));
    let s = StyleResolver::new().resolve(&ty, None, &e, &mut d);
    assert_eq!(s.color, Rgba8::opaque(255, 0, 0));
    assert_eq!(s.line_width, 3.0);
    assert_eq!(d.warnings().len(), 2);
    assert!(d.warnings().iter().all(|w| matches!(
        w,
        Warning::MalformedStyle {
            origin: StyleOrigin::Entity(EntityId(1)),
            ..
        }
    )));
}
