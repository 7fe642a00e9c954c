use super::*;
use crate::{
    foundation::core::Point,
    model::{geometry::PolygonGeom, marker_type::Mode},
};

#[test]
fn track_point_rows_carry_referential_columns() {
    let e = Entity {
        id: EntityId(9),
        type_id: TypeId(2),
        style: None,
        text: Some("cell".to_string()),
        kind: EntityKind::Marker(Marker {
            frame: FrameIndex(4),
            geometry: Geometry::anchored(Mode::Track, Point::new(1.5, 2.5)),
            track: Some(EntityId(3)),
        }),
    };
    assert_eq!(table_for(&e), Table::Point);
    let f = encode_entity(&e).unwrap();
    assert_eq!(f["frame"], 4);
    assert_eq!(f["type"], 2);
    assert_eq!(f["track"], 3);
    assert_eq!(f["x"], 1.5);
    assert!(f["style"].is_null());

    assert_eq!(decode_entity(Table::Point, 9, &f).unwrap(), e);
}

#[test]
fn polygon_rows_have_no_track_column() {
    let e = Entity {
        id: EntityId(1),
        type_id: TypeId(1),
        style: None,
        text: None,
        kind: EntityKind::Marker(Marker {
            frame: FrameIndex(0),
            geometry: Geometry::Polygon(PolygonGeom {
                points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
                closed: false,
            }),
            track: None,
        }),
    };
    let f = encode_entity(&e).unwrap();
    assert!(!f.contains_key("track"));
    assert_eq!(decode_entity(Table::Polygon, 1, &f).unwrap(), e);
}

#[test]
fn missing_columns_are_serde_errors() {
    let mut f = Fields::new();
    f.insert("frame".into(), Value::from(1));
    assert!(matches!(
        decode_entity(Table::Point, 1, &f),
        Err(AnnotrackError::Serde(_))
    ));
}

#[test]
fn changed_fields_reports_only_differences() {
    let t = MarkerType::new(TypeId(1), "a", Mode::Point, "#ffffff");
    let old = encode_type(&t);
    let mut t2 = t.clone();
    t2.color = "#000000".to_string();
    let diff = changed_fields(&old, &encode_type(&t2));
    assert_eq!(diff.len(), 1);
    assert_eq!(diff["color"], "#000000");
    assert!(changed_fields(&old, &old).is_empty());
    assert_eq!(decode_type(1, &old).unwrap(), t);
}
