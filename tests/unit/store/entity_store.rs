use super::*;
use crate::model::geometry::{LineGeom, PointGeom};

fn point(x: f64, y: f64) -> Geometry {
    Geometry::Point(PointGeom { x, y })
}

#[test]
fn create_checks_type_mode() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P1", Mode::Point, "#00ffff").unwrap();
    let t = store.create_type("T1", Mode::Track, "#ff0000").unwrap();

    let id = store.create(p.id, FrameIndex(3), point(10.0, 20.0)).unwrap();
    assert_eq!(store.query_by_frame(FrameIndex(3), None).len(), 1);
    assert_eq!(store.get(id).unwrap().point(), Some(Point::new(10.0, 20.0)));

    let line = Geometry::Line(LineGeom {
        x1: 0.0,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    });
    assert!(matches!(
        store.create(p.id, FrameIndex(3), line),
        Err(AnnotrackError::IncompatibleMode(_))
    ));
    assert!(matches!(
        store.create(t.id, FrameIndex(3), point(0.0, 0.0)),
        Err(AnnotrackError::IncompatibleMode(_))
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn save_writes_only_changed_rows() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P1", Mode::Point, "#00ffff").unwrap();
    let id = store.create(p.id, FrameIndex(0), point(1.0, 1.0)).unwrap();

    let first = store.save().unwrap();
    assert_eq!(first.inserted, 2);
    assert!(!store.is_dirty());

    // A write that restores the same value is dirty but produces no backend write.
    store
        .update(id, |e| {
            if let Some(m) = e.marker_mut() {
                m.geometry = point(1.0, 1.0);
            }
        })
        .unwrap();
    assert!(store.is_dirty());
    assert!(store.save().unwrap().is_empty());

    store.set_text(id, Some("hello".to_string())).unwrap();
    let report = store.save().unwrap();
    assert_eq!(report.updated, 1);
    let row = store.backend().query(Table::Point, &RowFilter::all()).unwrap();
    assert_eq!(row[0].1["text"], "hello");

    store.delete(id).unwrap();
    assert_eq!(store.save().unwrap().deleted, 1);
    assert!(store.backend().query(Table::Point, &RowFilter::all()).unwrap().is_empty());
}

#[test]
fn created_then_deleted_rows_never_reach_the_backend() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P1", Mode::Point, "#00ffff").unwrap();
    store.save().unwrap();
    let id = store.create(p.id, FrameIndex(0), point(1.0, 1.0)).unwrap();
    store.delete(id).unwrap();
    assert!(store.save().unwrap().is_empty());
}

#[test]
fn update_rejects_type_and_variant_changes() {
    let mut store = EntityStore::in_memory();
    let a = store.create_type("a", Mode::Point, "#fff").unwrap();
    let b = store.create_type("b", Mode::Point, "#fff").unwrap();
    let id = store.create(a.id, FrameIndex(0), point(0.0, 0.0)).unwrap();

    assert!(store.update(id, |e| e.type_id = b.id).is_err());
    assert!(
        store
            .update(id, |e| {
                if let Some(m) = e.marker_mut() {
                    m.geometry = Geometry::anchored(Mode::Rect, Point::ZERO);
                }
            })
            .is_err()
    );
    assert_eq!(store.get(id).unwrap().type_id, a.id);

    store
        .update(id, |e| {
            if let Some(m) = e.marker_mut() {
                m.frame = FrameIndex(9);
            }
        })
        .unwrap();
    assert!(store.query_by_frame(FrameIndex(0), None).is_empty());
    assert_eq!(store.query_by_frame(FrameIndex(9), Some(a.id)).len(), 1);
    assert!(store.query_by_frame(FrameIndex(9), Some(b.id)).is_empty());
}

#[test]
fn track_points_cannot_be_deleted_directly() {
    let mut store = EntityStore::in_memory();
    let t = store.create_type("T1", Mode::Track, "#ff0000").unwrap();
    let track = store.insert_track(t.id).unwrap();
    let pt = store
        .insert_track_point(track, FrameIndex(1), Point::new(1.0, 2.0))
        .unwrap();
    assert!(store.delete(pt).is_err());
    assert!(store.delete(track).is_err());
    assert_eq!(store.query_by_type(t.id).len(), 1);
    assert_eq!(store.query_by_track(track).len(), 1);
    assert_eq!(store.query_all_of_type(t.id).len(), 2);
}

#[test]
fn open_restores_saved_state() {
    let mut store = EntityStore::in_memory();
    let t = store.create_type("T1", Mode::Track, "jet(10)").unwrap();
    let track = store.insert_track(t.id).unwrap();
    store
        .insert_track_point(track, FrameIndex(5), Point::new(1.0, 2.0))
        .unwrap();
    store.save().unwrap();

    let dump = MemoryBackend::snapshot_of(store.backend()).unwrap();
    let reopened = EntityStore::open(Box::new(dump)).unwrap();
    assert!(!reopened.is_dirty());
    assert_eq!(reopened.types().by_name("T1").unwrap().color, "jet(10)");
    assert_eq!(reopened.query_by_track(track).len(), 1);
    assert_eq!(
        reopened.query_by_frame(FrameIndex(5), None)[0].track(),
        Some(track)
    );
}

#[test]
fn open_rejects_an_entity_id_with_no_successor() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P1", Mode::Point, "#00ffff").unwrap();
    store.create(p.id, FrameIndex(0), point(1.0, 1.0)).unwrap();
    store.save().unwrap();

    let source = store.backend();
    let (type_id, type_row) = source.query(Table::Type, &RowFilter::all()).unwrap().remove(0);
    let (_, point_row) = source.query(Table::Point, &RowFilter::all()).unwrap().remove(0);
    let mut backend = MemoryBackend::new();
    backend.insert(Table::Type, type_id, &type_row).unwrap();
    backend.insert(Table::Point, u64::MAX, &point_row).unwrap();

    let err = EntityStore::open(Box::new(backend)).unwrap_err();
    assert!(matches!(err, AnnotrackError::Validation(_)));
}

#[test]
fn define_types_with_a_bad_entry_changes_nothing() {
    let mut store = EntityStore::in_memory();
    let defs = vec![
        TypeDefinition {
            id: TypeId(1),
            name: "ok".to_string(),
            mode: Mode::Point,
            color: "#fff".to_string(),
        },
        TypeDefinition {
            id: TypeId(2),
            name: "   ".to_string(),
            mode: Mode::Point,
            color: "#fff".to_string(),
        },
    ];
    assert!(matches!(
        store.define_types(&defs),
        Err(AnnotrackError::Validation(_))
    ));
    assert!(store.types().is_empty());
    assert!(!store.is_dirty());

    assert_eq!(store.define_types(&defs[..1]).unwrap(), vec![TypeId(1)]);
    assert_eq!(store.save().unwrap().inserted, 1);
}
