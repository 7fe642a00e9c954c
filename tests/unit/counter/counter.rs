use super::*;
use crate::{
    foundation::core::{FrameIndex, Point},
    model::{
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
    tracks::aggregator::{TrackAggregator, TrackTarget},
};

#[test]
fn rebuild_counts_top_level_entities() {
    let mut store = EntityStore::in_memory();
    let mut agg = TrackAggregator::default();
    let p = store.create_type("P", Mode::Point, "#fff").unwrap();
    let t = store.create_type("T", Mode::Track, "#f00").unwrap();
    for f in 0..3 {
        store
            .create(p.id, FrameIndex(f), Geometry::Point(PointGeom { x: 0.0, y: 0.0 }))
            .unwrap();
    }
    let first = agg
        .add_point(&mut store, TrackTarget::New(t.id), FrameIndex(0), Point::ZERO)
        .unwrap();
    agg.add_point(
        &mut store,
        TrackTarget::Existing(first.track),
        FrameIndex(1),
        Point::ZERO,
    )
    .unwrap();

    let counter = Counter::rebuild(&store);
    assert_eq!(counter.get(p.id), 3);
    assert_eq!(counter.get(t.id), 1);
    assert!(counter.matches(&store));
}

#[test]
fn incremental_adjustments() {
    let mut c = Counter::new();
    let (a, b) = (TypeId(1), TypeId(2));
    c.increment(a);
    c.increment(a);
    c.transfer(a, b);
    assert_eq!((c.get(a), c.get(b)), (1, 1));
    c.decrement(b);
    c.decrement(b);
    assert_eq!(c.get(b), 0);
    c.remove_type(a);
    assert_eq!(c.iter().count(), 1);
}
