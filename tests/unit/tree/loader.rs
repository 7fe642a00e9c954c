use super::*;
use crate::{
    foundation::core::TypeId,
    model::{
        entity::{EntityKind, Marker, TrackInfo},
        geometry::{Geometry, PointGeom},
    },
};

fn marker(id: u64, frame: u64) -> Entity {
    Entity {
        id: EntityId(id),
        type_id: TypeId(1),
        style: None,
        text: None,
        kind: EntityKind::Marker(Marker {
            frame: FrameIndex(frame),
            geometry: Geometry::Point(PointGeom { x: 0.0, y: 0.0 }),
            track: None,
        }),
    }
}

#[test]
fn entries_are_sorted_by_frame_then_id() {
    let track = Entity {
        id: EntityId(2),
        type_id: TypeId(1),
        style: None,
        text: None,
        kind: EntityKind::Track(TrackInfo::default()),
    };
    let snapshot = SubtreeSnapshot {
        parent: NodeKey::Type(TypeId(1)),
        generation: 4,
        entities: vec![marker(9, 3), track, marker(5, 3), marker(1, 7)],
        tracks: HashMap::from([(EntityId(2), (2, Some(FrameIndex(0))))]),
    };
    let loaded = build_entries(snapshot);
    assert_eq!(loaded.generation, 4);
    let keys: Vec<NodeKey> = loaded.entries.iter().map(|e| e.key).collect();
    assert_eq!(
        keys,
        vec![
            NodeKey::Entity(EntityId(2)),
            NodeKey::Entity(EntityId(5)),
            NodeKey::Entity(EntityId(9)),
            NodeKey::Entity(EntityId(1)),
        ]
    );
    assert_eq!(loaded.entries[0].label, "track 2 (2 points)");
    assert!(loaded.entries[0].has_children);
}

#[test]
fn scheduled_loads_come_back_over_the_channel() {
    let mut loader = SubtreeLoader::new();
    for generation in 1..=3 {
        loader.schedule(SubtreeSnapshot {
            parent: NodeKey::Type(TypeId(generation)),
            generation,
            entities: vec![marker(generation, 0)],
            tracks: HashMap::new(),
        });
    }
    assert_eq!(loader.in_flight(), 3);
    let mut results = loader.collect_blocking();
    results.sort_by_key(|r| r.generation);
    assert_eq!(results.len(), 3);
    assert_eq!(loader.in_flight(), 0);
    assert!(loader.try_collect().is_empty());
}
