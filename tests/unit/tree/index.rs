use super::*;
use crate::{
    foundation::core::Point,
    model::{
        geometry::{Geometry, PointGeom},
        marker_type::Mode,
    },
    tracks::aggregator::{TrackAggregator, TrackTarget},
};

fn point(x: f64) -> Geometry {
    Geometry::Point(PointGeom { x, y: 0.0 })
}

fn loaded_keys(tree: &TreeIndex, key: NodeKey) -> Vec<NodeKey> {
    tree.children(key)
        .into_iter()
        .filter_map(|item| match item {
            TreeItem::Node(k) => Some(k),
            TreeItem::Loading => None,
        })
        .collect()
}

#[test]
fn expand_shows_placeholder_until_load_lands() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P", Mode::Point, "#fff").unwrap();
    let a = store.create(p.id, FrameIndex(2), point(0.0)).unwrap();
    let b = store.create(p.id, FrameIndex(1), point(0.0)).unwrap();

    let mut tree = TreeIndex::build(&store);
    let root = NodeKey::Type(p.id);
    assert_eq!(tree.roots(), &[root]);
    assert_eq!(tree.node(root).unwrap().label, "P (2)");

    tree.expand(&store, root).unwrap();
    assert_eq!(tree.children(root), vec![TreeItem::Loading]);

    let changes = tree.finish_loads(&store);
    assert_eq!(
        changes,
        vec![TreeChange::Loaded {
            parent: root,
            children: 2
        }]
    );
    assert_eq!(
        loaded_keys(&tree, root),
        vec![NodeKey::Entity(b), NodeKey::Entity(a)]
    );
}

#[test]
fn collapsing_during_load_discards_the_result() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P", Mode::Point, "#fff").unwrap();
    store.create(p.id, FrameIndex(0), point(0.0)).unwrap();
    let mut tree = TreeIndex::build(&store);
    let root = NodeKey::Type(p.id);

    tree.expand(&store, root).unwrap();
    tree.collapse(root);
    assert!(tree.finish_loads(&store).is_empty());
    assert!(!tree.node(root).unwrap().is_loaded());
    assert_eq!(tree.len(), 1);
}

#[test]
fn updates_during_load_are_replayed() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P", Mode::Point, "#fff").unwrap();
    let old = store.create(p.id, FrameIndex(5), point(0.0)).unwrap();
    let mut tree = TreeIndex::build(&store);
    let root = NodeKey::Type(p.id);
    tree.expand(&store, root).unwrap();

    // Both arrive after the snapshot was taken.
    let new = store.create(p.id, FrameIndex(1), point(0.0)).unwrap();
    tree.update_entity(&store, new);
    store.delete(old).unwrap();
    tree.delete_entry(&store, NodeKey::Entity(old));

    tree.finish_loads(&store);
    assert_eq!(loaded_keys(&tree, root), vec![NodeKey::Entity(new)]);
    assert!(!tree.contains(NodeKey::Entity(old)));
    assert_eq!(tree.node(root).unwrap().label, "P (1)");
}

#[test]
fn inserts_and_moves_report_sibling_hints() {
    let mut store = EntityStore::in_memory();
    let p = store.create_type("P", Mode::Point, "#fff").unwrap();
    let a = store.create(p.id, FrameIndex(1), point(0.0)).unwrap();
    let b = store.create(p.id, FrameIndex(5), point(0.0)).unwrap();
    let mut tree = TreeIndex::build(&store);
    let root = NodeKey::Type(p.id);
    tree.expand(&store, root).unwrap();
    tree.finish_loads(&store);

    let c = store.create(p.id, FrameIndex(3), point(0.0)).unwrap();
    let changes = tree.update_entity(&store, c);
    assert_eq!(
        changes[0],
        TreeChange::Inserted {
            key: NodeKey::Entity(c),
            parent: Some(root),
            hint: InsertHint::Before(NodeKey::Entity(b)),
        }
    );
    assert!(changes.contains(&TreeChange::Relabeled {
        key: root,
        label: "P (3)".to_string()
    }));

    let d = store.create(p.id, FrameIndex(9), point(0.0)).unwrap();
    let changes = tree.update_entity(&store, d);
    assert!(matches!(
        changes[0],
        TreeChange::Inserted {
            hint: InsertHint::After(k),
            ..
        } if k == NodeKey::Entity(b)
    ));

    let q = store.create_type("Q", Mode::Point, "#000").unwrap();
    tree.upsert_type(&store, q.id);
    tree.expand(&store, NodeKey::Type(q.id)).unwrap();
    tree.finish_loads(&store);
    crate::registry::retype::change_type(&mut store, a, q.id).unwrap();
    let changes = tree.update_entity(&store, a);
    assert_eq!(
        changes[0],
        TreeChange::Moved {
            key: NodeKey::Entity(a),
            from: root,
            to: NodeKey::Type(q.id),
            hint: InsertHint::End,
        }
    );
    assert_eq!(
        loaded_keys(&tree, root),
        vec![NodeKey::Entity(c), NodeKey::Entity(b), NodeKey::Entity(d)]
    );
}

#[test]
fn deleting_a_track_drops_its_subtree_and_relabels_parents() {
    let mut store = EntityStore::in_memory();
    let mut agg = TrackAggregator::default();
    let t = store.create_type("T", Mode::Track, "#f00").unwrap();
    let first = agg
        .add_point(&mut store, TrackTarget::New(t.id), FrameIndex(0), Point::ZERO)
        .unwrap();
    let second = agg
        .add_point(
            &mut store,
            TrackTarget::Existing(first.track),
            FrameIndex(1),
            Point::new(1.0, 2.0),
        )
        .unwrap();

    let mut tree = TreeIndex::build(&store);
    let track_key = NodeKey::Entity(first.track);
    tree.expand_path(&store, NodeKey::Entity(second.entity)).unwrap();
    tree.finish_loads(&store);
    assert_eq!(tree.selected(), Some(NodeKey::Entity(second.entity)));
    assert_eq!(
        tree.node(track_key).unwrap().label,
        format!("track {} (2 points)", first.track.0)
    );
    assert_eq!(
        tree.node(NodeKey::Entity(second.entity)).unwrap().label,
        "frame 1: (1.0, 2.0)"
    );

    agg.remove_point(&mut store, first.track, FrameIndex(1)).unwrap();
    let changes = tree.delete_entry(&store, NodeKey::Entity(second.entity));
    assert!(changes.contains(&TreeChange::Relabeled {
        key: track_key,
        label: format!("track {} (1 points)", first.track.0)
    }));
    assert_eq!(tree.selected(), None);

    agg.delete_track(&mut store, first.track).unwrap();
    tree.delete_entry(&store, track_key);
    assert!(!tree.contains(track_key));
    assert!(!tree.contains(NodeKey::Entity(first.entity)));
    assert_eq!(tree.node(NodeKey::Type(t.id)).unwrap().label, "T (0)");
}
