use super::*;

fn setup() -> (EntityStore, TrackAggregator, TypeId) {
    let mut store = EntityStore::in_memory();
    let t = store.create_type("T1", Mode::Track, "#ff0000").unwrap();
    (store, TrackAggregator::default(), t.id)
}

fn track_with(
    store: &mut EntityStore,
    agg: &mut TrackAggregator,
    type_id: TypeId,
    frames: &[u64],
) -> EntityId {
    let mut track = None;
    for &f in frames {
        let target = match track {
            Some(t) => TrackTarget::Existing(t),
            None => TrackTarget::New(type_id),
        };
        let out = agg
            .add_point(store, target, FrameIndex(f), Point::new(f as f64, 0.0))
            .unwrap();
        track = Some(out.track);
    }
    track.unwrap()
}

fn keys(agg: &TrackAggregator, track: EntityId) -> Vec<u64> {
    agg.points(track)
        .map(|f| f.keys().map(|k| k.0).collect())
        .unwrap_or_default()
}

/// Frame maps and store rows describe the same tracks.
fn assert_consistent(store: &EntityStore, agg: &TrackAggregator) {
    for track in agg.track_ids() {
        let frames = agg.points(track).unwrap();
        assert!(!frames.is_empty());
        assert!(store.get(track).unwrap().is_track());
        let rows = store.query_by_track(track);
        assert_eq!(rows.len(), frames.len());
        for (frame, point) in frames {
            let e = store.get(point.entity).unwrap();
            assert_eq!(e.frame(), Some(*frame));
            assert_eq!(e.track(), Some(track));
        }
    }
    for e in store.iter().filter(|e| e.is_track()) {
        assert!(agg.contains_track(e.id));
    }
}

#[test]
fn first_point_creates_track_and_existing_frame_moves() {
    let (mut store, mut agg, t) = setup();
    let first = agg
        .add_point(&mut store, TrackTarget::New(t), FrameIndex(0), Point::new(1.0, 1.0))
        .unwrap();
    assert!(first.created_track);
    assert!(!first.moved);

    let again = agg
        .add_point(
            &mut store,
            TrackTarget::Existing(first.track),
            FrameIndex(0),
            Point::new(5.0, 6.0),
        )
        .unwrap();
    assert!(again.moved);
    assert_eq!(again.entity, first.entity);
    assert_eq!(agg.point_count(first.track), 1);
    assert_eq!(
        store.get(first.entity).unwrap().point(),
        Some(Point::new(5.0, 6.0))
    );
    assert_consistent(&store, &agg);
}

#[test]
fn adding_to_a_missing_track_is_not_found() {
    let (mut store, mut agg, _) = setup();
    let err = agg
        .add_point(
            &mut store,
            TrackTarget::Existing(EntityId(99)),
            FrameIndex(0),
            Point::ZERO,
        )
        .unwrap_err();
    assert!(matches!(err, AnnotrackError::NotFound(_)));
    assert!(store.is_empty());
}

#[test]
fn new_track_of_non_track_type_leaves_nothing_behind() {
    let (mut store, mut agg, _) = setup();
    let p = store.create_type("P1", Mode::Point, "#fff").unwrap();
    let err = agg
        .add_point(&mut store, TrackTarget::New(p.id), FrameIndex(0), Point::ZERO)
        .unwrap_err();
    assert!(matches!(err, AnnotrackError::IncompatibleMode(_)));
    assert!(store.is_empty());
    assert_eq!(agg.track_ids().count(), 0);
}

#[test]
fn removing_last_point_deletes_track() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[2, 3]);

    let out = agg.remove_point(&mut store, track, FrameIndex(2)).unwrap();
    assert!(!out.track_deleted());
    let out = agg.remove_point(&mut store, track, FrameIndex(3)).unwrap();
    assert!(out.track_deleted());
    assert!(!agg.contains_track(track));
    assert!(store.get(track).is_none());
    assert!(store.is_empty());
}

#[test]
fn remove_after_truncates_and_may_delete() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[1, 2, 5, 8]);

    let out = agg.remove_after(&mut store, track, FrameIndex(5)).unwrap();
    assert_eq!(out.removed().len(), 2);
    assert_eq!(keys(&agg, track), vec![1, 2]);

    let out = agg.remove_after(&mut store, track, FrameIndex(0)).unwrap();
    assert!(out.track_deleted());
    assert!(store.is_empty());
}

#[test]
fn remove_entity_routes_to_owner() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[1, 2]);
    let entity = agg.point_at(track, FrameIndex(2)).unwrap().entity;

    let out = agg.remove_entity(&mut store, entity).unwrap();
    assert_eq!(out.track(), track);
    assert_eq!(out.removed(), &[entity]);
    assert_eq!(keys(&agg, track), vec![1]);
}

#[test]
fn split_moves_tail_into_new_track() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[0, 1, 2, 3, 4, 5]);
    let at = agg.point_at(track, FrameIndex(3)).unwrap().entity;

    let new_track = agg.split(&mut store, track, at).unwrap();
    assert_eq!(keys(&agg, track), vec![0, 1, 2]);
    assert_eq!(keys(&agg, new_track), vec![3, 4, 5]);
    assert_eq!(store.get(at).unwrap().track(), Some(new_track));
    assert_eq!(store.get(new_track).unwrap().type_id, t);
    assert_consistent(&store, &agg);
}

#[test]
fn split_refuses_only_and_first_points() {
    let (mut store, mut agg, t) = setup();
    let single = track_with(&mut store, &mut agg, t, &[7]);
    let only = agg.point_at(single, FrameIndex(7)).unwrap().entity;
    assert!(matches!(
        agg.split(&mut store, single, only),
        Err(AnnotrackError::SplitNotPossible(_))
    ));

    let track = track_with(&mut store, &mut agg, t, &[1, 2]);
    let first = agg.point_at(track, FrameIndex(1)).unwrap().entity;
    assert!(matches!(
        agg.split(&mut store, track, first),
        Err(AnnotrackError::SplitNotPossible(_))
    ));
    assert!(matches!(
        agg.split(&mut store, track, only),
        Err(AnnotrackError::NotFound(_))
    ));
    assert_eq!(keys(&agg, track), vec![1, 2]);
}

#[test]
fn merge_conflict_reports_frames_and_changes_nothing() {
    let (mut store, mut agg, t) = setup();
    let a = track_with(&mut store, &mut agg, t, &[1, 2, 3]);
    let b = track_with(&mut store, &mut agg, t, &[3, 4, 2]);

    match agg.merge(&mut store, a, b) {
        Err(AnnotrackError::FrameConflict { frames }) => {
            assert_eq!(frames, vec![FrameIndex(2), FrameIndex(3)]);
        }
        other => panic!("expected frame conflict, got {other:?}"),
    }
    assert_eq!(keys(&agg, a), vec![1, 2, 3]);
    assert_eq!(keys(&agg, b), vec![2, 3, 4]);
    assert_consistent(&store, &agg);
}

#[test]
fn split_then_merge_restores_the_track() {
    let (mut store, mut agg, t) = setup();
    let frames = [0, 1, 2, 5, 6, 9];
    let track = track_with(&mut store, &mut agg, t, &frames);
    let before: Vec<(u64, EntityId)> = agg
        .points(track)
        .unwrap()
        .iter()
        .map(|(f, p)| (f.0, p.entity))
        .collect();

    for &at_frame in &frames[1..] {
        let at = agg.point_at(track, FrameIndex(at_frame)).unwrap().entity;
        let tail = agg.split(&mut store, track, at).unwrap();
        agg.merge(&mut store, track, tail).unwrap();
        assert!(store.get(tail).is_none());

        let after: Vec<(u64, EntityId)> = agg
            .points(track)
            .unwrap()
            .iter()
            .map(|(f, p)| (f.0, p.entity))
            .collect();
        assert_eq!(after, before);
        assert_consistent(&store, &agg);
    }
}

#[test]
fn window_visibility_and_range() {
    let (mut store, mut agg, t) = setup();
    agg.set_window(TrackWindow::bounded(2, 1));
    let track = track_with(&mut store, &mut agg, t, &[10, 11, 14]);

    assert!(agg.is_visible_at(track, FrameIndex(12)));
    assert!(agg.is_visible_at(track, FrameIndex(8)));
    assert!(!agg.is_visible_at(track, FrameIndex(7)));
    assert!(agg.is_visible_at(track, FrameIndex(15)));
    assert!(!agg.is_visible_at(track, FrameIndex(16)));

    let in_window: Vec<u64> = agg
        .points_in_window(track, FrameIndex(12))
        .into_iter()
        .map(|(f, _)| f.0)
        .collect();
    assert_eq!(in_window, vec![10, 11]);

    agg.set_view(FrameSpan::new(FrameIndex(11), FrameIndex(20)).unwrap());
    let clipped: Vec<u64> = agg
        .points_in_window(track, FrameIndex(12))
        .into_iter()
        .map(|(f, _)| f.0)
        .collect();
    assert_eq!(clipped, vec![11]);
}

#[test]
fn unbounded_window_shows_everything() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[100, 200]);
    agg.set_current_frame(FrameIndex(0));
    assert!(agg.is_visible(track));
    assert_eq!(agg.points_in_window(track, FrameIndex(0)).len(), 2);
    assert_eq!(
        agg.window_segments(track, FrameIndex(0)),
        vec![Segment::gap(100, 200)]
    );
}

#[test]
fn last_known_prefers_latest_before_frame() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[5, 9]);
    assert_eq!(agg.last_known(track, FrameIndex(7)).unwrap().0, FrameIndex(5));
    assert_eq!(agg.last_known(track, FrameIndex(9)).unwrap().0, FrameIndex(9));
    assert_eq!(agg.last_known(track, FrameIndex(2)).unwrap().0, FrameIndex(5));
}

#[test]
fn nearest_track_policies() {
    let (mut store, mut agg, t) = setup();
    let near = agg
        .add_point(&mut store, TrackTarget::New(t), FrameIndex(0), Point::new(10.0, 0.0))
        .unwrap()
        .track;
    let far = agg
        .add_point(&mut store, TrackTarget::New(t), FrameIndex(0), Point::new(100.0, 0.0))
        .unwrap()
        .track;

    let pos = Point::new(0.0, 0.0);
    let hit = agg.nearest_track(&store, t, pos, FrameIndex(1), NearestPolicy::Uncapped);
    assert_eq!(hit.map(|(id, _)| id), Some(near));

    let capped = agg.nearest_track(&store, t, pos, FrameIndex(1), NearestPolicy::Capped(5.0));
    assert_eq!(capped, None);

    // Tracks with a point on the query frame are not candidates.
    let same_frame = agg.nearest_track(&store, t, pos, FrameIndex(0), NearestPolicy::Uncapped);
    assert_eq!(same_frame, None);

    let hit = agg.nearest_track(
        &store,
        t,
        Point::new(95.0, 0.0),
        FrameIndex(1),
        NearestPolicy::Capped(5.0),
    );
    assert_eq!(hit, Some((far, 5.0)));
}

#[test]
fn detections_match_closest_pairs_first() {
    let (mut store, mut agg, t) = setup();
    let a = agg
        .add_point(&mut store, TrackTarget::New(t), FrameIndex(0), Point::new(0.0, 0.0))
        .unwrap()
        .track;
    let b = agg
        .add_point(&mut store, TrackTarget::New(t), FrameIndex(0), Point::new(10.0, 0.0))
        .unwrap()
        .track;

    let detections = [
        Point::new(9.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(500.0, 0.0),
    ];
    let out = agg
        .assign_detections(&mut store, t, FrameIndex(1), &detections, 5.0)
        .unwrap();
    assert_eq!(out[0].track, b);
    assert_eq!(out[1].track, a);
    assert!(out[2].created_track);
    assert_eq!(agg.track_ids().count(), 3);
    assert_consistent(&store, &agg);
}

#[test]
fn rebuild_reports_orphans_and_drops_empty_tracks() {
    let (mut store, mut agg, t) = setup();
    let track = track_with(&mut store, &mut agg, t, &[1, 2]);
    let empty = store.insert_track(t).unwrap();
    let orphan = store
        .insert_track_point(track, FrameIndex(9), Point::ZERO)
        .unwrap();
    store
        .modify(orphan, |e| {
            if let Some(m) = e.marker_mut() {
                m.track = Some(EntityId(4242));
            }
        })
        .unwrap();

    let mut diagnostics = Diagnostics::new();
    let mut rebuilt = TrackAggregator::default();
    let dropped = rebuilt.rebuild(&mut store, &mut diagnostics).unwrap();

    assert_eq!(dropped, vec![empty]);
    assert!(store.get(empty).is_none());
    assert_eq!(keys(&rebuilt, track), vec![1, 2]);
    assert_eq!(
        diagnostics.warnings(),
        &[Warning::OrphanTrackPoint {
            entity: orphan,
            track: EntityId(4242)
        }]
    );

    // Orphans are still removable.
    let out = rebuilt.remove_entity(&mut store, orphan).unwrap();
    assert_eq!(out.removed(), &[orphan]);
    assert!(store.get(orphan).is_none());
}

#[test]
fn random_edit_sequences_keep_maps_consistent() {
    let (mut store, mut agg, t) = setup();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for _ in 0..400 {
        let tracks: Vec<EntityId> = agg.track_ids().collect();
        let frame = FrameIndex(next() % 20);
        let pick = |r: u64| tracks.get((r as usize) % tracks.len().max(1)).copied();
        match next() % 6 {
            0 | 1 => {
                let target = match pick(next()) {
                    Some(track) if next() % 3 != 0 => TrackTarget::Existing(track),
                    _ => TrackTarget::New(t),
                };
                agg.add_point(&mut store, target, frame, Point::new(1.0, 2.0))
                    .unwrap();
            }
            2 => {
                if let Some(track) = pick(next()) {
                    let _ = agg.remove_point(&mut store, track, frame);
                }
            }
            3 => {
                if let Some(track) = pick(next()) {
                    agg.remove_after(&mut store, track, frame).unwrap();
                }
            }
            4 => {
                if let Some(track) = pick(next()) {
                    let entities = agg.point_entities(track);
                    let at = entities[(next() as usize) % entities.len()];
                    let _ = agg.split(&mut store, track, at);
                }
            }
            _ => {
                if let (Some(a), Some(b)) = (pick(next()), pick(next())) {
                    let _ = agg.merge(&mut store, a, b);
                }
            }
        }
        assert_consistent(&store, &agg);
    }
}
