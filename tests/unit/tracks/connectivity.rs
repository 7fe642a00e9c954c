use super::*;

fn frames(v: &[u64]) -> Vec<FrameIndex> {
    v.iter().copied().map(FrameIndex).collect()
}

#[test]
fn runs_and_gaps_are_classified() {
    assert_eq!(
        connectivity(frames(&[5, 6, 7, 10, 11])),
        vec![
            Segment::solid(5, 7),
            Segment::gap(7, 10),
            Segment::solid(10, 11)
        ]
    );
}

#[test]
fn isolated_points_only_produce_gaps() {
    assert_eq!(
        connectivity(frames(&[1, 3, 5])),
        vec![Segment::gap(1, 3), Segment::gap(3, 5)]
    );
    assert!(connectivity(frames(&[4])).is_empty());
    assert!(connectivity(Vec::new()).is_empty());
}

#[test]
fn classification_ignores_insertion_order() {
    let ordered = connectivity(frames(&[2, 3, 4, 8, 9, 12]));
    let shuffled = connectivity(frames(&[12, 3, 9, 2, 8, 4, 3]));
    assert_eq!(ordered, shuffled);
}
