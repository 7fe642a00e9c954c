use crate::foundation::core::FrameIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
/// How a stretch of a trajectory is drawn.
pub enum SegmentKind {
    /// Consecutive frames; drawn solid.
    Solid,
    /// Missing frames in between; drawn dashed.
    Gap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
/// A stretch of a trajectory between two observed frames.
pub struct Segment {
    pub kind: SegmentKind,
    pub from: FrameIndex,
    pub to: FrameIndex,
}

impl Segment {
    pub fn solid(from: u64, to: u64) -> Self {
        Self {
            kind: SegmentKind::Solid,
            from: FrameIndex(from),
            to: FrameIndex(to),
        }
    }

    pub fn gap(from: u64, to: u64) -> Self {
        Self {
            kind: SegmentKind::Gap,
            from: FrameIndex(from),
            to: FrameIndex(to),
        }
    }
}

/// Split observed frames into solid runs and the gaps between them.
///
/// Each maximal run of consecutive frames with at least two members yields one solid segment
/// from its first to its last frame. Every jump larger than one frame yields a gap segment from
/// the last frame before the jump to the first frame after it. Input order and duplicates do not
/// matter.
pub fn connectivity(frames: impl IntoIterator<Item = FrameIndex>) -> Vec<Segment> {
    let mut keys: Vec<FrameIndex> = frames.into_iter().collect();
    keys.sort_unstable();
    keys.dedup();

    let mut out = Vec::new();
    let Some((&first, rest)) = keys.split_first() else {
        return out;
    };

    let mut run_start = first;
    let mut prev = first;
    for &k in rest {
        if k.0 == prev.0 + 1 {
            prev = k;
            continue;
        }
        if prev != run_start {
            out.push(Segment {
                kind: SegmentKind::Solid,
                from: run_start,
                to: prev,
            });
        }
        out.push(Segment {
            kind: SegmentKind::Gap,
            from: prev,
            to: k,
        });
        run_start = k;
        prev = k;
    }
    if prev != run_start {
        out.push(Segment {
            kind: SegmentKind::Solid,
            from: run_start,
            to: prev,
        });
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/tracks/connectivity.rs"]
mod tests;
