use std::{
    collections::HashMap,
    sync::mpsc::{Receiver, Sender, channel},
};

use crate::{
    foundation::core::{EntityId, FrameIndex},
    model::entity::Entity,
    tree::index::{NodeKey, SortKey, TreeEntry, entity_label},
};

/// Owned copy of everything one subtree load reads. Built on the main thread.
#[derive(Clone, Debug)]
pub struct SubtreeSnapshot {
    pub parent: NodeKey,
    pub generation: u64,
    pub entities: Vec<Entity>,
    /// Point count and first frame of each track among `entities`.
    pub tracks: HashMap<EntityId, (usize, Option<FrameIndex>)>,
}

#[derive(Clone, Debug)]
/// Children of `parent`, sorted, ready to be linked into the tree.
pub struct LoadedSubtree {
    pub parent: NodeKey,
    pub generation: u64,
    pub entries: Vec<TreeEntry>,
}

/// Turn a snapshot into sorted tree entries. Pure; runs on a worker thread.
pub fn build_entries(snapshot: SubtreeSnapshot) -> LoadedSubtree {
    let SubtreeSnapshot {
        parent,
        generation,
        entities,
        tracks,
    } = snapshot;

    let mut entries: Vec<TreeEntry> = entities
        .iter()
        .map(|e| {
            let (count, first) = tracks.get(&e.id).copied().unwrap_or((0, None));
            TreeEntry {
                key: NodeKey::Entity(e.id),
                parent,
                label: entity_label(e, count),
                sort: SortKey::new(e.frame().or(first), e.id),
                has_children: e.is_track(),
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.sort);

    LoadedSubtree {
        parent,
        generation,
        entries,
    }
}

/// Runs subtree loads on the rayon pool and hands results back over a channel.
#[derive(Debug)]
pub struct SubtreeLoader {
    tx: Sender<LoadedSubtree>,
    rx: Receiver<LoadedSubtree>,
    in_flight: usize,
}

impl Default for SubtreeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtreeLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, in_flight: 0 }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn schedule(&mut self, snapshot: SubtreeSnapshot) {
        let tx = self.tx.clone();
        self.in_flight += 1;
        rayon::spawn(move || {
            let parent = snapshot.parent;
            if tx.send(build_entries(snapshot)).is_err() {
                tracing::debug!(?parent, "tree dropped before subtree load finished");
            }
        });
    }

    /// Results that have already arrived. Never blocks.
    pub fn try_collect(&mut self) -> Vec<LoadedSubtree> {
        let mut out = Vec::new();
        while let Ok(loaded) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            out.push(loaded);
        }
        out
    }

    /// Wait for every scheduled load.
    pub fn collect_blocking(&mut self) -> Vec<LoadedSubtree> {
        let mut out = Vec::new();
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(loaded) => {
                    self.in_flight -= 1;
                    out.push(loaded);
                }
                Err(_) => break,
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tree/loader.rs"]
mod tests;
