use std::collections::HashMap;

use crate::{
    foundation::core::{EntityId, FrameIndex, TypeId},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{entity::Entity, marker_type::MarkerType},
    store::entity_store::EntityStore,
    tree::loader::{LoadedSubtree, SubtreeLoader, SubtreeSnapshot},
};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
/// Identity of a tree node.
pub enum NodeKey {
    Type(TypeId),
    Entity(EntityId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Sibling order: frame first (frameless entries last), then id.
pub struct SortKey {
    pub frame: u64,
    pub id: EntityId,
}

impl SortKey {
    pub fn new(frame: Option<FrameIndex>, id: EntityId) -> Self {
        Self {
            frame: frame.map_or(u64::MAX, |f| f.0),
            id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Everything the tree needs to place and label one entity.
pub struct TreeEntry {
    pub key: NodeKey,
    pub parent: NodeKey,
    pub label: String,
    pub sort: SortKey,
    pub has_children: bool,
}

impl TreeEntry {
    /// Entry of entity `id` as currently stored.
    pub fn from_store(store: &EntityStore, id: EntityId) -> Option<Self> {
        let e = store.get(id)?;
        let parent = match e.track() {
            Some(track) => NodeKey::Entity(track),
            None => NodeKey::Type(e.type_id),
        };
        let (count, first) = if e.is_track() {
            let points = store.query_by_track(id);
            (points.len(), points.first().and_then(|p| p.frame()))
        } else {
            (0, None)
        };
        Some(Self {
            key: NodeKey::Entity(id),
            parent,
            label: entity_label(e, count),
            sort: SortKey::new(e.frame().or(first), id),
            has_children: e.is_track(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where a node lands among its siblings.
pub enum InsertHint {
    Before(NodeKey),
    After(NodeKey),
    /// Parent had no other children.
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Structural change for the tree widget to mirror.
pub enum TreeChange {
    Inserted {
        key: NodeKey,
        parent: Option<NodeKey>,
        hint: InsertHint,
    },
    Moved {
        key: NodeKey,
        from: NodeKey,
        to: NodeKey,
        hint: InsertHint,
    },
    Relabeled {
        key: NodeKey,
        label: String,
    },
    Removed {
        key: NodeKey,
    },
    /// A background load landed and replaced the placeholder.
    Loaded {
        parent: NodeKey,
        children: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Row shown under an expanded node.
pub enum TreeItem {
    Node(NodeKey),
    /// Placeholder while children are loading.
    Loading,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Children {
    Unloaded,
    Loading { generation: u64 },
    Loaded(Vec<NodeKey>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParentState {
    Missing,
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PendingOp {
    Update(TreeEntry),
    Delete(NodeKey),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
    pub label: String,
    pub sort: SortKey,
    pub has_children: bool,
    pub expanded: bool,
    children: Children,
}

impl TreeNode {
    fn from_entry(entry: TreeEntry) -> Self {
        Self {
            key: entry.key,
            parent: Some(entry.parent),
            label: entry.label,
            sort: entry.sort,
            has_children: entry.has_children,
            expanded: false,
            children: Children::Unloaded,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.children, Children::Loading { .. })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.children, Children::Loaded(_))
    }
}

pub fn type_label(t: &MarkerType, count: usize) -> String {
    format!("{} ({count})", t.name)
}

pub fn entity_label(e: &Entity, point_count: usize) -> String {
    if e.is_track() {
        return format!("track {} ({point_count} points)", e.id.0);
    }
    let frame = e.frame().map_or(0, |f| f.0);
    if e.track().is_some() {
        let anchor = e.marker().map(|m| m.geometry.anchor()).unwrap_or_default();
        return format!("frame {frame}: ({:.1}, {:.1})", anchor.x, anchor.y);
    }
    format!("{} {} @ frame {frame}", e.mode(), e.id.0)
}

/// Lazily populated hierarchy: types, their top-level entities, and track points under tracks.
///
/// Children are loaded on first expand by a background task working on a snapshot. Until
/// [`TreeIndex::poll`] applies the result, the node shows a loading placeholder, and updates
/// aimed at it are queued and replayed once the load lands. A load whose node was collapsed or
/// removed in the meantime is dropped.
#[derive(Debug, Default)]
pub struct TreeIndex {
    nodes: HashMap<NodeKey, TreeNode>,
    roots: Vec<NodeKey>,
    loader: SubtreeLoader,
    generation: u64,
    pending: HashMap<NodeKey, Vec<PendingOp>>,
    selected: Option<NodeKey>,
    reveal: Option<NodeKey>,
}

impl TreeIndex {
    /// One collapsed root per type.
    pub fn build(store: &EntityStore) -> Self {
        let mut tree = Self::default();
        for t in store.types().iter() {
            tree.upsert_type(store, t.id);
        }
        tree
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn node(&self, key: NodeKey) -> Option<&TreeNode> {
        self.nodes.get(&key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn loads_in_flight(&self) -> usize {
        self.loader.in_flight()
    }

    /// Rows under `key` as the widget should show them.
    pub fn children(&self, key: NodeKey) -> Vec<TreeItem> {
        let Some(node) = self.nodes.get(&key).filter(|n| n.expanded) else {
            return Vec::new();
        };
        match &node.children {
            Children::Unloaded => Vec::new(),
            Children::Loading { .. } => vec![TreeItem::Loading],
            Children::Loaded(keys) => keys.iter().copied().map(TreeItem::Node).collect(),
        }
    }

    // ---- types ----

    /// Add a root for a new type, or relabel an existing one.
    pub fn upsert_type(&mut self, store: &EntityStore, type_id: TypeId) -> Vec<TreeChange> {
        let key = NodeKey::Type(type_id);
        if self.nodes.contains_key(&key) {
            return self.refresh(store, key).into_iter().collect();
        }
        let Some(t) = store.types().get(type_id) else {
            return Vec::new();
        };
        self.nodes.insert(
            key,
            TreeNode {
                key,
                parent: None,
                label: type_label(t, store.query_by_type(type_id).len()),
                sort: SortKey::new(None, EntityId(type_id.0)),
                has_children: true,
                expanded: false,
                children: Children::Unloaded,
            },
        );
        let idx = self.roots.partition_point(|k| *k < key);
        let hint = match (self.roots.get(idx), idx.checked_sub(1).and_then(|i| self.roots.get(i))) {
            (Some(next), _) => InsertHint::Before(*next),
            (None, Some(prev)) => InsertHint::After(*prev),
            (None, None) => InsertHint::End,
        };
        self.roots.insert(idx, key);
        vec![TreeChange::Inserted {
            key,
            parent: None,
            hint,
        }]
    }

    pub fn remove_type(&mut self, type_id: TypeId) -> Vec<TreeChange> {
        let key = NodeKey::Type(type_id);
        if !self.nodes.contains_key(&key) {
            return Vec::new();
        }
        self.drop_subtree(key);
        self.roots.retain(|k| *k != key);
        vec![TreeChange::Removed { key }]
    }

    // ---- expand / collapse ----

    /// Expand a node, scheduling a background load of its children on first use.
    #[tracing::instrument(skip(self, store))]
    pub fn expand(&mut self, store: &EntityStore, key: NodeKey) -> AnnotrackResult<()> {
        let node = self
            .nodes
            .get_mut(&key)
            .ok_or_else(|| AnnotrackError::not_found(format!("tree node {key:?}")))?;
        if !node.has_children {
            return Ok(());
        }
        node.expanded = true;
        if node.children == Children::Unloaded {
            self.generation += 1;
            let generation = self.generation;
            node.children = Children::Loading { generation };
            self.loader.schedule(snapshot(store, key, generation));
            tracing::debug!(?key, generation, "subtree load scheduled");
        }
        Ok(())
    }

    /// Collapse a node. A load still in flight for it is abandoned.
    pub fn collapse(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(&key) else {
            return;
        };
        node.expanded = false;
        if node.is_loading() {
            node.children = Children::Unloaded;
            self.pending.remove(&key);
        }
    }

    /// Apply finished background loads. Never blocks.
    pub fn poll(&mut self, store: &EntityStore) -> Vec<TreeChange> {
        let loaded = self.loader.try_collect();
        self.apply_loads(store, loaded)
    }

    /// Wait for every load in flight and apply it.
    pub fn finish_loads(&mut self, store: &EntityStore) -> Vec<TreeChange> {
        let mut changes = Vec::new();
        // Applying a load can schedule more (path reveal), so drain until idle.
        while self.loader.in_flight() > 0 {
            let loaded = self.loader.collect_blocking();
            changes.extend(self.apply_loads(store, loaded));
        }
        changes
    }

    fn apply_loads(&mut self, store: &EntityStore, loaded: Vec<LoadedSubtree>) -> Vec<TreeChange> {
        let mut changes = Vec::new();
        for subtree in loaded {
            changes.extend(self.apply_load(store, subtree));
        }
        if !changes.is_empty() && self.reveal.is_some() {
            self.continue_reveal(store);
        }
        changes
    }

    fn apply_load(&mut self, store: &EntityStore, subtree: LoadedSubtree) -> Vec<TreeChange> {
        let parent = subtree.parent;
        let current = matches!(
            self.nodes.get(&parent).map(|n| &n.children),
            Some(Children::Loading { generation }) if *generation == subtree.generation
        );
        if !current {
            tracing::debug!(?parent, generation = subtree.generation, "stale subtree load dropped");
            return Vec::new();
        }

        let mut keys = Vec::with_capacity(subtree.entries.len());
        for entry in subtree.entries {
            if self.nodes.contains_key(&entry.key) {
                self.detach(entry.key);
            }
            keys.push(entry.key);
            self.nodes.insert(entry.key, TreeNode::from_entry(entry));
        }
        let children = keys.len();
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = Children::Loaded(keys);
        }

        let mut changes = vec![TreeChange::Loaded { parent, children }];
        for op in self.pending.remove(&parent).unwrap_or_default() {
            match op {
                PendingOp::Update(entry) => changes.extend(self.update_entry(store, entry)),
                PendingOp::Delete(key) => changes.extend(self.delete_entry(store, key)),
            }
        }
        changes
    }

    // ---- incremental updates ----

    /// Place or refresh one entity after it was created or changed.
    ///
    /// Under a loaded parent the node is inserted, moved, or relabeled. Under a loading parent
    /// the entry is queued. Under a parent never loaded only the parent label changes.
    pub fn update_entry(&mut self, store: &EntityStore, entry: TreeEntry) -> Vec<TreeChange> {
        let mut changes = Vec::new();
        let key = entry.key;
        let parent = entry.parent;
        let old_parent = self.nodes.get(&key).and_then(|n| n.parent);

        match self.parent_state(parent) {
            ParentState::Loaded => {
                let moved = old_parent.is_some_and(|old| old != parent);
                let resorted = self.nodes.get(&key).is_some_and(|n| n.sort != entry.sort);
                match old_parent {
                    Some(old) if moved || resorted => {
                        self.unlink(old, key);
                        if let Some(node) = self.nodes.get_mut(&key) {
                            node.parent = Some(parent);
                            node.sort = entry.sort;
                        }
                        let hint = self.link_sorted(parent, key);
                        changes.push(TreeChange::Moved {
                            key,
                            from: old,
                            to: parent,
                            hint,
                        });
                        if moved {
                            changes.extend(self.refresh(store, old));
                        }
                    }
                    Some(_) => {}
                    None => {
                        self.nodes.insert(key, TreeNode::from_entry(entry.clone()));
                        let hint = self.link_sorted(parent, key);
                        changes.push(TreeChange::Inserted {
                            key,
                            parent: Some(parent),
                            hint,
                        });
                    }
                }
                if let Some(node) = self.nodes.get_mut(&key)
                    && node.label != entry.label
                {
                    node.label = entry.label.clone();
                    changes.push(TreeChange::Relabeled {
                        key,
                        label: entry.label,
                    });
                }
            }
            ParentState::Loading => {
                if let Some(old) = old_parent {
                    self.detach(key);
                    changes.push(TreeChange::Removed { key });
                    changes.extend(self.refresh(store, old));
                }
                self.pending
                    .entry(parent)
                    .or_default()
                    .push(PendingOp::Update(entry));
            }
            ParentState::Unloaded => {
                if let Some(old) = old_parent {
                    self.detach(key);
                    changes.push(TreeChange::Removed { key });
                    changes.extend(self.refresh(store, old));
                }
            }
            ParentState::Missing => {
                if old_parent.is_some() {
                    self.detach(key);
                    changes.push(TreeChange::Removed { key });
                }
                return changes;
            }
        }

        changes.extend(self.refresh(store, parent));
        if let NodeKey::Entity(track) = parent
            && let Some(t) = store.get(track)
        {
            changes.extend(self.refresh(store, NodeKey::Type(t.type_id)));
        }
        changes
    }

    /// Convenience for [`Self::update_entry`] reading the entry from the store.
    pub fn update_entity(&mut self, store: &EntityStore, id: EntityId) -> Vec<TreeChange> {
        match TreeEntry::from_store(store, id) {
            Some(entry) => self.update_entry(store, entry),
            None => self.delete_entry(store, NodeKey::Entity(id)),
        }
    }

    /// Remove a node with its subtree and relabel its parent.
    ///
    /// If the node is not in the tree, the deletion is queued for every parent still loading.
    pub fn delete_entry(&mut self, store: &EntityStore, key: NodeKey) -> Vec<TreeChange> {
        let Some(node) = self.nodes.get(&key) else {
            let loading: Vec<NodeKey> = self
                .nodes
                .values()
                .filter(|n| n.is_loading())
                .map(|n| n.key)
                .collect();
            for parent in loading {
                self.pending
                    .entry(parent)
                    .or_default()
                    .push(PendingOp::Delete(key));
            }
            return Vec::new();
        };
        let parent = node.parent;
        self.detach(key);
        self.roots.retain(|k| *k != key);

        let mut changes = vec![TreeChange::Removed { key }];
        if let Some(p) = parent {
            changes.extend(self.refresh(store, p));
        }
        changes
    }

    /// Recompute a node's label from the store.
    pub fn refresh(&mut self, store: &EntityStore, key: NodeKey) -> Option<TreeChange> {
        let label = match key {
            NodeKey::Type(id) => type_label(store.types().get(id)?, store.query_by_type(id).len()),
            NodeKey::Entity(id) => TreeEntry::from_store(store, id)?.label,
        };
        let node = self.nodes.get_mut(&key)?;
        if node.label == label {
            return None;
        }
        node.label = label.clone();
        Some(TreeChange::Relabeled { key, label })
    }

    // ---- selection ----

    pub fn select(&mut self, key: NodeKey) -> bool {
        if self.nodes.contains_key(&key) {
            self.selected = Some(key);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<NodeKey> {
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Expand every ancestor of `key` and select it once it is in the tree.
    ///
    /// Ancestors are loaded one level at a time; the walk resumes as loads land.
    pub fn expand_path(&mut self, store: &EntityStore, key: NodeKey) -> AnnotrackResult<()> {
        if let NodeKey::Entity(id) = key {
            store.require(id)?;
        }
        self.reveal = Some(key);
        self.continue_reveal(store);
        Ok(())
    }

    fn continue_reveal(&mut self, store: &EntityStore) {
        let Some(target) = self.reveal else {
            return;
        };
        for ancestor in ancestors(store, target) {
            let Some(node) = self.nodes.get(&ancestor) else {
                return;
            };
            if node.is_loading() {
                return;
            }
            if !node.expanded || !node.is_loaded() {
                if self.expand(store, ancestor).is_err() {
                    self.reveal = None;
                    return;
                }
                if self.nodes.get(&ancestor).is_some_and(TreeNode::is_loading) {
                    return;
                }
            }
        }
        if self.select(target) {
            self.reveal = None;
        }
    }

    // ---- internals ----

    fn parent_state(&self, parent: NodeKey) -> ParentState {
        match self.nodes.get(&parent).map(|n| &n.children) {
            None => ParentState::Missing,
            Some(Children::Unloaded) => ParentState::Unloaded,
            Some(Children::Loading { .. }) => ParentState::Loading,
            Some(Children::Loaded(_)) => ParentState::Loaded,
        }
    }

    fn link_sorted(&mut self, parent: NodeKey, key: NodeKey) -> InsertHint {
        let sort = self.nodes.get(&key).map(|n| n.sort);
        let Some(Children::Loaded(list)) = self.nodes.get(&parent).map(|n| &n.children) else {
            return InsertHint::End;
        };
        let idx = list.partition_point(|k| self.nodes.get(k).map(|n| n.sort) < sort);
        let hint = match (list.get(idx), idx.checked_sub(1).and_then(|i| list.get(i))) {
            (Some(next), _) => InsertHint::Before(*next),
            (None, Some(prev)) => InsertHint::After(*prev),
            (None, None) => InsertHint::End,
        };
        if let Some(Children::Loaded(list)) = self.nodes.get_mut(&parent).map(|n| &mut n.children)
        {
            list.insert(idx, key);
        }
        hint
    }

    fn unlink(&mut self, parent: NodeKey, key: NodeKey) {
        if let Some(Children::Loaded(list)) = self.nodes.get_mut(&parent).map(|n| &mut n.children)
        {
            list.retain(|k| *k != key);
        }
    }

    /// Unlink a node from its parent and drop it with its subtree.
    fn detach(&mut self, key: NodeKey) {
        if let Some(parent) = self.nodes.get(&key).and_then(|n| n.parent) {
            self.unlink(parent, key);
        }
        self.drop_subtree(key);
    }

    fn drop_subtree(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            let Some(node) = self.nodes.remove(&k) else {
                continue;
            };
            if let Children::Loaded(children) = node.children {
                stack.extend(children);
            }
            self.pending.remove(&k);
            if self.selected == Some(k) {
                self.selected = None;
            }
        }
    }
}

/// Owned snapshot of the children of `parent`.
fn snapshot(store: &EntityStore, parent: NodeKey, generation: u64) -> SubtreeSnapshot {
    let entities: Vec<Entity> = match parent {
        NodeKey::Type(t) => store.query_by_type(t).into_iter().cloned().collect(),
        NodeKey::Entity(track) => store.query_by_track(track).into_iter().cloned().collect(),
    };
    let tracks = entities
        .iter()
        .filter(|e| e.is_track())
        .map(|e| {
            let points = store.query_by_track(e.id);
            (e.id, (points.len(), points.first().and_then(|p| p.frame())))
        })
        .collect();
    SubtreeSnapshot {
        parent,
        generation,
        entities,
        tracks,
    }
}

/// Ancestors of a node, root first.
fn ancestors(store: &EntityStore, key: NodeKey) -> Vec<NodeKey> {
    let NodeKey::Entity(id) = key else {
        return Vec::new();
    };
    let Some(e) = store.get(id) else {
        return Vec::new();
    };
    match e.track() {
        Some(track) => vec![NodeKey::Type(e.type_id), NodeKey::Entity(track)],
        None => vec![NodeKey::Type(e.type_id)],
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tree/index.rs"]
mod tests;
