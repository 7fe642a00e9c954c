use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    foundation::core::{EntityId, FrameIndex, Point, TypeId},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{
        entity::{Entity, EntityKind, Marker, TrackInfo},
        geometry::Geometry,
        marker_type::{MarkerType, Mode},
    },
    registry::types::{TypeDefinition, TypeRegistry},
    store::{
        memory::MemoryBackend,
        persistence::{Fields, PersistenceBackend, RowFilter, Table},
        rows,
    },
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Rows written by one [`EntityStore::save`] call.
pub struct SaveReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveReport {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum RowKey {
    Type(TypeId),
    Entity(EntityId),
}

enum PendingWrite {
    Insert(Fields),
    Update(Fields),
    Delete,
}

/// Authoritative in-memory state of types and entities, flushed in batches to a backend.
///
/// Every mutation marks the touched row dirty. [`EntityStore::save`] compares dirty rows with
/// the snapshot taken at the last flush and writes only what changed.
pub struct EntityStore {
    backend: Box<dyn PersistenceBackend>,
    types: TypeRegistry,
    entities: BTreeMap<EntityId, Entity>,
    by_frame: BTreeMap<FrameIndex, BTreeSet<EntityId>>,
    next_entity: u64,
    dirty: BTreeSet<RowKey>,
    persisted: HashMap<RowKey, (Table, Fields)>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("types", &self.types.len())
            .field("entities", &self.entities.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

impl EntityStore {
    /// Empty store backed by a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            types: TypeRegistry::new(),
            entities: BTreeMap::new(),
            by_frame: BTreeMap::new(),
            next_entity: 1,
            dirty: BTreeSet::new(),
            persisted: HashMap::new(),
        }
    }

    /// Load every type and entity row from `backend`. Loaded rows start clean.
    #[tracing::instrument(skip(backend))]
    pub fn open(backend: Box<dyn PersistenceBackend>) -> AnnotrackResult<Self> {
        let mut persisted = HashMap::new();

        let mut types = Vec::new();
        for (id, fields) in backend.query(Table::Type, &RowFilter::all())? {
            types.push(rows::decode_type(id, &fields)?);
            persisted.insert(RowKey::Type(TypeId(id)), (Table::Type, fields));
        }
        let types = TypeRegistry::from_types(types)?;

        let mut store = Self {
            backend,
            types,
            entities: BTreeMap::new(),
            by_frame: BTreeMap::new(),
            next_entity: 1,
            dirty: BTreeSet::new(),
            persisted,
        };

        for table in Table::ALL {
            if table == Table::Type {
                continue;
            }
            for (id, fields) in store.backend.query(table, &RowFilter::all())? {
                let entity = rows::decode_entity(table, id, &fields)?;
                if store.types.get(entity.type_id).is_none() {
                    return Err(AnnotrackError::not_found(format!(
                        "{table:?} row {id} references missing type {}",
                        entity.type_id.0
                    )));
                }
                store.next_entity = store.next_entity.max(entity_id_after(id)?);
                store
                    .persisted
                    .insert(RowKey::Entity(entity.id), (table, fields));
                store.index_insert(&entity);
                store.entities.insert(entity.id, entity);
            }
        }

        tracing::debug!(
            types = store.types.len(),
            entities = store.entities.len(),
            "entity store opened"
        );
        Ok(store)
    }

    pub fn backend(&self) -> &dyn PersistenceBackend {
        self.backend.as_ref()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    // ---- types ----

    pub fn create_type(&mut self, name: &str, mode: Mode, color: &str) -> AnnotrackResult<MarkerType> {
        let t = self.types.create_type(name, mode, color)?;
        self.dirty.insert(RowKey::Type(t.id));
        Ok(t)
    }

    /// Idempotent bulk import; see [`TypeRegistry::define_types`].
    pub fn define_types(&mut self, defs: &[TypeDefinition]) -> AnnotrackResult<Vec<TypeId>> {
        let created = self.types.define_types(defs)?;
        self.dirty.extend(created.iter().map(|id| RowKey::Type(*id)));
        Ok(created)
    }

    /// Edit name, color, style, text, or visibility of a type.
    pub fn update_type(
        &mut self,
        id: TypeId,
        f: impl FnOnce(&mut MarkerType),
    ) -> AnnotrackResult<()> {
        self.types.update(id, f)?;
        self.dirty.insert(RowKey::Type(id));
        Ok(())
    }

    pub(crate) fn set_type_mode(&mut self, id: TypeId, mode: Mode) -> AnnotrackResult<()> {
        self.types.set_mode(id, mode)?;
        self.dirty.insert(RowKey::Type(id));
        Ok(())
    }

    pub(crate) fn remove_type(&mut self, id: TypeId) -> AnnotrackResult<MarkerType> {
        if self.entities.values().any(|e| e.type_id == id) {
            return Err(AnnotrackError::validation(format!(
                "type {} still has entities",
                id.0
            )));
        }
        let t = self
            .types
            .remove(id)
            .ok_or_else(|| AnnotrackError::not_found(format!("marker type {}", id.0)))?;
        self.dirty.insert(RowKey::Type(id));
        Ok(t)
    }

    // ---- entities ----

    /// Create a marker of a non-track type. Track points go through the track aggregator.
    pub fn create(
        &mut self,
        type_id: TypeId,
        frame: FrameIndex,
        geometry: Geometry,
    ) -> AnnotrackResult<EntityId> {
        let t = self.types.require(type_id)?;
        if t.mode == Mode::Track {
            return Err(AnnotrackError::incompatible_mode(format!(
                "type '{}' is a track type; add points through the track aggregator",
                t.name
            )));
        }
        if t.mode != geometry.mode() {
            return Err(AnnotrackError::incompatible_mode(format!(
                "type '{}' expects {} geometry, got {}",
                t.name,
                t.mode,
                geometry.mode()
            )));
        }
        self.insert_entity(
            type_id,
            EntityKind::Marker(Marker {
                frame,
                geometry,
                track: None,
            }),
        )
    }

    pub(crate) fn insert_track(&mut self, type_id: TypeId) -> AnnotrackResult<EntityId> {
        let t = self.types.require(type_id)?;
        if t.mode != Mode::Track {
            return Err(AnnotrackError::incompatible_mode(format!(
                "type '{}' is not a track type",
                t.name
            )));
        }
        self.insert_entity(type_id, EntityKind::Track(TrackInfo::default()))
    }

    pub(crate) fn insert_track_point(
        &mut self,
        track: EntityId,
        frame: FrameIndex,
        pos: Point,
    ) -> AnnotrackResult<EntityId> {
        let track_entity = self.require(track)?;
        if !track_entity.is_track() {
            return Err(AnnotrackError::validation(format!(
                "entity {} is not a track",
                track.0
            )));
        }
        let type_id = track_entity.type_id;
        self.insert_entity(
            type_id,
            EntityKind::Marker(Marker {
                frame,
                geometry: Geometry::anchored(Mode::Track, pos),
                track: Some(track),
            }),
        )
    }

    fn insert_entity(&mut self, type_id: TypeId, kind: EntityKind) -> AnnotrackResult<EntityId> {
        let id = EntityId(self.next_entity);
        self.next_entity = entity_id_after(id.0)?;
        let entity = Entity {
            id,
            type_id,
            style: None,
            text: None,
            kind,
        };
        self.index_insert(&entity);
        self.entities.insert(id, entity);
        self.dirty.insert(RowKey::Entity(id));
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn require(&self, id: EntityId) -> AnnotrackResult<&Entity> {
        self.entities
            .get(&id)
            .ok_or_else(|| AnnotrackError::not_found(format!("entity {}", id.0)))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Edit an entity in place.
    ///
    /// The closure may change geometry (within its variant), frame, style, text, and track
    /// visibility. Changing id, type, mode, or track membership is rejected and the entity is
    /// left untouched; those go through the registry and aggregator operations.
    pub fn update(&mut self, id: EntityId, f: impl FnOnce(&mut Entity)) -> AnnotrackResult<()> {
        let current = self.require(id)?;
        let mut next = current.clone();
        f(&mut next);
        if next.id != current.id
            || next.type_id != current.type_id
            || next.mode() != current.mode()
            || next.track() != current.track()
            || std::mem::discriminant(&next.kind) != std::mem::discriminant(&current.kind)
        {
            return Err(AnnotrackError::validation(format!(
                "update of entity {} may not change id, type, mode, or track",
                id.0
            )));
        }
        if let (Some(a), Some(b)) = (current.marker(), next.marker())
            && std::mem::discriminant(&a.geometry) != std::mem::discriminant(&b.geometry)
        {
            return Err(AnnotrackError::incompatible_mode(
                "geometry variant cannot change",
            ));
        }
        if next.track().is_some() && next.frame() != current.frame() {
            return Err(AnnotrackError::validation(
                "track points change frame through the track aggregator",
            ));
        }
        self.replace(next);
        Ok(())
    }

    /// Replace without invariant checks. Used by operations that keep invariants themselves.
    pub(crate) fn replace(&mut self, entity: Entity) {
        let id = entity.id;
        if let Some(old) = self.entities.remove(&id) {
            self.index_remove(&old);
        }
        self.index_insert(&entity);
        self.entities.insert(id, entity);
        self.dirty.insert(RowKey::Entity(id));
    }

    pub(crate) fn modify(&mut self, id: EntityId, f: impl FnOnce(&mut Entity)) -> AnnotrackResult<()> {
        let mut next = self.require(id)?.clone();
        f(&mut next);
        next.id = id;
        self.replace(next);
        Ok(())
    }

    pub fn set_style(&mut self, id: EntityId, style: Option<String>) -> AnnotrackResult<()> {
        self.update(id, |e| e.style = style)
    }

    pub fn set_text(&mut self, id: EntityId, text: Option<String>) -> AnnotrackResult<()> {
        self.update(id, |e| e.text = text)
    }

    /// Delete a standalone marker. Tracks and track points are refused: they must go through
    /// the track aggregator so no track is ever left empty.
    pub fn delete(&mut self, id: EntityId) -> AnnotrackResult<Entity> {
        let e = self.require(id)?;
        if e.track().is_some() {
            return Err(AnnotrackError::validation(format!(
                "entity {} is a track point; remove it through the track aggregator",
                id.0
            )));
        }
        if e.is_track() {
            return Err(AnnotrackError::validation(format!(
                "entity {} is a track; delete it through the track aggregator",
                id.0
            )));
        }
        self.remove(id)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> AnnotrackResult<Entity> {
        let e = self
            .entities
            .remove(&id)
            .ok_or_else(|| AnnotrackError::not_found(format!("entity {}", id.0)))?;
        self.index_remove(&e);
        self.dirty.insert(RowKey::Entity(id));
        Ok(e)
    }

    // ---- queries ----

    /// Markers on `frame`, optionally of one type, in id order. Includes track points.
    pub fn query_by_frame(&self, frame: FrameIndex, type_id: Option<TypeId>) -> Vec<&Entity> {
        let Some(ids) = self.by_frame.get(&frame) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| type_id.is_none_or(|t| e.type_id == t))
            .collect()
    }

    /// Top-level entities of a type: standalone markers, or tracks for track types.
    pub fn query_by_type(&self, type_id: TypeId) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.type_id == type_id && e.is_top_level())
            .collect()
    }

    /// Every entity (tracks, markers, and track points) of a type.
    pub fn query_all_of_type(&self, type_id: TypeId) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.type_id == type_id)
            .collect()
    }

    /// Points whose track column is `track`, ordered by frame then id.
    pub fn query_by_track(&self, track: EntityId) -> Vec<&Entity> {
        let mut out: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.track() == Some(track))
            .collect();
        out.sort_by_key(|e| (e.frame(), e.id));
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ---- persistence ----

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Flush dirty rows to the backend.
    ///
    /// Inserts run parents first (types, tracks, markers) and deletes run children first.
    /// Rows equal to their last persisted snapshot are skipped. On a backend error the rows not
    /// yet written stay dirty.
    #[tracing::instrument(skip(self))]
    pub fn save(&mut self) -> AnnotrackResult<SaveReport> {
        let mut writes: Vec<(u8, RowKey, Table, PendingWrite)> = Vec::new();
        let mut clean = Vec::new();

        for key in &self.dirty {
            let current = match key {
                RowKey::Type(id) => self
                    .types
                    .get(*id)
                    .map(|t| (Table::Type, rows::encode_type(t))),
                RowKey::Entity(id) => match self.entities.get(id) {
                    Some(e) => Some((rows::table_for(e), rows::encode_entity(e)?)),
                    None => None,
                },
            };
            let previous = self.persisted.get(key);
            match (current, previous) {
                (Some((table, fields)), None) => {
                    writes.push((
                        table.dependency_rank(),
                        *key,
                        table,
                        PendingWrite::Insert(fields),
                    ));
                }
                (Some((table, fields)), Some((prev_table, prev_fields))) => {
                    if table != *prev_table {
                        return Err(AnnotrackError::validation(format!(
                            "row {key:?} moved from {prev_table:?} to {table:?}"
                        )));
                    }
                    let diff = rows::changed_fields(prev_fields, &fields);
                    if diff.is_empty() {
                        clean.push(*key);
                    } else {
                        writes.push((
                            table.dependency_rank(),
                            *key,
                            table,
                            PendingWrite::Update(diff),
                        ));
                    }
                }
                (None, Some((prev_table, _))) => {
                    writes.push((
                        u8::MAX - prev_table.dependency_rank(),
                        *key,
                        *prev_table,
                        PendingWrite::Delete,
                    ));
                }
                // Created and removed between two flushes.
                (None, None) => clean.push(*key),
            }
        }

        for key in clean {
            self.dirty.remove(&key);
        }

        // Deletes (high rank) after inserts/updates, children before parents.
        writes.sort_by_key(|(rank, key, _, _)| (*rank, *key));

        let mut report = SaveReport::default();
        for (_, key, table, write) in writes {
            let raw_id = match key {
                RowKey::Type(id) => id.0,
                RowKey::Entity(id) => id.0,
            };
            match write {
                PendingWrite::Insert(fields) => {
                    self.backend.insert(table, raw_id, &fields)?;
                    self.persisted.insert(key, (table, fields));
                    report.inserted += 1;
                }
                PendingWrite::Update(diff) => {
                    self.backend.update(table, raw_id, &diff)?;
                    if let Some((_, snapshot)) = self.persisted.get_mut(&key) {
                        for (k, v) in diff {
                            snapshot.insert(k, v);
                        }
                    }
                    report.updated += 1;
                }
                PendingWrite::Delete => {
                    self.backend.delete(table, raw_id)?;
                    self.persisted.remove(&key);
                    report.deleted += 1;
                }
            }
            self.dirty.remove(&key);
        }

        if !report.is_empty() {
            tracing::debug!(?report, "entity store flushed");
        }
        Ok(report)
    }

    fn index_insert(&mut self, e: &Entity) {
        if let Some(frame) = e.frame() {
            self.by_frame.entry(frame).or_default().insert(e.id);
        }
    }

    fn index_remove(&mut self, e: &Entity) {
        if let Some(frame) = e.frame()
            && let Some(ids) = self.by_frame.get_mut(&frame)
        {
            ids.remove(&e.id);
            if ids.is_empty() {
                self.by_frame.remove(&frame);
            }
        }
    }
}

fn entity_id_after(id: u64) -> AnnotrackResult<u64> {
    id.checked_add(1)
        .ok_or_else(|| AnnotrackError::validation(format!("entity id {id} is out of range")))
}

#[cfg(test)]
#[path = "../../tests/unit/store/entity_store.rs"]
mod tests;
