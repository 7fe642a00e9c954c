//! Type-level operations that cascade into entities and tracks.

use crate::{
    foundation::core::{EntityId, TypeId},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::marker_type::Mode,
    store::entity_store::EntityStore,
    tracks::aggregator::TrackAggregator,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Entities touched by a retyping operation.
pub struct RetypeOutcome {
    /// Entities deleted, tracks included.
    pub removed: Vec<EntityId>,
    /// Entities that now point at a different type.
    pub changed: Vec<EntityId>,
}

/// Switch a type to another mode.
///
/// Existing entities cannot survive a mode change. If the type has any, the caller must pass
/// `confirm = true`; they are then deleted (tracks with all their points) before the mode flips.
#[tracing::instrument(skip(store, tracks))]
pub fn change_mode(
    store: &mut EntityStore,
    tracks: &mut TrackAggregator,
    type_id: TypeId,
    new_mode: Mode,
    confirm: bool,
) -> AnnotrackResult<RetypeOutcome> {
    let t = store.types().require(type_id)?;
    if t.mode == new_mode {
        return Ok(RetypeOutcome::default());
    }
    let affected = store.query_all_of_type(type_id).len();
    if affected > 0 && !confirm {
        return Err(AnnotrackError::ConfirmationRequired(format!(
            "changing '{}' from {} to {} deletes {affected} entities",
            t.name, t.mode, new_mode
        )));
    }

    let removed = cascade_delete(store, tracks, type_id)?;
    store.set_type_mode(type_id, new_mode)?;
    tracing::debug!(
        type_id = type_id.0,
        mode = %new_mode,
        removed = removed.len(),
        "type mode changed"
    );
    Ok(RetypeOutcome {
        removed,
        changed: Vec::new(),
    })
}

/// Delete a type, either with all its entities or after moving them to `reassign_to`.
///
/// The reassignment target must be a different type of the same mode.
#[tracing::instrument(skip(store, tracks))]
pub fn delete_type(
    store: &mut EntityStore,
    tracks: &mut TrackAggregator,
    type_id: TypeId,
    reassign_to: Option<TypeId>,
) -> AnnotrackResult<RetypeOutcome> {
    let mode = store.types().require(type_id)?.mode;

    let outcome = match reassign_to {
        None => RetypeOutcome {
            removed: cascade_delete(store, tracks, type_id)?,
            changed: Vec::new(),
        },
        Some(target) => {
            if target == type_id {
                return Err(AnnotrackError::validation(
                    "cannot reassign entities to the type being deleted",
                ));
            }
            let target_type = store.types().require(target)?;
            if target_type.mode != mode {
                return Err(AnnotrackError::incompatible_mode(format!(
                    "type '{}' is {}, expected {mode}",
                    target_type.name, target_type.mode
                )));
            }
            let ids: Vec<EntityId> = store
                .query_all_of_type(type_id)
                .into_iter()
                .map(|e| e.id)
                .collect();
            for id in &ids {
                store.modify(*id, |e| e.type_id = target)?;
            }
            RetypeOutcome {
                removed: Vec::new(),
                changed: ids,
            }
        }
    };

    store.remove_type(type_id)?;
    tracing::debug!(
        type_id = type_id.0,
        removed = outcome.removed.len(),
        reassigned = outcome.changed.len(),
        "type deleted"
    );
    Ok(outcome)
}

/// Move one entity to another type of the same mode.
///
/// Retyping a track carries its points along. A single track point cannot be retyped on its
/// own; it always shares its track's type.
pub fn change_type(
    store: &mut EntityStore,
    entity: EntityId,
    new_type: TypeId,
) -> AnnotrackResult<RetypeOutcome> {
    let e = store.require(entity)?;
    let target = store.types().require(new_type)?;
    if e.type_id == new_type {
        return Ok(RetypeOutcome::default());
    }
    if e.track().is_some() {
        return Err(AnnotrackError::incompatible_mode(format!(
            "entity {} is a track point; retype its track instead",
            entity.0
        )));
    }
    if e.mode() != target.mode {
        return Err(AnnotrackError::incompatible_mode(format!(
            "entity {} is {}, type '{}' is {}",
            entity.0,
            e.mode(),
            target.name,
            target.mode
        )));
    }

    let mut changed = vec![entity];
    if e.is_track() {
        changed.extend(store.query_by_track(entity).into_iter().map(|p| p.id));
    }
    for id in &changed {
        store.modify(*id, |e| e.type_id = new_type)?;
    }
    Ok(RetypeOutcome {
        removed: Vec::new(),
        changed,
    })
}

fn cascade_delete(
    store: &mut EntityStore,
    tracks: &mut TrackAggregator,
    type_id: TypeId,
) -> AnnotrackResult<Vec<EntityId>> {
    let mut removed = Vec::new();
    let top: Vec<(EntityId, bool)> = store
        .query_by_type(type_id)
        .into_iter()
        .map(|e| (e.id, e.is_track()))
        .collect();
    for (id, is_track) in top {
        if is_track && tracks.contains_track(id) {
            let out = tracks.delete_track(store, id)?;
            removed.extend_from_slice(out.removed());
            removed.push(id);
        } else {
            store.remove(id)?;
            removed.push(id);
        }
    }
    // Points left out of the frame maps (orphans, duplicate frames).
    let leftovers: Vec<EntityId> = store
        .query_all_of_type(type_id)
        .into_iter()
        .map(|e| e.id)
        .collect();
    for id in leftovers {
        store.remove(id)?;
        removed.push(id);
    }
    Ok(removed)
}

#[cfg(test)]
#[path = "../../tests/unit/registry/retype.rs"]
mod tests;
