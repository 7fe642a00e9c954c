use std::collections::BTreeMap;

use crate::{
    foundation::core::TypeId,
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::marker_type::{MarkerType, Mode},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One entry of a bulk type import.
pub struct TypeDefinition {
    pub id: TypeId,
    pub name: String,
    pub mode: Mode,
    pub color: String,
}

/// In-memory catalog of marker types, keyed by id with unique names.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeId, MarkerType>,
    next_id: u64,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a registry from stored types, validating name uniqueness.
    pub fn from_types(types: impl IntoIterator<Item = MarkerType>) -> AnnotrackResult<Self> {
        let mut out = Self::new();
        for t in types {
            out.insert(t)?;
        }
        Ok(out)
    }

    /// Create a new type. Fails with [`AnnotrackError::DuplicateName`] if the name is taken.
    pub fn create_type(
        &mut self,
        name: &str,
        mode: Mode,
        color: &str,
    ) -> AnnotrackResult<MarkerType> {
        let name = validate_name(name)?;
        if self.by_name(&name).is_some() {
            return Err(AnnotrackError::DuplicateName(name));
        }
        let t = MarkerType::new(TypeId(self.next_id), name, mode, color);
        self.insert(t.clone())?;
        Ok(t)
    }

    /// Insert a fully specified type (id chosen by the caller).
    pub fn insert(&mut self, t: MarkerType) -> AnnotrackResult<()> {
        let name = validate_name(&t.name)?;
        if self.types.contains_key(&t.id) {
            return Err(AnnotrackError::validation(format!(
                "type id {} already exists",
                t.id.0
            )));
        }
        if self.by_name(&name).is_some() {
            return Err(AnnotrackError::DuplicateName(name));
        }
        self.next_id = self.next_id.max(id_after(t.id)?);
        self.types.insert(t.id, MarkerType { name, ..t });
        Ok(())
    }

    /// Bulk import. Entries whose id or name already exist (in the registry or earlier in
    /// `defs`) are skipped.
    ///
    /// Every entry is checked before anything is inserted, so an invalid entry leaves the
    /// registry unchanged. Returns the ids that were actually created.
    pub fn define_types(&mut self, defs: &[TypeDefinition]) -> AnnotrackResult<Vec<TypeId>> {
        let mut staged: Vec<MarkerType> = Vec::new();
        let mut next_id = self.next_id;
        for def in defs {
            let name = validate_name(&def.name)?;
            let known = self.types.contains_key(&def.id) || self.by_name(&name).is_some();
            let repeated = staged.iter().any(|t| t.id == def.id || t.name == name);
            if known || repeated {
                tracing::debug!(id = def.id.0, name = %def.name, "type already defined");
                continue;
            }
            next_id = next_id.max(id_after(def.id)?);
            staged.push(MarkerType::new(def.id, name, def.mode, def.color.as_str()));
        }

        self.next_id = next_id;
        let created = staged.iter().map(|t| t.id).collect();
        for t in staged {
            self.types.insert(t.id, t);
        }
        Ok(created)
    }

    pub fn get(&self, id: TypeId) -> Option<&MarkerType> {
        self.types.get(&id)
    }

    pub fn require(&self, id: TypeId) -> AnnotrackResult<&MarkerType> {
        self.types
            .get(&id)
            .ok_or_else(|| AnnotrackError::not_found(format!("marker type {}", id.0)))
    }

    pub fn by_name(&self, name: &str) -> Option<&MarkerType> {
        self.types.values().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkerType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Apply `f` to a type. Name changes are re-validated; mode changes are refused
    /// (they cascade, see [`crate::change_mode`]).
    pub fn update(&mut self, id: TypeId, f: impl FnOnce(&mut MarkerType)) -> AnnotrackResult<()> {
        let current = self.require(id)?;
        let mut next = current.clone();
        f(&mut next);
        if next.id != id {
            return Err(AnnotrackError::validation("type id cannot change"));
        }
        if next.mode != current.mode {
            return Err(AnnotrackError::validation(
                "type mode changes must go through change_mode",
            ));
        }
        next.name = validate_name(&next.name)?;
        if let Some(other) = self.by_name(&next.name)
            && other.id != id
        {
            return Err(AnnotrackError::DuplicateName(next.name));
        }
        self.types.insert(id, next);
        Ok(())
    }

    pub(crate) fn set_mode(&mut self, id: TypeId, mode: Mode) -> AnnotrackResult<()> {
        let t = self
            .types
            .get_mut(&id)
            .ok_or_else(|| AnnotrackError::not_found(format!("marker type {}", id.0)))?;
        t.mode = mode;
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: TypeId) -> Option<MarkerType> {
        self.types.remove(&id)
    }
}

/// Smallest id the registry may hand out after `id`.
fn id_after(id: TypeId) -> AnnotrackResult<u64> {
    id.0
        .checked_add(1)
        .ok_or_else(|| AnnotrackError::validation(format!("type id {} is out of range", id.0)))
}

fn validate_name(name: &str) -> AnnotrackResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AnnotrackError::validation("type name must be non-empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
#[path = "../../tests/unit/registry/types.rs"]
mod tests;
