use std::collections::BTreeMap;

use crate::{
    foundation::error::{AnnotrackError, AnnotrackResult},
    store::persistence::{Fields, PersistenceBackend, RowFilter, Table},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Write counters, used to check that flushes never write unchanged rows.
pub struct WriteStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

/// Backend that keeps every table in ordered maps and round-trips through JSON.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct MemoryBackend {
    tables: BTreeMap<Table, BTreeMap<u64, Fields>>,
    #[serde(skip)]
    stats: WriteStats,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> AnnotrackResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string_pretty(&self) -> AnnotrackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Copy every row visible through another backend.
    pub fn snapshot_of(backend: &dyn PersistenceBackend) -> AnnotrackResult<Self> {
        let mut out = Self::new();
        for table in Table::ALL {
            let rows = backend.query(table, &RowFilter::all())?;
            if rows.is_empty() {
                continue;
            }
            out.tables.insert(table, rows.into_iter().collect());
        }
        Ok(out)
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    pub fn row(&self, table: Table, id: u64) -> Option<&Fields> {
        self.tables.get(&table).and_then(|t| t.get(&id))
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.tables.get(&table).map_or(0, BTreeMap::len)
    }
}

impl PersistenceBackend for MemoryBackend {
    fn insert(&mut self, table: Table, id: u64, fields: &Fields) -> AnnotrackResult<()> {
        let rows = self.tables.entry(table).or_default();
        if rows.contains_key(&id) {
            return Err(AnnotrackError::persistence(format!(
                "{table:?} row {id} already exists"
            )));
        }
        rows.insert(id, fields.clone());
        self.stats.inserts += 1;
        Ok(())
    }

    fn update(&mut self, table: Table, id: u64, fields: &Fields) -> AnnotrackResult<()> {
        let row = self
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| {
                AnnotrackError::persistence(format!("{table:?} row {id} does not exist"))
            })?;
        for (k, v) in fields {
            row.insert(k.clone(), v.clone());
        }
        self.stats.updates += 1;
        Ok(())
    }

    fn delete(&mut self, table: Table, id: u64) -> AnnotrackResult<()> {
        let removed = self
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.remove(&id));
        if removed.is_none() {
            return Err(AnnotrackError::persistence(format!(
                "{table:?} row {id} does not exist"
            )));
        }
        self.stats.deletes += 1;
        Ok(())
    }

    fn query(&self, table: Table, filter: &RowFilter) -> AnnotrackResult<Vec<(u64, Fields)>> {
        let Some(rows) = self.tables.get(&table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|(_, fields)| filter.matches(fields))
            .map(|(id, fields)| (*id, fields.clone()))
            .collect())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/memory.rs"]
mod tests;
