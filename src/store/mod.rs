pub(crate) mod entity_store;
pub(crate) mod memory;
pub(crate) mod persistence;
pub(crate) mod rows;
