pub(crate) mod retype;
pub(crate) mod types;
