pub(crate) mod config;
pub(crate) mod interaction;
#[allow(clippy::module_inception)]
pub(crate) mod session;
