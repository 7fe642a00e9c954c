pub(crate) mod entity;
pub(crate) mod geometry;
pub(crate) mod marker_type;
