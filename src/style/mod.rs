pub(crate) mod color;
pub(crate) mod colormap;
pub(crate) mod resolver;
pub(crate) mod text;
