pub(crate) mod aggregator;
pub(crate) mod connectivity;
