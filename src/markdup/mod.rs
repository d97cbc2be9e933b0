pub(crate) mod duplicate_group_resolver;
pub(crate) mod duplication_metrics;
pub(crate) mod markduplicates;
pub(crate) mod utils;
