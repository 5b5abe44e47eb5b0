mod assoc;
mod partition;

pub use assoc::{AssocGraph, EDGE_CLIP, EDGE_LOCAL, EDGE_SITE, EDGE_TEMPLATE};
pub use partition::{break_large_component, count_support_between, get_partitions, SupportCounts};
