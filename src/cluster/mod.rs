mod clip_scope;
mod engine;
mod events;
mod minimizer;
mod params;
mod pe_scope;
mod read;
mod sites;
mod template_edges;

pub use engine::{ClusterEngine, NodeInfo, SvCandidate};
pub use events::{ReadType, SvEvent, INSERTION_SENTINEL};
pub use params::Params;
pub use read::{
    clip_lengths, has_zp_tag, infer_read_length, parse_sa_tag, qname_hash, MASK_HARD_FILTER,
    MASK_NON_PRIMARY,
};
pub use sites::{load_sites, SiteType, SvSite};

#[cfg(test)]
pub use read::test_records;
