mod regions;
mod stats;
mod util;

pub use regions::{
    load_regions, merge_intervals, open_text_reader, position_in_intervals, RegionMap,
};
pub use stats::{mean_stdev, median_i32, upper_mad};
pub use util::{handle_error_and_exit, open_bam_reader, open_indexed_bam_reader, Result};
