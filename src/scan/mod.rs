mod coverage;
mod insert_size;
mod scanner;

pub use coverage::{CoverageTracker, BIN_SIZE};
pub use insert_size::{estimate_library, LibraryInfo, DEFAULT_INSERT_MEDIAN, DEFAULT_INSERT_STDEV};
pub use scanner::{scan_regions, scan_stream, GenomeScanner};
