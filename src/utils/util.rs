use rust_htslib::bam;
use std::path::Path;

pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

pub fn open_bam_reader(path: &Path) -> Result<bam::Reader> {
    bam::Reader::from_path(path)
        .map_err(|e| format!("Failed to open BAM file {}: {}", path.display(), e))
}

pub fn open_indexed_bam_reader(path: &Path) -> Result<bam::IndexedReader> {
    bam::IndexedReader::from_path(path)
        .map_err(|e| format!("Failed to open indexed BAM file {}: {}", path.display(), e))
}
