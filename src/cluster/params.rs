/// Tuning knobs for signal extraction and clustering. Defaults follow the
/// short-read presets; `update_library` folds in the measured library stats.
#[derive(Debug, Clone)]
pub struct Params {
    /// Depth cap per 100-bp bin; bins at or above it are suppressed.
    pub max_cov: f32,
    /// Read-buffer cap when the input stream lacks random access.
    pub buffer_size: usize,
    /// Minimum soft-clip length for a clip to count as SV signal.
    pub clip_length: i64,
    /// Minimum CIGAR indel length reported as a within-read event.
    pub min_sv_size: i64,
    pub minimizer_support_thresh: u32,
    pub minimizer_breadth: usize,
    pub minimizer_dist: i64,
    pub mapq_thresh: u8,
    pub paired_end: bool,
    pub read_length: i64,
    /// Normalization constant of the span-position distance.
    pub norm_thresh: f32,
    /// Acceptance threshold of the span-position distance.
    pub spd_thresh: f32,
    /// Restrict clipped records to minimizer-based linking only.
    pub mm_only: bool,
    /// Compare insertion CIGAR lengths strictly when pairing events.
    pub trust_ins_len: bool,
    /// Minimizer k-mer length.
    pub minimizer_k: usize,
    /// Minimizer window length, in k-mers.
    pub minimizer_w: usize,
    /// Minimum soft-clip length admitted to the clip scoper.
    pub scope_clip_length: i64,
    /// Minimum support for a partition or partition pair to become a
    /// candidate.
    pub min_support: usize,
    pub insert_median: f64,
    pub insert_stdev: f64,
    /// Whole-read scope radius, derived from the insert distribution.
    pub max_dist: i64,
    /// Loci eviction radius.
    pub clst_dist: i64,
    /// Set when the `ZP` tag was seen during the library prelude.
    pub extended_tags: bool,
}

impl Default for Params {
    fn default() -> Self {
        let mut params = Params {
            max_cov: 200.0,
            buffer_size: 100_000,
            clip_length: 30,
            min_sv_size: 30,
            minimizer_support_thresh: 2,
            minimizer_breadth: 3,
            minimizer_dist: 10,
            mapq_thresh: 1,
            paired_end: true,
            read_length: 150,
            norm_thresh: 100.0,
            spd_thresh: 0.3,
            mm_only: false,
            trust_ins_len: true,
            minimizer_k: 16,
            minimizer_w: 7,
            scope_clip_length: 21,
            min_support: 3,
            insert_median: 300.0,
            insert_stdev: 150.0,
            max_dist: 0,
            clst_dist: 0,
            extended_tags: false,
        };
        params.derive_distances();
        params
    }
}

impl Params {
    /// Folds measured library statistics into the scope distances.
    pub fn update_library(
        &mut self,
        read_length: i64,
        insert_median: f64,
        insert_stdev: f64,
        extended_tags: bool,
    ) {
        self.read_length = read_length;
        self.insert_median = insert_median;
        self.insert_stdev = insert_stdev;
        self.extended_tags = extended_tags;
        self.derive_distances();
    }

    pub fn derive_distances(&mut self) {
        self.max_dist = if self.paired_end {
            (self.insert_median + 4.0 * self.insert_stdev) as i64
        } else {
            2 * self.read_length
        };
        self.clst_dist = 2 * self.max_dist;
    }
}
