use crate::cluster::{parse_sa_tag, qname_hash, MASK_HARD_FILTER};
use crate::scan::coverage::{CoverageTracker, BIN_SIZE};
use crate::utils::{merge_intervals, position_in_intervals, Result};
use itertools::Itertools;
use rust_htslib::bam::ext::BamRecordExtensions;
use rust_htslib::bam::{self, Read, Record};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Window fetched around mate and SA pointers in region-restricted mode.
const MATE_WINDOW: i64 = 1000;

/// Single-pass scanner over a coordinate-sorted record stream. Buffers
/// records into 100-bp bins, tracks depth, suppresses over-covered bins and
/// emits ordered batches of `(record, tell)` pairs.
pub struct GenomeScanner {
    coverage: CoverageTracker,
    max_cov: f32,
    /// Regions of interest per chromosome; reads inside them bypass the
    /// depth cap.
    regions: Vec<Vec<(i64, i64)>>,
    current_bin: Vec<(Record, i64)>,
    current_chrom: i32,
    current_bin_coord: i64,
    current_bin_in_region: bool,
    staged: VecDeque<Vec<(Record, i64)>>,
    pub reads_dropped: u64,
}

impl GenomeScanner {
    pub fn new(reference_lengths: &[u64], max_cov: f32) -> Self {
        GenomeScanner {
            coverage: CoverageTracker::new(reference_lengths),
            max_cov,
            regions: vec![Vec::new(); reference_lengths.len()],
            current_bin: Vec::new(),
            current_chrom: -1,
            current_bin_coord: -1,
            current_bin_in_region: false,
            staged: VecDeque::new(),
            reads_dropped: 0,
        }
    }

    pub fn set_regions(&mut self, regions: Vec<Vec<(i64, i64)>>) {
        self.regions = regions;
    }

    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    fn in_region(&self, tid: i32, pos: i64) -> bool {
        self.regions
            .get(tid as usize)
            .map(|intervals| position_in_intervals(intervals, pos))
            .unwrap_or(false)
    }

    /// Feeds one record through the bin buffer. Hard-filtered flags and
    /// records without CIGAR or sequence are discarded up front.
    pub fn push(&mut self, rec: Record, tell: i64) {
        if rec.flags() & MASK_HARD_FILTER != 0 {
            return;
        }
        let tid = rec.tid();
        if tid < 0 || rec.cigar().is_empty() || rec.seq_len() == 0 {
            return;
        }
        let pos = rec.pos();
        let depth = self.coverage.add(pos, rec.reference_end(), tid as usize);
        let bin_coord = pos / BIN_SIZE;
        let in_region = self.in_region(tid, pos);
        if tid != self.current_chrom || bin_coord != self.current_bin_coord {
            self.stage_current_bin();
            self.current_chrom = tid;
            self.current_bin_coord = bin_coord;
            self.current_bin_in_region = in_region;
        }
        if depth >= self.max_cov && !in_region {
            self.reads_dropped += self.current_bin.len() as u64 + 1;
            self.current_bin.clear();
            return;
        }
        self.current_bin.push((rec, tell));
    }

    fn stage_current_bin(&mut self) {
        if self.current_bin.is_empty() {
            return;
        }
        let depth = self
            .coverage
            .depth_at(self.current_chrom as usize, self.current_bin_coord as usize);
        if depth >= self.max_cov && !self.current_bin_in_region {
            self.reads_dropped += self.current_bin.len() as u64;
            self.current_bin.clear();
            return;
        }
        self.staged.push_back(std::mem::take(&mut self.current_bin));
    }

    /// Next staged batch, in emission order.
    pub fn next_batch(&mut self) -> Option<Vec<(Record, i64)>> {
        self.staged.pop_front()
    }

    /// Stages the trailing bin; call after the last record.
    pub fn finish(&mut self) {
        self.stage_current_bin();
    }
}

/// Drives the whole-genome mode: streams every record through the scanner
/// and hands staged batches to `sink` in order.
pub fn scan_stream<F>(bam: &mut bam::Reader, scanner: &mut GenomeScanner, mut sink: F) -> Result<()>
where
    F: FnMut(Record, i64) -> Result<()>,
{
    loop {
        let tell = bam.tell();
        let mut record = Record::new();
        match bam.read(&mut record) {
            Some(Ok(())) => scanner.push(record, tell),
            Some(Err(e)) => return Err(e.to_string()),
            None => break,
        }
        while let Some(batch) = scanner.next_batch() {
            for (rec, tell) in batch {
                sink(rec, tell)?;
            }
        }
    }
    scanner.finish();
    while let Some(batch) = scanner.next_batch() {
        for (rec, tell) in batch {
            sink(rec, tell)?;
        }
    }
    Ok(())
}

/// Drives the region-restricted mode: expands the user intervals with ±1 kb
/// windows around mate and SA pointers of informative records, merges them,
/// then fetches each merged interval, deduplicating records within the pass.
pub fn scan_regions<F>(
    bam: &mut bam::IndexedReader,
    user_regions: &FxHashMap<String, Vec<(i64, i64)>>,
    scanner: &mut GenomeScanner,
    mut sink: F,
) -> Result<()>
where
    F: FnMut(Record, i64) -> Result<()>,
{
    let (tid_lookup, n_refs) = {
        let header = bam.header();
        let mut lookup: FxHashMap<String, i32> = FxHashMap::default();
        for (tid, name) in header.target_names().iter().enumerate() {
            lookup.insert(String::from_utf8_lossy(name).into_owned(), tid as i32);
        }
        (lookup, header.target_count() as usize)
    };
    let mut intervals: Vec<Vec<(i64, i64)>> = vec![Vec::new(); n_refs];
    for (chrom, chrom_intervals) in user_regions {
        let tid = *tid_lookup
            .get(chrom)
            .ok_or_else(|| format!("Unknown reference name in region file: {}", chrom))?;
        intervals[tid as usize].extend_from_slice(chrom_intervals);
    }

    // discovery pass: pull in mate and split-partner neighbourhoods
    for tid in 0..n_refs {
        let seeds = intervals[tid].clone();
        for &(start, end) in &seeds {
            bam.fetch((tid as i32, start, end)).map_err(|e| e.to_string())?;
            let mut record = Record::new();
            while let Some(result) = bam.read(&mut record) {
                result.map_err(|e| e.to_string())?;
                if record.flags() & MASK_HARD_FILTER != 0 {
                    continue;
                }
                if record.is_paired() && !record.is_mate_unmapped() && record.mtid() >= 0 {
                    let informative = record.mtid() != record.tid() || !record.is_proper_pair();
                    if informative {
                        let mpos = record.mpos();
                        intervals[record.mtid() as usize]
                            .push(((mpos - MATE_WINDOW).max(0), mpos + MATE_WINDOW));
                    }
                }
                for segment in parse_sa_tag(&record) {
                    if let Some(&sa_tid) = tid_lookup.get(&segment.chrom) {
                        intervals[sa_tid as usize]
                            .push(((segment.pos - MATE_WINDOW).max(0), segment.pos + MATE_WINDOW));
                    }
                }
            }
        }
    }

    let merged = intervals.into_iter().map(merge_intervals).collect_vec();
    scanner.set_regions(merged.clone());

    let mut seen: FxHashSet<(u64, u16, i64)> = FxHashSet::default();
    for (tid, chrom_intervals) in merged.iter().enumerate() {
        for &(start, end) in chrom_intervals {
            bam.fetch((tid as i32, start, end)).map_err(|e| e.to_string())?;
            loop {
                let mut record = Record::new();
                match bam.read(&mut record) {
                    Some(Ok(())) => {
                        if !seen.insert((qname_hash(&record), record.flags(), record.pos())) {
                            continue;
                        }
                        scanner.push(record, 0);
                    }
                    Some(Err(e)) => return Err(e.to_string()),
                    None => break,
                }
                while let Some(batch) = scanner.next_batch() {
                    for (rec, tell) in batch {
                        sink(rec, tell)?;
                    }
                }
            }
        }
    }
    scanner.finish();
    while let Some(batch) = scanner.next_batch() {
        for (rec, tell) in batch {
            sink(rec, tell)?;
        }
    }
    Ok(())
}
