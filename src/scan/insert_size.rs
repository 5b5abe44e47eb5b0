use crate::cluster::{has_zp_tag, infer_read_length, MASK_NON_PRIMARY};
use crate::utils::{mean_stdev, median_i32, upper_mad, Result};
use rust_htslib::bam::{self, Read};

/// Records inspected during the library prelude.
const PRELUDE_RECORDS: usize = 200_000;
/// Giving up on read-length inference after this many records is fatal.
const MAX_SCAN_RECORDS: usize = 20_000_000;
/// Inserts needed before the measured distribution replaces the defaults.
const MIN_INSERTS: usize = 101;
/// Outliers above `median + 8 * upper MAD` are trimmed.
const MAD_MULTIPLIER: f64 = 8.0;

pub const DEFAULT_INSERT_MEDIAN: f64 = 300.0;
pub const DEFAULT_INSERT_STDEV: f64 = 150.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryInfo {
    pub read_length: i64,
    pub insert_median: f64,
    pub insert_stdev: f64,
    pub extended_tags: bool,
}

/// Scans the leading records of `bam` for read length and insert-size
/// statistics. The caller reopens the stream afterwards; readers that
/// support it may `seek` back instead.
pub fn estimate_library(bam: &mut bam::Reader) -> Result<LibraryInfo> {
    let mut read_lengths = Vec::new();
    let mut inserts = Vec::new();
    let mut extended_tags = false;
    let mut n_records = 0usize;
    let mut record = bam::Record::new();
    loop {
        match bam.read(&mut record) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(e.to_string()),
            None => break,
        }
        n_records += 1;
        if record.flags() & MASK_NON_PRIMARY != 0 {
            continue;
        }
        if !extended_tags && has_zp_tag(&record) {
            extended_tags = true;
        }
        let read_length = infer_read_length(&record);
        if read_length > 0 {
            read_lengths.push(read_length as i32);
        }
        if record.is_proper_pair() && !record.is_unmapped() && record.insert_size() >= 0 {
            let tlen = record.insert_size();
            if tlen > 0 {
                inserts.push(tlen as i32);
            }
        }
        if n_records >= PRELUDE_RECORDS && !read_lengths.is_empty() {
            break;
        }
        if n_records >= MAX_SCAN_RECORDS {
            break;
        }
    }
    if n_records == 0 {
        return Err("No reads found in the input".to_string());
    }
    let Some(read_length_median) = median_i32(&read_lengths) else {
        return Err(format!(
            "Could not infer read length from the first {} records",
            n_records
        ));
    };
    let (insert_median, insert_stdev) = insert_stats(&inserts);
    Ok(LibraryInfo {
        read_length: read_length_median.round() as i64,
        insert_median,
        insert_stdev,
        extended_tags,
    })
}

/// Median-trims the insert distribution and returns its mean and stdev;
/// sparse samples fall back to the defaults.
fn insert_stats(inserts: &[i32]) -> (f64, f64) {
    if inserts.len() < MIN_INSERTS {
        return (DEFAULT_INSERT_MEDIAN, DEFAULT_INSERT_STDEV);
    }
    let med = median_i32(inserts).expect("non-empty inserts");
    let mad = upper_mad(inserts, med);
    let cutoff = med + MAD_MULTIPLIER * mad;
    let kept: Vec<i32> = inserts
        .iter()
        .copied()
        .filter(|&x| (x as f64) < cutoff)
        .collect();
    if kept.len() < MIN_INSERTS {
        return (DEFAULT_INSERT_MEDIAN, DEFAULT_INSERT_STDEV);
    }
    mean_stdev(&kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_inserts_use_defaults() {
        let inserts: Vec<i32> = (0..100).map(|i| 290 + i % 20).collect();
        assert_eq!(
            insert_stats(&inserts),
            (DEFAULT_INSERT_MEDIAN, DEFAULT_INSERT_STDEV)
        );
    }

    #[test]
    fn test_outliers_are_trimmed() {
        let mut inserts: Vec<i32> = (0..200).map(|i| 200 + i).collect();
        inserts.extend(vec![100_000; 5]);
        let (mean, stdev) = insert_stats(&inserts);
        assert!((mean - 299.5).abs() < 1.0);
        assert!(stdev < 100.0);
    }

    #[test]
    fn test_measured_distribution() {
        let inserts: Vec<i32> = (0..500).map(|i| 250 + (i % 101)).collect();
        let (mean, stdev) = insert_stats(&inserts);
        assert!((mean - 300.0).abs() < 2.0);
        assert!(stdev > 20.0 && stdev < 40.0);
    }
}
