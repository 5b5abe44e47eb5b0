use crate::utils::Result;
use flate2::read::MultiGzDecoder;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as ioRead};
use std::path::Path;

/// Merged, position-sorted intervals keyed by chromosome name.
pub type RegionMap = FxHashMap<String, Vec<(i64, i64)>>;

pub fn open_text_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

/// Parses a tab-separated region file (`chrom \t start \t end`, `#` comments)
/// into merged intervals per chromosome.
pub fn load_regions(path: &Path) -> Result<RegionMap> {
    let reader = open_text_reader(path)?;
    let mut raw: RegionMap = FxHashMap::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("{}: {}", path.display(), e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(format!(
                "Expected 3 tab-separated fields at line {} of {}: {}",
                index + 1,
                path.display(),
                line
            ));
        }
        let parse = |s: &str| -> Result<i64> {
            s.trim()
                .parse()
                .map_err(|_| format!("Invalid coordinate '{}' at line {}", s, index + 1))
        };
        let (start, end) = (parse(fields[1])?, parse(fields[2])?);
        if start >= end {
            return Err(format!(
                "Invalid region at line {}: start {} >= end {}",
                index + 1,
                start,
                end
            ));
        }
        raw.entry(fields[0].to_string())
            .or_default()
            .push((start, end));
    }
    for intervals in raw.values_mut() {
        *intervals = merge_intervals(std::mem::take(intervals));
    }
    Ok(raw)
}

/// Sorts intervals and merges any overlapping or touching pairs.
pub fn merge_intervals(mut intervals: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
    if intervals.is_empty() {
        return intervals;
    }
    intervals.sort_unstable();
    let mut merged = Vec::with_capacity(intervals.len());
    let mut current = intervals[0];
    for &(start, end) in &intervals[1..] {
        if start <= current.1 {
            current.1 = current.1.max(end);
        } else {
            merged.push(current);
            current = (start, end);
        }
    }
    merged.push(current);
    merged
}

/// True when `pos` falls inside one of the sorted `intervals`.
pub fn position_in_intervals(intervals: &[(i64, i64)], pos: i64) -> bool {
    let idx = intervals.partition_point(|&(start, _)| start <= pos);
    idx > 0 && pos < intervals[idx - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlapping() {
        let merged = merge_intervals(vec![(100, 200), (150, 300), (400, 500)]);
        assert_eq!(merged, vec![(100, 300), (400, 500)]);
    }

    #[test]
    fn test_merge_touching() {
        let merged = merge_intervals(vec![(100, 200), (200, 250)]);
        assert_eq!(merged, vec![(100, 250)]);
    }

    #[test]
    fn test_merge_unsorted_input() {
        let merged = merge_intervals(vec![(400, 500), (100, 200)]);
        assert_eq!(merged, vec![(100, 200), (400, 500)]);
    }

    #[test]
    fn test_position_membership() {
        let intervals = vec![(100, 300), (400, 500)];
        assert!(position_in_intervals(&intervals, 100));
        assert!(position_in_intervals(&intervals, 299));
        assert!(!position_in_intervals(&intervals, 300));
        assert!(!position_in_intervals(&intervals, 350));
        assert!(position_in_intervals(&intervals, 450));
    }
}
