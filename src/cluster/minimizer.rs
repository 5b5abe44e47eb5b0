use rustc_hash::FxHashSet;
use xxhash_rust::xxh64::xxh64;

/// Seed kept fixed for compatibility with prior outputs.
pub const MINIMIZER_SEED: u64 = 42;

/// Collects the window-minimum minimizers of `seq`: the smallest k-mer hash
/// in every window of `w` consecutive k-mers, plus both boundary k-mers.
pub fn seq_minimizers(seq: &[u8], k: usize, w: usize, out: &mut FxHashSet<u64>) {
    if seq.len() < k {
        return;
    }
    let hashes: Vec<u64> = seq.windows(k).map(|kmer| xxh64(kmer, MINIMIZER_SEED)).collect();
    out.insert(hashes[0]);
    out.insert(hashes[hashes.len() - 1]);
    if hashes.len() <= w {
        if let Some(&min) = hashes.iter().min() {
            out.insert(min);
        }
        return;
    }
    for window in hashes.windows(w) {
        if let Some(&min) = window.iter().min() {
            out.insert(min);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimizers(seq: &[u8], k: usize, w: usize) -> FxHashSet<u64> {
        let mut out = FxHashSet::default();
        seq_minimizers(seq, k, w, &mut out);
        out
    }

    #[test]
    fn test_short_sequence_yields_nothing() {
        assert!(minimizers(b"ACGT", 16, 7).is_empty());
    }

    #[test]
    fn test_boundary_kmers_always_present() {
        let seq = b"ACGTACGTACGTACGTACGTAC";
        let out = minimizers(seq, 16, 7);
        let first = xxh64(&seq[..16], MINIMIZER_SEED);
        let last = xxh64(&seq[seq.len() - 16..], MINIMIZER_SEED);
        assert!(out.contains(&first));
        assert!(out.contains(&last));
    }

    #[test]
    fn test_identical_sequences_share_minimizers() {
        let a = minimizers(b"ACGTACGTACGTACGTACGTACGTACGTACGT", 16, 7);
        let b = minimizers(b"ACGTACGTACGTACGTACGTACGTACGTACGT", 16, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_disjoint_sequences_differ() {
        let a = minimizers(b"ACGTACGTACGTACGTACGTACGTACGTACGT", 16, 7);
        let b = minimizers(b"TTTTTTTTTTTTTTTTTTTTGGGGGGGGGGGG", 16, 7);
        assert!(a.is_disjoint(&b));
    }
}
