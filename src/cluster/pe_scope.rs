use crate::cluster::events::{ReadType, INSERTION_SENTINEL};
use crate::cluster::params::Params;
use std::collections::BTreeMap;

/// Breakpoints closer than this share the exact bucket.
const EXACT_DIST: i64 = 35;
/// Maximum span dissimilarity accepted inside the exact bucket.
const EXACT_SPAN_THRESH: f32 = 0.8;
/// Steps walked from the insertion point, in each direction.
const WALK_STEPS: usize = 6;

#[derive(Debug, Clone)]
struct ScopeItem {
    /// Partner breakpoint of the stored event.
    chrom2: i32,
    pos2: i64,
    node: u32,
    kind: ReadType,
    len_cig: i64,
}

/// Sliding per-chromosome scope over recently seen breakpoint pairs.
/// Answers which prior nodes are reciprocally close enough to a new event
/// to witness the same SV.
pub struct PairedEndScoper {
    max_dist: i64,
    clst_dist: i64,
    norm: f32,
    thresh: f32,
    paired_end: bool,
    local_chrom: i32,
    /// First-end entries of the current chromosome, keyed by position.
    loci: BTreeMap<i64, Vec<ScopeItem>>,
    /// Second-end entries per partner chromosome; the final slot holds the
    /// insertion sentinel.
    chrom_scope: Vec<BTreeMap<i64, Vec<ScopeItem>>>,
}

impl PairedEndScoper {
    pub fn new(n_references: usize, params: &Params) -> Self {
        PairedEndScoper {
            max_dist: params.max_dist,
            clst_dist: params.clst_dist,
            norm: params.norm_thresh,
            thresh: params.spd_thresh,
            paired_end: params.paired_end,
            local_chrom: -1,
            loci: BTreeMap::new(),
            chrom_scope: vec![BTreeMap::new(); n_references + 1],
        }
    }

    fn scope_index(&self, chrom2: i32) -> usize {
        if chrom2 == INSERTION_SENTINEL {
            self.chrom_scope.len() - 1
        } else {
            chrom2 as usize
        }
    }

    fn clear(&mut self) {
        self.loci.clear();
        for scope in &mut self.chrom_scope {
            scope.clear();
        }
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.loci.is_empty() && self.chrom_scope.iter().all(|s| s.is_empty())
    }

    /// Records a new breakpoint pair.
    pub fn add_item(
        &mut self,
        node: u32,
        c1: i32,
        p1: i64,
        c2: i32,
        p2: i64,
        kind: ReadType,
        len_cig: i64,
    ) {
        if c1 != self.local_chrom {
            self.clear();
            self.local_chrom = c1;
        }
        self.loci.entry(p1).or_default().push(ScopeItem {
            chrom2: c2,
            pos2: p2,
            node,
            kind,
            len_cig,
        });
        let scope = self.scope_index(c2);
        if kind == ReadType::Deletion {
            // both deletion ends may partner forward
            self.chrom_scope[scope].entry(p1).or_default().push(ScopeItem {
                chrom2: c2,
                pos2: p2,
                node,
                kind,
                len_cig,
            });
        }
        self.chrom_scope[scope].entry(p2).or_default().push(ScopeItem {
            chrom2: c1,
            pos2: p1,
            node,
            kind,
            len_cig,
        });
    }

    /// Finds prior nodes whose breakpoints pair with `(c1:p1, c2:p2)`.
    /// Exact-bucket matches shadow distance-bucket matches.
    #[allow(clippy::too_many_arguments)]
    pub fn find_other_nodes(
        &mut self,
        node: u32,
        c1: i32,
        p1: i64,
        c2: i32,
        p2: i64,
        kind: ReadType,
        len_cig: i64,
        trust_ins_len: bool,
    ) -> Vec<u32> {
        if c1 != self.local_chrom {
            self.clear();
            self.local_chrom = c1;
        }
        let cutoff = p1 - self.clst_dist;
        let kept = self.loci.split_off(&cutoff);
        self.loci = kept;

        let mut exact = Vec::new();
        let mut close = Vec::new();
        let scope = &self.chrom_scope[self.scope_index(c2)];
        let forward = scope.range(p2..).take(WALK_STEPS);
        let backward = scope.range(..p2).rev().take(WALK_STEPS);
        for (&v_pos, items) in forward.chain(backward) {
            if (v_pos - p2).abs() >= self.max_dist {
                // positions are walked outward, nothing closer remains
                if v_pos >= p2 {
                    continue;
                }
                break;
            }
            for item in items {
                if item.node == node {
                    continue;
                }
                if del_ins_conflict(kind, item.kind) {
                    continue;
                }
                let mut allow_strict = true;
                if c1 == c2 && item.chrom2 == c1 {
                    allow_strict = reciprocal_overlap(p1, p2, v_pos, item.pos2);
                }
                if allow_strict && (v_pos - p2).abs() < EXACT_DIST {
                    let accept = if len_cig > 0 && item.len_cig > 0 {
                        let max_len = len_cig.max(item.len_cig) as f32;
                        ((len_cig - item.len_cig).abs() as f32 / max_len) < EXACT_SPAN_THRESH
                    } else {
                        true
                    };
                    if accept && !exact.contains(&item.node) {
                        exact.push(item.node);
                    }
                    continue;
                }
                let in_range = allow_strict
                    && (v_pos - p2).abs() < self.max_dist
                    && (item.pos2 - p1).abs() < self.max_dist;
                if in_range || !allow_strict {
                    let spd = span_position_distance(
                        p1,
                        p2,
                        item.pos2,
                        v_pos,
                        len_cig,
                        item.len_cig,
                        kind,
                        item.kind,
                        self.paired_end,
                        trust_ins_len,
                        self.norm,
                        self.max_dist,
                    );
                    if spd < self.thresh && !close.contains(&item.node) {
                        close.push(item.node);
                    }
                }
            }
        }
        if !exact.is_empty() {
            exact
        } else {
            close
        }
    }
}

fn del_ins_conflict(a: ReadType, b: ReadType) -> bool {
    matches!(
        (a, b),
        (ReadType::Deletion, ReadType::Insertion) | (ReadType::Insertion, ReadType::Deletion)
    )
}

/// True when each interval covers at least half of the other.
fn reciprocal_overlap(a1: i64, a2: i64, b1: i64, b2: i64) -> bool {
    let (a_lo, a_hi) = (a1.min(a2), a1.max(a2));
    let (b_lo, b_hi) = (b1.min(b2), b1.max(b2));
    let overlap = a_hi.min(b_hi) - a_lo.max(b_lo);
    if overlap <= 0 {
        return false;
    }
    let len_a = (a_hi - a_lo).max(1);
    let len_b = (b_hi - b_lo).max(1);
    overlap as f64 >= 0.5 * len_a as f64 && overlap as f64 >= 0.5 * len_b as f64
}

/// Normalized distance between two breakpoint pairs: midpoint offset scaled
/// by `norm` plus a span-dissimilarity penalty. Paired-end discordant pairs
/// skip the span term and normalize by the scope radius instead, since their
/// breakpoints carry insert-size fuzz; `trust_ins_len` substitutes CIGAR
/// insertion lengths for the reference spans.
#[allow(clippy::too_many_arguments)]
fn span_position_distance(
    p1: i64,
    p2: i64,
    q1: i64,
    q2: i64,
    len1: i64,
    len2: i64,
    kind: ReadType,
    other_kind: ReadType,
    paired_end: bool,
    trust_ins_len: bool,
    norm: f32,
    max_dist: i64,
) -> f32 {
    let mid1 = (p1 + p2) / 2;
    let mid2 = (q1 + q2) / 2;
    if paired_end && kind == ReadType::Discordant && other_kind == ReadType::Discordant {
        return (mid1 - mid2).abs() as f32 / max_dist as f32;
    }
    let (span1, span2) = if kind == ReadType::Insertion && trust_ins_len && len1 > 0 && len2 > 0
    {
        (len1, len2)
    } else {
        ((p2 - p1).abs(), (q2 - q1).abs())
    };
    let max_span = span1.max(span2);
    let span_distance = if max_span > 0 {
        (span1 - span2).abs() as f32 / max_span as f32
    } else {
        0.0
    };
    let position_distance = (mid1 - mid2).abs() as f32 / norm;
    position_distance + span_distance
}
