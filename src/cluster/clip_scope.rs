use crate::cluster::minimizer::seq_minimizers;
use crate::cluster::params::Params;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Partners reported per update call are capped.
const MAX_PARTNERS: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ClipSide {
    Left,
    Right,
}

#[derive(Default)]
struct SideScope {
    /// Clipped nodes still inside the positional window.
    scope: VecDeque<(i64, u32)>,
    /// Insertion-ordered postings, for eviction.
    items: VecDeque<(i64, u64, u32)>,
    /// Minimizer -> posting list.
    index: FxHashMap<u64, Vec<(i64, u32)>>,
}

impl SideScope {
    fn clear(&mut self) {
        self.scope.clear();
        self.items.clear();
        self.index.clear();
    }

    fn evict(&mut self, pos: i64, max_dist: i64) {
        while let Some(&(front_pos, _)) = self.scope.front() {
            if (pos - front_pos).abs() <= max_dist {
                break;
            }
            self.scope.pop_front();
        }
        while let Some(&(item_pos, minimizer, node)) = self.items.front() {
            if (pos - item_pos).abs() <= max_dist {
                break;
            }
            self.items.pop_front();
            if let Some(postings) = self.index.get_mut(&minimizer) {
                postings.retain(|&(q, n)| !(q == item_pos && n == node));
                if postings.is_empty() {
                    self.index.remove(&minimizer);
                }
            }
        }
    }
}

/// Minimizer index over soft-clip sequences. Groups reads whose clip
/// sequences share enough minimizers within a local positional window.
pub struct ClipScoper {
    max_dist: i64,
    k: usize,
    w: usize,
    support_thresh: u32,
    breadth: usize,
    /// Posting-list entries at most this far from the query position count
    /// as local matches.
    match_dist: i64,
    read_length: i64,
    current_chrom: i32,
    left: SideScope,
    right: SideScope,
    scratch: FxHashSet<u64>,
}

impl ClipScoper {
    pub fn new(params: &Params) -> Self {
        ClipScoper {
            max_dist: params.max_dist,
            k: params.minimizer_k,
            w: params.minimizer_w,
            support_thresh: params.minimizer_support_thresh,
            breadth: params.minimizer_breadth,
            match_dist: params.minimizer_dist,
            read_length: params.read_length,
            current_chrom: -1,
            left: SideScope::default(),
            right: SideScope::default(),
            scratch: FxHashSet::default(),
        }
    }

    /// Feeds one clip sequence through the scoper and appends clustered
    /// partner nodes to `out`.
    pub fn update(
        &mut self,
        side: ClipSide,
        clip_seq: &[u8],
        node: u32,
        chrom: i32,
        pos: i64,
        out: &mut Vec<u32>,
    ) {
        if chrom != self.current_chrom {
            self.left.clear();
            self.right.clear();
            self.current_chrom = chrom;
        }
        let k = self.k;
        let w = self.w;
        let side_scope = match side {
            ClipSide::Left => &mut self.left,
            ClipSide::Right => &mut self.right,
        };
        side_scope.evict(pos, self.max_dist);

        self.scratch.clear();
        seq_minimizers(clip_seq, k, w, &mut self.scratch);

        // dense minimizer neighbourhoods produce spurious links
        let density_cap =
            (1.0 + 0.15 * side_scope.scope.len() as f32) * self.read_length as f32 * 2.0
                / (w as f32 + 1.0);
        let search = side_scope.index.len() as f32 <= density_cap
            && self.scratch.len() >= self.breadth;

        if search {
            let mut target_counts: FxHashMap<u32, u32> = FxHashMap::default();
            let mut total_matches = 0u32;
            for minimizer in &self.scratch {
                let Some(postings) = side_scope.index.get(minimizer) else {
                    continue;
                };
                for &(q, target) in postings {
                    if target == node || (q - pos).abs() > self.match_dist {
                        continue;
                    }
                    let count = target_counts.entry(target).or_insert(0);
                    *count += 1;
                    total_matches += 1;
                    let support = total_matches / 2 + *count;
                    if support >= self.support_thresh
                        && out.len() < MAX_PARTNERS
                        && !out.contains(&target)
                    {
                        out.push(target);
                    }
                }
            }
        }

        for &minimizer in &self.scratch {
            side_scope
                .index
                .entry(minimizer)
                .or_default()
                .push((pos, node));
            side_scope.items.push_back((pos, minimizer, node));
        }
        side_scope.scope.push_back((pos, node));
    }
}
