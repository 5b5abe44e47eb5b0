use super::AssocGraph;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Inter- and intra-partition support for one component.
#[derive(Debug, Default)]
pub struct SupportCounts {
    /// `(i, j)` with `i < j` -> the nodes of partition `i` and of partition
    /// `j` that touch the other side.
    pub between: FxHashMap<(usize, usize), (Vec<u32>, Vec<u32>)>,
    /// Partition index -> nodes whose neighbours all stay inside the
    /// partition.
    pub within: FxHashMap<usize, Vec<u32>>,
}

/// Splits a component into maximal groups connected by strong edges
/// (weight > 1). Weight-0 and weight-1 edges are never traversed.
pub fn get_partitions(graph: &AssocGraph, component: &[u32]) -> Vec<Vec<u32>> {
    let members: FxHashSet<u32> = component.iter().copied().collect();
    let mut seen: FxHashSet<u32> = FxHashSet::default();
    let mut partitions = Vec::new();
    let mut queue = VecDeque::new();
    for &start in component {
        if seen.contains(&start) {
            continue;
        }
        seen.insert(start);
        queue.push_back(start);
        let mut part = Vec::new();
        while let Some(u) = queue.pop_front() {
            part.push(u);
            for &(v, weight) in graph.neighbors(u) {
                if weight > 1 && members.contains(&v) && !seen.contains(&v) {
                    seen.insert(v);
                    queue.push_back(v);
                }
            }
        }
        part.sort_unstable();
        partitions.push(part);
    }
    partitions
}

/// Collects, for every pair of partitions joined by at least one edge, the
/// node sets on both sides, and per partition the nodes with only
/// intra-partition neighbours.
pub fn count_support_between(graph: &AssocGraph, parts: &[Vec<u32>]) -> SupportCounts {
    let mut part_of: FxHashMap<u32, usize> = FxHashMap::default();
    for (index, part) in parts.iter().enumerate() {
        for &node in part {
            part_of.insert(node, index);
        }
    }

    let mut between: FxHashMap<(usize, usize), (FxHashSet<u32>, FxHashSet<u32>)> =
        FxHashMap::default();
    let mut counts = SupportCounts::default();
    for (i, part) in parts.iter().enumerate() {
        for &node in part {
            let mut external = false;
            for &(neighbor, _) in graph.neighbors(node) {
                let Some(&j) = part_of.get(&neighbor) else {
                    continue;
                };
                if j == i {
                    continue;
                }
                external = true;
                let key = (i.min(j), i.max(j));
                let entry = between.entry(key).or_default();
                if i < j {
                    entry.0.insert(node);
                    entry.1.insert(neighbor);
                } else {
                    entry.1.insert(node);
                    entry.0.insert(neighbor);
                }
            }
            if !external {
                counts.within.entry(i).or_default().push(node);
            }
        }
    }
    for (key, (left, right)) in between {
        counts.between.insert(
            key,
            (
                left.into_iter().sorted_unstable().collect_vec(),
                right.into_iter().sorted_unstable().collect_vec(),
            ),
        );
    }
    counts
}

/// Counts edges crossing each partition pair.
fn count_links(graph: &AssocGraph, parts: &[Vec<u32>]) -> FxHashMap<(usize, usize), usize> {
    let mut part_of: FxHashMap<u32, usize> = FxHashMap::default();
    for (index, part) in parts.iter().enumerate() {
        for &node in part {
            part_of.insert(node, index);
        }
    }
    let mut links: FxHashMap<(usize, usize), usize> = FxHashMap::default();
    for (i, part) in parts.iter().enumerate() {
        for &node in part {
            for &(neighbor, _) in graph.neighbors(node) {
                match part_of.get(&neighbor) {
                    Some(&j) if j > i => *links.entry((i, j)).or_default() += 1,
                    _ => {}
                }
            }
        }
    }
    links
}

/// Resolves a large component into SV-candidate jobs: partition pairs whose
/// link count reaches `min_support` are concatenated (transitively), and a
/// partition stands alone when its self-support reaches `min_support`.
pub fn break_large_component(
    graph: &AssocGraph,
    component: &[u32],
    min_support: usize,
) -> Vec<Vec<Vec<u32>>> {
    let parts = get_partitions(graph, component);
    let links = count_links(graph, &parts);
    let support = count_support_between(graph, &parts);

    // union-find over partition indices
    let mut parent: Vec<usize> = (0..parts.len()).collect();
    fn find(parent: &mut Vec<usize>, x: usize) -> usize {
        if parent[x] != x {
            let root = find(parent, parent[x]);
            parent[x] = root;
        }
        parent[x]
    }
    let mut joined: FxHashSet<usize> = FxHashSet::default();
    for (&(i, j), &n_links) in &links {
        if n_links >= min_support {
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            parent[ri] = rj;
            joined.insert(i);
            joined.insert(j);
        }
    }

    let mut jobs: FxHashMap<usize, Vec<Vec<u32>>> = FxHashMap::default();
    for index in 0..parts.len() {
        let standalone = support
            .within
            .get(&index)
            .map(|nodes| nodes.len() >= min_support)
            .unwrap_or(false);
        if joined.contains(&index) || standalone {
            let root = find(&mut parent, index);
            jobs.entry(root).or_default().push(parts[index].clone());
        }
    }
    let mut jobs: Vec<Vec<Vec<u32>>> = jobs.into_values().collect();
    jobs.sort_by_key(|job| job.first().and_then(|p| p.first().copied()));
    jobs
}
