use crate::cluster::read::{FLAG_FIRST_IN_PAIR, MASK_NON_PRIMARY};
use crate::graph::{AssocGraph, EDGE_TEMPLATE};
use rustc_hash::FxHashMap;

/// Buffers the node occurrences of each sequencing template and, on flush,
/// joins them with weight-1 edges.
#[derive(Default)]
pub struct TemplateEdges {
    templates: FxHashMap<u64, Vec<(i64, u32, u16)>>,
}

impl TemplateEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, qname_hash: u64, query_start: i64, node: u32, flag: u16) {
        self.templates
            .entry(qname_hash)
            .or_default()
            .push((query_start, node, flag));
    }

    /// Joins each template's records: consecutive blocks of either read are
    /// chained in query order, and the two primary records are linked.
    /// Consumes the buffered state.
    pub fn flush(&mut self, graph: &mut AssocGraph) {
        for (_, entries) in self.templates.drain() {
            let mut read1: Vec<(i64, u32, u16)> = Vec::new();
            let mut read2: Vec<(i64, u32, u16)> = Vec::new();
            for entry in entries {
                if entry.2 & FLAG_FIRST_IN_PAIR != 0 {
                    read1.push(entry);
                } else {
                    read2.push(entry);
                }
            }
            read1.sort_unstable_by_key(|&(query_start, _, _)| query_start);
            read2.sort_unstable_by_key(|&(query_start, _, _)| query_start);
            for reads in [&read1, &read2] {
                for pair in reads.windows(2) {
                    graph.add_edge(pair[0].1, pair[1].1, EDGE_TEMPLATE);
                }
            }
            let primary1 = read1.iter().find(|&&(_, _, flag)| flag & MASK_NON_PRIMARY == 0);
            let primary2 = read2.iter().find(|&&(_, _, flag)| flag & MASK_NON_PRIMARY == 0);
            if let (Some(&(_, u, _)), Some(&(_, v, _))) = (primary1, primary2) {
                graph.add_edge(u, v, EDGE_TEMPLATE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primaries_of_both_reads_are_joined() {
        let mut graph = AssocGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let mut edges = TemplateEdges::new();
        edges.add(7, 0, a, 0x41); // read 1 primary
        edges.add(7, 0, b, 0x81); // read 2 primary
        edges.flush(&mut graph);
        assert_eq!(graph.neighbors(a), &[(b, EDGE_TEMPLATE)]);
    }

    #[test]
    fn test_supplementary_blocks_chain_in_query_order() {
        let mut graph = AssocGraph::new();
        let primary = graph.add_node();
        let supp_near = graph.add_node();
        let supp_far = graph.add_node();
        let mut edges = TemplateEdges::new();
        edges.add(7, 0, primary, 0x41);
        edges.add(7, 90, supp_far, 0x841);
        edges.add(7, 50, supp_near, 0x841);
        edges.flush(&mut graph);
        assert!(graph.has_edge(primary, supp_near));
        assert!(graph.has_edge(supp_near, supp_far));
        assert!(!graph.has_edge(primary, supp_far));
    }

    #[test]
    fn test_lone_read_gets_no_edges() {
        let mut graph = AssocGraph::new();
        let a = graph.add_node();
        let mut edges = TemplateEdges::new();
        edges.add(7, 0, a, 0x41);
        edges.flush(&mut graph);
        assert!(graph.neighbors(a).is_empty());
    }

    #[test]
    fn test_different_templates_stay_apart() {
        let mut graph = AssocGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let mut edges = TemplateEdges::new();
        edges.add(7, 0, a, 0x41);
        edges.add(8, 0, b, 0x81);
        edges.flush(&mut graph);
        assert!(graph.neighbors(a).is_empty());
        assert!(graph.neighbors(b).is_empty());
    }

    #[test]
    fn test_flush_clears_buffered_state() {
        let mut graph = AssocGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let mut edges = TemplateEdges::new();
        edges.add(7, 0, a, 0x41);
        edges.add(7, 0, b, 0x81);
        edges.flush(&mut graph);
        assert!(edges.templates.is_empty());
    }
}
