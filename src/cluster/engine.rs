use crate::cluster::clip_scope::{ClipScoper, ClipSide};
use crate::cluster::events::{classify, ReadType, SvEvent};
use crate::cluster::params::Params;
use crate::cluster::pe_scope::PairedEndScoper;
use crate::cluster::read::{clip_lengths, qname_hash, query_start};
use crate::cluster::sites::{SiteAdder, SiteType, SvSite};
use crate::cluster::template_edges::TemplateEdges;
use crate::graph::{
    break_large_component, count_support_between, get_partitions, AssocGraph, EDGE_CLIP,
    EDGE_LOCAL, EDGE_SITE,
};
use crate::utils::Result;
use rust_htslib::bam::ext::BamRecordExtensions;
use rust_htslib::bam::Record;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Components above this size are resolved through the partitioner.
const LARGE_COMPONENT: usize = 50;

/// One occurrence of an alignment in the association graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub qname_hash: u64,
    pub flag: u16,
    pub pos: i64,
    pub rname: i32,
    /// Stream offset of the originating record; 0 when the stream has no
    /// random access.
    pub tell: i64,
    /// Index of the generating CIGAR op, -1 for whole-read nodes.
    pub cigar_index: i32,
    pub event_pos: i64,
}

impl NodeInfo {
    /// Whole-read nodes witness both template ends.
    pub fn support(&self) -> u32 {
        if self.cigar_index == -1 {
            2
        } else {
            1
        }
    }
}

/// One SV-candidate component handed to the downstream classifier.
#[derive(Debug)]
pub struct SvCandidate {
    pub parts: Vec<Vec<u32>>,
    pub s_between: FxHashMap<(usize, usize), (Vec<u32>, Vec<u32>)>,
    pub s_within: FxHashMap<usize, Vec<u32>>,
    pub nodes: FxHashMap<u32, NodeInfo>,
    /// Buffered records per node; empty when the stream supports random
    /// access (use `NodeInfo::tell` instead).
    pub reads: FxHashMap<u32, Record>,
    pub sites: FxHashMap<u32, SvSite>,
}

impl SvCandidate {
    /// Reference interval spanned by the component's events, on the
    /// chromosome of its first node.
    pub fn primary_interval(&self) -> Option<(i32, i64, i64)> {
        let rname = self.nodes.values().map(|n| n.rname).min()?;
        let positions = self
            .nodes
            .values()
            .filter(|n| n.rname == rname)
            .map(|n| n.event_pos);
        let start = positions.clone().min()?;
        let end = positions.max()?;
        Some((rname, start, end))
    }
}

struct ReadBuffer {
    records: Vec<Record>,
    by_node: FxHashMap<u32, usize>,
    cap: usize,
}

/// Builds the read-association graph from a stream of admitted records and
/// resolves it into SV candidates.
pub struct ClusterEngine {
    params: Params,
    graph: AssocGraph,
    nodes: Vec<NodeInfo>,
    pe_scope: PairedEndScoper,
    clip_scope: ClipScoper,
    template_edges: TemplateEdges,
    site_adder: Option<SiteAdder>,
    site_nodes: FxHashSet<u32>,
    site_info: FxHashMap<u32, SvSite>,
    tid_lookup: FxHashMap<String, i32>,
    read_buffer: Option<ReadBuffer>,
}

impl ClusterEngine {
    pub fn new(
        reference_names: &[String],
        params: Params,
        sites: Option<FxHashMap<i32, VecDeque<SvSite>>>,
        has_random_access: bool,
    ) -> Self {
        let mut tid_lookup = FxHashMap::default();
        for (tid, name) in reference_names.iter().enumerate() {
            tid_lookup.insert(name.clone(), tid as i32);
        }
        let read_buffer = if has_random_access {
            None
        } else {
            Some(ReadBuffer {
                records: Vec::new(),
                by_node: FxHashMap::default(),
                cap: params.buffer_size,
            })
        };
        ClusterEngine {
            graph: AssocGraph::new(),
            nodes: Vec::new(),
            pe_scope: PairedEndScoper::new(reference_names.len(), &params),
            clip_scope: ClipScoper::new(&params),
            template_edges: TemplateEdges::new(),
            site_adder: sites.map(SiteAdder::new),
            site_nodes: FxHashSet::default(),
            site_info: FxHashMap::default(),
            tid_lookup,
            read_buffer,
            params,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Classifies one admitted record and threads its events through the
    /// graph and scopers.
    pub fn process_alignment(&mut self, rec: Record, tell: i64) -> Result<()> {
        let tid = rec.tid();
        if tid < 0 {
            return Ok(());
        }
        let pending_sites = match &mut self.site_adder {
            Some(adder) => adder.take_sites_near(tid, rec.pos(), self.params.clst_dist),
            None => Vec::new(),
        };
        for site in pending_sites {
            self.inject_site(site);
        }

        let events = classify(&rec, &self.params, &self.tid_lookup)?;
        if events.is_empty() {
            return Ok(());
        }
        let qhash = qname_hash(&rec);
        let mut created = Vec::with_capacity(events.len());
        for event in &events {
            created.push(self.new_node(&rec, tell, qhash, event));
        }

        // clip evidence first: a minimizer link outranks a positional one
        self.link_clips(&rec, &events, &created);
        for (event, &node) in events.iter().zip(&created) {
            self.link_and_scope(&rec, node, event);
        }

        for (event, &node) in events.iter().zip(&created) {
            if !event.kind.is_within_read() {
                self.template_edges
                    .add(qhash, query_start(&rec), node, rec.flags());
            }
        }

        if let Some(buffer) = &mut self.read_buffer {
            if buffer.records.len() >= buffer.cap {
                return Err(format!(
                    "Read buffer exceeded {} records while the input has no random access; \
                     supply an indexed BAM or raise --buffer-size",
                    buffer.cap
                ));
            }
            let read_index = buffer.records.len();
            for &node in &created {
                buffer.by_node.insert(node, read_index);
            }
            buffer.records.push(rec);
        }
        Ok(())
    }

    /// Creates the graph node of one event.
    fn new_node(&mut self, rec: &Record, tell: i64, qhash: u64, event: &SvEvent) -> u32 {
        let node = self.graph.add_node();
        self.nodes.push(NodeInfo {
            qname_hash: qhash,
            flag: rec.flags(),
            pos: rec.pos(),
            rname: rec.tid(),
            tell,
            cigar_index: event.cigar_index,
            event_pos: event.event_pos,
        });
        debug_assert_eq!(self.nodes.len(), self.graph.node_count());
        node
    }

    /// Links a node against prior breakpoints and records it in the scope.
    fn link_and_scope(&mut self, rec: &Record, node: u32, event: &SvEvent) {
        let c1 = rec.tid();
        let (left_clip, right_clip) = clip_lengths(rec);
        let clipped = left_clip.max(right_clip) >= self.params.clip_length;
        let searchable = rec.mapq() >= self.params.mapq_thresh
            && !(self.params.mm_only && clipped);
        if searchable {
            let partners = self.pe_scope.find_other_nodes(
                node,
                c1,
                event.event_pos,
                event.chrom2,
                event.pos2,
                event.kind,
                event.svlen,
                self.params.trust_ins_len,
            );
            for partner in partners {
                let weight = if self.site_nodes.contains(&partner) {
                    EDGE_SITE
                } else {
                    EDGE_LOCAL
                };
                self.graph.add_edge(node, partner, weight);
            }
        }
        self.pe_scope.add_item(
            node,
            c1,
            event.event_pos,
            event.chrom2,
            event.pos2,
            event.kind,
            event.svlen,
        );
        if let Some(adder) = &mut self.site_adder {
            if !self.site_nodes.contains(&node) {
                if let Some((_, site)) = adder.find_nearest_site(c1, event.event_pos) {
                    self.site_info.insert(node, site);
                }
            }
        }
    }

    /// Runs qualifying soft clips through the minimizer scoper and adds
    /// clip edges. Only breakend nodes rely on clips for linking; split
    /// reads already carry partner coordinates.
    fn link_clips(&mut self, rec: &Record, events: &[SvEvent], created: &[u32]) {
        let Some((index, _)) = events
            .iter()
            .enumerate()
            .find(|(_, e)| e.kind == ReadType::Breakend)
        else {
            return;
        };
        let node = created[index];
        let (left_clip, right_clip) = clip_lengths(rec);
        let seq = rec.seq().as_bytes();
        if seq.is_empty() {
            return;
        }
        let mut partners = Vec::new();
        if left_clip >= self.params.scope_clip_length {
            self.clip_scope.update(
                ClipSide::Left,
                &seq[..left_clip as usize],
                node,
                rec.tid(),
                rec.pos(),
                &mut partners,
            );
        }
        if right_clip >= self.params.scope_clip_length {
            self.clip_scope.update(
                ClipSide::Right,
                &seq[seq.len() - right_clip as usize..],
                node,
                rec.tid(),
                rec.reference_end(),
                &mut partners,
            );
        }
        for partner in partners {
            self.graph.add_edge(node, partner, EDGE_CLIP);
        }
    }

    /// Creates a synthetic node for a prior site and registers it with the
    /// scopers so nearby reads can link to it.
    fn inject_site(&mut self, site: SvSite) {
        let node = self.graph.add_node();
        self.nodes.push(NodeInfo {
            qname_hash: 0,
            flag: 0,
            pos: site.pos,
            rname: site.chrom,
            tell: 0,
            cigar_index: -1,
            event_pos: site.pos,
        });
        let (kind, c2, p2, len) = match site.svtype {
            SiteType::Del => (ReadType::Deletion, site.chrom2, site.end, site.svlen),
            SiteType::Ins => (
                ReadType::Insertion,
                site.chrom,
                site.pos + site.svlen,
                site.svlen,
            ),
            SiteType::Bnd => (ReadType::Breakend, site.chrom2, site.end, 0),
        };
        self.pe_scope
            .add_item(node, site.chrom, site.pos, c2, p2, kind, len);
        self.site_nodes.insert(node);
        if let Some(adder) = &mut self.site_adder {
            adder.register(node, site);
        }
    }

    /// Flushes template edges, extracts components and resolves them into
    /// SV candidates. Call once, after the last record.
    pub fn finish(&mut self) -> Vec<SvCandidate> {
        self.template_edges.flush(&mut self.graph);
        let components = self.graph.connected_components();
        log::debug!(
            "{} nodes, {} components before support filtering",
            self.nodes.len(),
            components.len()
        );
        let mut candidates = Vec::new();
        for component in components {
            if component.len() < 2 {
                continue;
            }
            let support: usize = component
                .iter()
                .filter(|node| !self.site_nodes.contains(node))
                .map(|&node| self.nodes[node as usize].support() as usize)
                .sum();
            if support < self.params.min_support {
                continue;
            }
            if component.len() > LARGE_COMPONENT {
                let jobs =
                    break_large_component(&self.graph, &component, self.params.min_support);
                for parts in jobs {
                    candidates.push(self.make_candidate(parts));
                }
            } else {
                let parts = get_partitions(&self.graph, &component);
                candidates.push(self.make_candidate(parts));
            }
        }
        candidates
    }

    fn make_candidate(&self, parts: Vec<Vec<u32>>) -> SvCandidate {
        let counts = count_support_between(&self.graph, &parts);
        let mut nodes = FxHashMap::default();
        let mut reads = FxHashMap::default();
        let mut sites = FxHashMap::default();
        for &node in parts.iter().flatten() {
            nodes.insert(node, self.nodes[node as usize].clone());
            if let Some(buffer) = &self.read_buffer {
                if let Some(&read_index) = buffer.by_node.get(&node) {
                    reads.insert(node, buffer.records[read_index].clone());
                }
            }
            if let Some(site) = self.site_info.get(&node) {
                sites.insert(node, site.clone());
            }
        }
        SvCandidate {
            parts,
            s_between: counts.between,
            s_within: counts.within,
            nodes,
            reads,
            sites,
        }
    }

    #[cfg(test)]
    pub(crate) fn graph(&self) -> &AssocGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::read::test_records::make_record;
    use crate::cluster::read::{FLAG_PAIRED, FLAG_REVERSE};
    use rust_htslib::bam::record::Aux;

    fn refs() -> Vec<String> {
        vec![
            "chr1".into(),
            "chr2".into(),
            "chr3".into(),
            "chr4".into(),
            "chr5".into(),
        ]
    }

    fn engine(params: Params) -> ClusterEngine {
        ClusterEngine::new(&refs(), params, None, true)
    }

    fn discordant_params() -> Params {
        // max_dist of 500
        let mut params = Params::default();
        params.min_support = 2;
        params.update_library(100, 300.0, 50.0, false);
        params
    }

    #[test]
    fn test_discordant_pair_links_weight_two() {
        let mut engine = engine(discordant_params());
        for (qname, pos) in [(&b"r1"[..], 1000), (&b"r2"[..], 1002)] {
            let mut rec = make_record(qname, "100M", 0, pos, FLAG_PAIRED, &vec![b'A'; 100]);
            rec.set_mtid(0);
            rec.set_mpos(5000);
            rec.set_insert_size(4000);
            engine.process_alignment(rec, 0).unwrap();
        }
        assert_eq!(engine.node_count(), 2);
        assert_eq!(engine.graph().neighbors(1), &[(0, EDGE_LOCAL)]);
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].nodes.len(), 2);
    }

    #[test]
    fn test_same_template_links_weight_one() {
        let mut engine = engine(discordant_params());
        let mut first = make_record(
            b"r1",
            "100M",
            0,
            1000,
            FLAG_PAIRED | 0x40,
            &vec![b'A'; 100],
        );
        first.set_mtid(1);
        first.set_mpos(5000);
        let mut second = make_record(
            b"r1",
            "100M",
            1,
            5000,
            FLAG_PAIRED | FLAG_REVERSE | 0x80,
            &vec![b'A'; 100],
        );
        second.set_mtid(0);
        second.set_mpos(1000);
        engine.process_alignment(first, 0).unwrap();
        engine.process_alignment(second, 0).unwrap();
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
        assert!(engine.graph().has_edge(0, 1));
        assert_eq!(engine.graph().neighbors(0), &[(1, crate::graph::EDGE_TEMPLATE)]);
    }

    #[test]
    fn test_split_reads_cluster_via_sa_coordinates() {
        let mut params = Params::default();
        params.min_support = 2;
        let mut engine = engine(params);
        for (qname, pos, sa) in [
            (&b"r1"[..], 1000, "chr2,9001,+,50S50M,60,0;"),
            (&b"r2"[..], 1005, "chr2,9004,+,50S50M,60,0;"),
        ] {
            let mut rec = make_record(qname, "50M50S", 0, pos, 0, &vec![b'A'; 100]);
            rec.push_aux(b"SA", Aux::String(sa)).unwrap();
            engine.process_alignment(rec, 0).unwrap();
        }
        // two nodes per read; the SA-carrying ends pair via the exact bucket
        assert_eq!(engine.node_count(), 4);
        assert!(engine.graph().has_edge(1, 3));
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_matching_deletions_cluster() {
        let mut params = Params::default();
        params.min_support = 2;
        let mut engine = engine(params);
        engine
            .process_alignment(
                make_record(b"r1", "50M1000D50M", 0, 10_000, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        engine
            .process_alignment(
                make_record(b"r2", "47M999D53M", 0, 10_003, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        assert_eq!(engine.node_count(), 2);
        assert!(engine.graph().has_edge(0, 1));
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
        let node = &candidates[0].nodes[&0];
        assert_eq!(node.cigar_index, 1);
        assert_eq!(node.event_pos, 10_050);
    }

    #[test]
    fn test_breakend_clips_cluster_with_weight_three() {
        let mut params = Params::default();
        params.min_support = 2;
        params.minimizer_breadth = 1;
        let mut engine = engine(params);
        let clip: Vec<u8> = b"ACGTTGCAAGGCTTCTAGCATGCAACGTGGATCCAATTGGCC"
            .iter()
            .chain(b"AATTGGCC")
            .copied()
            .collect();
        for (qname, pos) in [(&b"c1"[..], 2000), (&b"c2"[..], 2010)] {
            let mut seq = clip.clone();
            seq.extend(std::iter::repeat(b'G').take(50));
            let rec = make_record(qname, "50S50M", 4, pos, 0, &seq);
            engine.process_alignment(rec, 0).unwrap();
        }
        assert_eq!(engine.node_count(), 2);
        assert_eq!(engine.graph().neighbors(1), &[(0, EDGE_CLIP)]);
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_low_mapq_skips_positional_search() {
        let mut params = Params::default();
        params.mapq_thresh = 10;
        params.min_support = 2;
        let mut engine = engine(params);
        for (qname, pos) in [(&b"r1"[..], 10_000), (&b"r2"[..], 10_003)] {
            let mut rec = make_record(qname, "50M1000D50M", 0, pos, 0, &vec![b'A'; 100]);
            rec.set_mapq(0);
            engine.process_alignment(rec, 0).unwrap();
        }
        assert_eq!(engine.node_count(), 2);
        assert!(!engine.graph().has_edge(0, 1));
    }

    #[test]
    fn test_buffer_overflow_is_fatal() {
        let mut params = Params::default();
        params.buffer_size = 1;
        let mut engine = ClusterEngine::new(&refs(), params, None, false);
        engine
            .process_alignment(
                make_record(b"r1", "50M1000D50M", 0, 10_000, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        let result = engine.process_alignment(
            make_record(b"r2", "47M999D53M", 0, 10_003, 0, &vec![b'A'; 100]),
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_buffered_reads_attached_to_candidates() {
        let mut params = Params::default();
        params.min_support = 2;
        let mut engine = ClusterEngine::new(&refs(), params, None, false);
        engine
            .process_alignment(
                make_record(b"r1", "50M1000D50M", 0, 10_000, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        engine
            .process_alignment(
                make_record(b"r2", "47M999D53M", 0, 10_003, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reads.len(), 2);
        assert_eq!(candidates[0].reads[&0].qname(), b"r1");
    }

    #[test]
    fn test_site_injection_links_reads_with_weight_zero() {
        let mut params = Params::default();
        params.min_support = 2;
        let site = SvSite {
            chrom: 0,
            pos: 10_050,
            chrom2: 0,
            end: 11_050,
            svtype: SiteType::Del,
            svlen: 1000,
        };
        let mut queues = FxHashMap::default();
        queues.insert(0, VecDeque::from(vec![site]));
        let mut engine = ClusterEngine::new(&refs(), params, Some(queues), true);
        engine
            .process_alignment(
                make_record(b"r1", "50M1000D50M", 0, 10_000, 0, &vec![b'A'; 100]),
                0,
            )
            .unwrap();
        // node 0 is the injected site, node 1 the read's deletion
        assert_eq!(engine.node_count(), 2);
        assert_eq!(engine.graph().neighbors(1), &[(0, EDGE_SITE)]);
        let candidates = engine.finish();
        // a site plus one within-read event is below the support floor
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_rescan_is_deterministic() {
        let run = || {
            let mut params = Params::default();
            params.min_support = 2;
            let mut engine = engine(params);
            for (qname, pos) in [(&b"r1"[..], 10_000), (&b"r2"[..], 10_003)] {
                engine
                    .process_alignment(
                        make_record(qname, "50M1000D50M", 0, pos, 0, &vec![b'A'; 100]),
                        0,
                    )
                    .unwrap();
            }
            let candidates = engine.finish();
            candidates
                .into_iter()
                .map(|c| c.parts)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_split_component_partitions_by_breakpoint_side() {
        let mut params = Params::default();
        params.min_support = 2;
        let mut engine = engine(params);
        for (qname, pos, sa) in [
            (&b"r1"[..], 1000, "chr2,9001,+,50S50M,60,0;"),
            (&b"r2"[..], 1005, "chr2,9004,+,50S50M,60,0;"),
        ] {
            let mut rec = make_record(qname, "50M50S", 0, pos, 0, &vec![b'A'; 100]);
            rec.push_aux(b"SA", Aux::String(sa)).unwrap();
            engine.process_alignment(rec, 0).unwrap();
        }
        let candidates = engine.finish();
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        // the two read starts on one side, the two SA-joined ends on the other
        assert_eq!(candidate.parts.len(), 2);
        assert_eq!(candidate.parts[0], vec![0, 2]);
        assert_eq!(candidate.parts[1], vec![1, 3]);
    }
}
