use crate::utils::{open_text_reader, Result};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

/// Injected sites stay searchable this far behind the read cursor.
const SITE_SCOPE: i64 = 500;
/// A node adopts a site when within this distance of it.
const SITE_NEAR: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
    Del,
    Ins,
    Bnd,
}

impl SiteType {
    fn from_str(value: &str) -> SiteType {
        match value {
            "DEL" => SiteType::Del,
            "INS" => SiteType::Ins,
            _ => SiteType::Bnd,
        }
    }
}

/// A user-supplied prior locus.
#[derive(Debug, Clone, PartialEq)]
pub struct SvSite {
    pub chrom: i32,
    pub pos: i64,
    pub chrom2: i32,
    pub end: i64,
    pub svtype: SiteType,
    pub svlen: i64,
}

/// Parses a sites file (`chrom start chrom2 end svtype svlen`, tab
/// separated, `#` comments) into position-ordered queues per chromosome.
pub fn load_sites(path: &Path, tid_lookup: &FxHashMap<String, i32>) -> Result<FxHashMap<i32, VecDeque<SvSite>>> {
    let reader = open_text_reader(path)?;
    let mut by_chrom: FxHashMap<i32, Vec<SvSite>> = FxHashMap::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("{}: {}", path.display(), e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 6 {
            return Err(format!(
                "Expected 6 tab-separated fields at line {} of {}: {}",
                index + 1,
                path.display(),
                line
            ));
        }
        let tid = |name: &str| -> Result<i32> {
            tid_lookup
                .get(name)
                .copied()
                .ok_or_else(|| format!("Unknown reference name in sites file: {}", name))
        };
        let coord = |s: &str| -> Result<i64> {
            s.trim()
                .parse()
                .map_err(|_| format!("Invalid value '{}' at line {}", s, index + 1))
        };
        let site = SvSite {
            chrom: tid(fields[0])?,
            pos: coord(fields[1])?,
            chrom2: tid(fields[2])?,
            end: coord(fields[3])?,
            svtype: SiteType::from_str(fields[4]),
            svlen: coord(fields[5])?,
        };
        by_chrom.entry(site.chrom).or_default().push(site);
    }
    let mut queues = FxHashMap::default();
    for (chrom, mut sites) in by_chrom {
        sites.sort_by_key(|site| site.pos);
        queues.insert(chrom, sites.into());
    }
    Ok(queues)
}

/// Feeds prior sites into the graph as the read cursor advances, and finds
/// the site nearest a new node.
pub struct SiteAdder {
    queues: FxHashMap<i32, VecDeque<SvSite>>,
    /// Position-sorted window of injected sites on the current chromosome.
    scope: VecDeque<(i64, u32, SvSite)>,
    current_chrom: i32,
}

impl SiteAdder {
    pub fn new(queues: FxHashMap<i32, VecDeque<SvSite>>) -> Self {
        SiteAdder {
            queues,
            scope: VecDeque::new(),
            current_chrom: -1,
        }
    }

    /// Drains sites overtaken by the cursor and pops every site within
    /// `cluster_dist` of `pos`; the caller injects a node for each.
    pub fn take_sites_near(&mut self, chrom: i32, pos: i64, cluster_dist: i64) -> Vec<SvSite> {
        if chrom != self.current_chrom {
            self.scope.clear();
            self.current_chrom = chrom;
        }
        let Some(queue) = self.queues.get_mut(&chrom) else {
            return Vec::new();
        };
        while let Some(front) = queue.front() {
            if front.pos < pos - cluster_dist {
                queue.pop_front();
            } else {
                break;
            }
        }
        let mut taken = Vec::new();
        while let Some(front) = queue.front() {
            if (front.pos - pos).abs() < cluster_dist {
                taken.push(queue.pop_front().unwrap());
            } else {
                break;
            }
        }
        taken
    }

    /// Records an injected site node in the scope window.
    pub fn register(&mut self, node: u32, site: SvSite) {
        self.scope.push_back((site.pos, node, site));
    }

    /// The injected site within 50 bp of `pos`, searched over the trailing
    /// 500-bp scope window.
    pub fn find_nearest_site(&mut self, chrom: i32, pos: i64) -> Option<(u32, SvSite)> {
        if chrom != self.current_chrom {
            return None;
        }
        while let Some(&(site_pos, _, _)) = self.scope.front() {
            if site_pos < pos - SITE_SCOPE {
                self.scope.pop_front();
            } else {
                break;
            }
        }
        self.scope
            .iter()
            .filter(|(site_pos, _, _)| (site_pos - pos).abs() < SITE_NEAR)
            .min_by_key(|(site_pos, _, _)| (site_pos - pos).abs())
            .map(|(_, node, site)| (*node, site.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(pos: i64, svtype: SiteType) -> SvSite {
        SvSite {
            chrom: 0,
            pos,
            chrom2: 0,
            end: pos + 100,
            svtype,
            svlen: 100,
        }
    }

    fn adder(sites: Vec<SvSite>) -> SiteAdder {
        let mut queues = FxHashMap::default();
        queues.insert(0, VecDeque::from(sites));
        SiteAdder::new(queues)
    }

    #[test]
    fn test_sites_taken_inside_cluster_distance() {
        let mut adder = adder(vec![site(1000, SiteType::Del), site(5000, SiteType::Ins)]);
        let taken = adder.take_sites_near(0, 900, 500);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].pos, 1000);
        // the distant site stays queued
        let taken = adder.take_sites_near(0, 4900, 500);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].pos, 5000);
    }

    #[test]
    fn test_overtaken_sites_are_dropped() {
        let mut adder = adder(vec![site(1000, SiteType::Del)]);
        assert!(adder.take_sites_near(0, 10_000, 500).is_empty());
        assert!(adder.take_sites_near(0, 1000, 500).is_empty());
    }

    #[test]
    fn test_find_nearest_site() {
        let mut adder = adder(vec![]);
        adder.current_chrom = 0;
        adder.register(3, site(1000, SiteType::Del));
        let found = adder.find_nearest_site(0, 1030);
        assert_eq!(found.map(|(node, _)| node), Some(3));
        assert!(adder.find_nearest_site(0, 1060).is_none());
        assert!(adder.find_nearest_site(1, 1030).is_none());
    }

    #[test]
    fn test_scope_window_expires() {
        let mut adder = adder(vec![]);
        adder.current_chrom = 0;
        adder.register(3, site(1000, SiteType::Del));
        assert!(adder.find_nearest_site(0, 1600).is_none());
        assert!(adder.scope.is_empty());
    }
}
