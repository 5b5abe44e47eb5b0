use crate::cli::CallArgs;
use crate::cluster::{load_sites, ClusterEngine, SvCandidate};
use crate::scan::{estimate_library, scan_regions, scan_stream, GenomeScanner};
use crate::utils::{
    load_regions, open_bam_reader, open_indexed_bam_reader, Result,
};
use rust_htslib::bam::Read;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Runs the `call` pipeline: library prelude, streaming scan, graph
/// clustering, candidate TSV.
pub fn call(args: CallArgs) -> Result<()> {
    let mut prelude = open_bam_reader(&args.bam_path)?;
    let library = estimate_library(&mut prelude)?;
    drop(prelude);
    log::info!(
        "Library: read length {}, insert median {:.0} (stdev {:.0})",
        library.read_length,
        library.insert_median,
        library.insert_stdev
    );

    let mut params = args.to_params();
    params.update_library(
        library.read_length,
        library.insert_median,
        library.insert_stdev,
        library.extended_tags,
    );
    log::debug!(
        "Scope distances: max_dist {}, clst_dist {}",
        params.max_dist,
        params.clst_dist
    );

    let (names, lengths) = reference_layout(&args)?;
    let mut tid_lookup: FxHashMap<String, i32> = FxHashMap::default();
    for (tid, name) in names.iter().enumerate() {
        tid_lookup.insert(name.clone(), tid as i32);
    }

    let sites = match &args.sites_path {
        Some(path) => Some(load_sites(path, &tid_lookup)?),
        None => None,
    };

    let mut scanner = GenomeScanner::new(&lengths, params.max_cov);
    let candidates = if let Some(regions_path) = &args.regions_path {
        let regions = load_regions(regions_path)?;
        let mut bam = open_indexed_bam_reader(&args.bam_path)?;
        // fetched records carry no stream offset, so reads are buffered
        let mut engine = ClusterEngine::new(&names, params, sites, false);
        scan_regions(&mut bam, &regions, &mut scanner, |rec, tell| {
            engine.process_alignment(rec, tell)
        })?;
        engine.finish()
    } else {
        let mut bam = open_bam_reader(&args.bam_path)?;
        let mut engine = ClusterEngine::new(&names, params, sites, true);
        scan_stream(&mut bam, &mut scanner, |rec, tell| {
            engine.process_alignment(rec, tell)
        })?;
        engine.finish()
    };

    if scanner.reads_dropped > 0 {
        log::info!(
            "{} reads dropped in over-covered bins",
            scanner.reads_dropped
        );
    }
    log::info!("{} candidate components", candidates.len());
    write_candidates(&args, &names, &candidates)
}

fn reference_layout(args: &CallArgs) -> Result<(Vec<String>, Vec<u64>)> {
    let bam = open_bam_reader(&args.bam_path)?;
    let header = bam.header();
    let mut names = Vec::with_capacity(header.target_count() as usize);
    let mut lengths = Vec::with_capacity(header.target_count() as usize);
    for tid in 0..header.target_count() {
        let name = header
            .tid2name(tid)
            .to_vec();
        names.push(String::from_utf8_lossy(&name).into_owned());
        lengths.push(
            header
                .target_len(tid)
                .ok_or_else(|| format!("Missing length for reference {}", tid))?,
        );
    }
    if names.is_empty() {
        return Err("Input BAM has no reference sequences".to_string());
    }
    Ok((names, lengths))
}

fn write_candidates(
    args: &CallArgs,
    names: &[String],
    candidates: &[SvCandidate],
) -> Result<()> {
    let mut writer: Box<dyn Write> = match &args.out_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    writeln!(writer, "#chrom\tstart\tchrom2\tend\tn_parts\tn_nodes\tsite")
        .map_err(|e| e.to_string())?;
    for candidate in candidates {
        let Some((rname, start, end)) = candidate.primary_interval() else {
            continue;
        };
        let second = candidate
            .nodes
            .values()
            .map(|n| n.rname)
            .max()
            .unwrap_or(rname);
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            names[rname as usize],
            start,
            names[second as usize],
            end,
            candidate.parts.len(),
            candidate.nodes.len(),
            if candidate.sites.is_empty() { "." } else { "prior" },
        )
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}
