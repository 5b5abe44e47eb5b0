//! Accessors over alignment records used throughout signal extraction.

use rust_htslib::bam::record::{Aux, Cigar, Record};
use xxhash_rust::xxh64::xxh64;

pub const FLAG_PAIRED: u16 = 1;
pub const FLAG_MATE_UNMAPPED: u16 = 8;
pub const FLAG_REVERSE: u16 = 16;
pub const FLAG_FIRST_IN_PAIR: u16 = 64;
/// dup | qcfail | unmapped
pub const MASK_HARD_FILTER: u16 = 0x604;
/// secondary | supplementary
pub const MASK_NON_PRIMARY: u16 = 0x900;

pub fn qname_hash(rec: &Record) -> u64 {
    xxh64(rec.qname(), 0)
}

/// Soft-clip lengths at the read start and end, in reference orientation.
pub fn clip_lengths(rec: &Record) -> (i64, i64) {
    let cigar = rec.cigar();
    (cigar.leading_softclips(), cigar.trailing_softclips())
}

/// Query length implied by the CIGAR, hard clips included.
pub fn infer_read_length(rec: &Record) -> i64 {
    rec.cigar()
        .iter()
        .map(|op| match op {
            Cigar::Match(len)
            | Cigar::Ins(len)
            | Cigar::SoftClip(len)
            | Cigar::HardClip(len)
            | Cigar::Equal(len)
            | Cigar::Diff(len) => *len as i64,
            Cigar::Del(_) | Cigar::RefSkip(_) | Cigar::Pad(_) => 0,
        })
        .sum()
}

/// Start of the aligned block in original read coordinates; used to order
/// records of one template.
pub fn query_start(rec: &Record) -> i64 {
    let cigar = rec.cigar();
    let leading = match cigar.first() {
        Some(Cigar::SoftClip(len)) | Some(Cigar::HardClip(len)) => *len as i64,
        _ => 0,
    };
    let trailing = match cigar.last() {
        Some(Cigar::SoftClip(len)) | Some(Cigar::HardClip(len)) => *len as i64,
        _ => 0,
    };
    if rec.flags() & FLAG_REVERSE != 0 {
        trailing
    } else {
        leading
    }
}

/// One block of the `SA` auxiliary tag.
#[derive(Debug, Clone, PartialEq)]
pub struct SaSegment {
    pub chrom: String,
    pub pos: i64,
    pub is_fwd_strand: bool,
    pub cigar: String,
    pub mapq: u8,
}

/// Parses the `SA` tag (`;`-separated `chrom,pos,strand,cigar,mapq,nm`
/// entries). A malformed entry ends parsing; entries seen so far are kept.
pub fn parse_sa_tag(rec: &Record) -> Vec<SaSegment> {
    let sa_value = match rec.aux(b"SA") {
        Ok(Aux::String(value)) => value,
        _ => return Vec::new(),
    };
    let mut segments = Vec::new();
    for entry in sa_value.split_terminator(';') {
        let fields: Vec<&str> = entry.split(',').collect();
        if fields.len() != 6 {
            break;
        }
        let Ok(pos) = fields[1].parse::<i64>() else {
            break;
        };
        let Ok(mapq) = fields[4].parse::<u8>() else {
            break;
        };
        segments.push(SaSegment {
            chrom: fields[0].to_string(),
            pos: pos - 1,
            is_fwd_strand: fields[2] == "+",
            cigar: fields[3].to_string(),
            mapq,
        });
    }
    segments
}

pub fn has_zp_tag(rec: &Record) -> bool {
    rec.aux(b"ZP").is_ok()
}

#[cfg(test)]
pub mod test_records {
    use rust_htslib::bam::record::{CigarString, Record};

    /// Builds a mapped record the way library tests need them; flags and
    /// mate fields can be adjusted afterwards.
    pub fn make_record(
        qname: &[u8],
        cigar: &str,
        tid: i32,
        pos: i64,
        flags: u16,
        seq: &[u8],
    ) -> Record {
        let mut rec = Record::new();
        let cigar = CigarString::try_from(cigar.as_bytes()).unwrap();
        let quals = vec![30; seq.len()];
        rec.set(qname, Some(&cigar), seq, &quals);
        rec.set_tid(tid);
        rec.set_pos(pos);
        rec.set_mapq(60);
        rec.set_flags(flags);
        rec.set_mtid(-1);
        rec.set_mpos(-1);
        rec
    }
}
