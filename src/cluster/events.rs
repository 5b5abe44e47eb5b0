use crate::cluster::params::Params;
use crate::cluster::read::{clip_lengths, parse_sa_tag, FLAG_MATE_UNMAPPED, FLAG_PAIRED};
use crate::utils::Result;
use rust_htslib::bam::ext::BamRecordExtensions;
use rust_htslib::bam::record::{Cigar, Record};
use rustc_hash::FxHashMap;

/// Partner chromosome of events with no real partner coordinate.
pub const INSERTION_SENTINEL: i32 = 10_000_000;

/// Signal categories in clustering priority order. Values below 2 are
/// between-read signals, the rest are within-read signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadType {
    Discordant = 0,
    Split = 1,
    Deletion = 2,
    Insertion = 3,
    Breakend = 4,
}

impl ReadType {
    pub fn is_within_read(self) -> bool {
        self as u8 >= 2
    }
}

/// One breakpoint-pair event derived from a record.
#[derive(Debug, Clone, PartialEq)]
pub struct SvEvent {
    pub kind: ReadType,
    /// Index of the CIGAR op that generated the event, or -1 for
    /// whole-read events.
    pub cigar_index: i32,
    pub event_pos: i64,
    pub chrom2: i32,
    pub pos2: i64,
    /// CIGAR event length; 0 when no length is known.
    pub svlen: i64,
}

/// Derives the SV events witnessed by one admitted record: one event per
/// long CIGAR indel, then at most one whole-read event (split, breakend or
/// discordant). Split reads yield a node per read end.
pub fn classify(
    rec: &Record,
    params: &Params,
    tid_lookup: &FxHashMap<String, i32>,
) -> Result<Vec<SvEvent>> {
    let tid = rec.tid();
    let mut events = Vec::new();

    let mut ref_cursor = rec.pos();
    for (index, op) in rec.cigar().iter().enumerate() {
        match *op {
            Cigar::Del(len) => {
                let len = len as i64;
                if len >= params.min_sv_size {
                    events.push(SvEvent {
                        kind: ReadType::Deletion,
                        cigar_index: index as i32,
                        event_pos: ref_cursor,
                        chrom2: tid,
                        pos2: ref_cursor + len,
                        svlen: len,
                    });
                }
                ref_cursor += len;
            }
            Cigar::Ins(len) => {
                let len = len as i64;
                if len >= params.min_sv_size {
                    events.push(SvEvent {
                        kind: ReadType::Insertion,
                        cigar_index: index as i32,
                        event_pos: ref_cursor,
                        chrom2: tid,
                        pos2: ref_cursor + len,
                        svlen: len,
                    });
                }
            }
            Cigar::Match(len) | Cigar::RefSkip(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                ref_cursor += len as i64;
            }
            Cigar::SoftClip(_) | Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }

    if let Some(whole_read) = classify_whole_read(rec, params, tid_lookup)? {
        events.extend(whole_read);
    }
    Ok(events)
}

fn classify_whole_read(
    rec: &Record,
    params: &Params,
    tid_lookup: &FxHashMap<String, i32>,
) -> Result<Option<Vec<SvEvent>>> {
    let tid = rec.tid();
    let flags = rec.flags();
    let (left_clip, right_clip) = clip_lengths(rec);

    let sa_segments = parse_sa_tag(rec);
    if let Some(sa) = sa_segments.first() {
        let sa_tid = *tid_lookup
            .get(&sa.chrom)
            .ok_or_else(|| format!("Unknown reference name in SA tag: {}", sa.chrom))?;
        let start = rec.pos();
        let end = rec.reference_end();
        // the end on the longer-clipped side joins the supplementary block
        let sa_on_left = left_clip >= right_clip;
        let left = SvEvent {
            kind: ReadType::Split,
            cigar_index: -1,
            event_pos: start,
            chrom2: if sa_on_left { sa_tid } else { tid },
            pos2: if sa_on_left { sa.pos } else { start },
            svlen: 0,
        };
        let right = SvEvent {
            kind: ReadType::Split,
            cigar_index: -1,
            event_pos: end,
            chrom2: if sa_on_left { tid } else { sa_tid },
            pos2: if sa_on_left { end } else { sa.pos },
            svlen: 0,
        };
        return Ok(Some(vec![left, right]));
    }

    if flags & FLAG_PAIRED != 0 && flags & FLAG_MATE_UNMAPPED != 0 {
        let event_pos = breakend_position(rec, left_clip, right_clip);
        return Ok(Some(vec![SvEvent {
            kind: ReadType::Breakend,
            cigar_index: -1,
            event_pos,
            chrom2: INSERTION_SENTINEL,
            pos2: event_pos,
            svlen: 0,
        }]));
    }

    if left_clip.max(right_clip) >= params.clip_length {
        let event_pos = breakend_position(rec, left_clip, right_clip);
        return Ok(Some(vec![SvEvent {
            kind: ReadType::Breakend,
            cigar_index: -1,
            event_pos,
            chrom2: INSERTION_SENTINEL,
            pos2: event_pos,
            svlen: 0,
        }]));
    }

    if flags & FLAG_PAIRED != 0 && rec.mtid() >= 0 {
        let discordant = !rec.is_proper_pair()
            || rec.mtid() != tid
            || rec.insert_size().abs() >= params.max_dist;
        if discordant {
            let event_pos = if rec.is_reverse() {
                rec.pos()
            } else {
                rec.reference_end()
            };
            return Ok(Some(vec![SvEvent {
                kind: ReadType::Discordant,
                cigar_index: -1,
                event_pos,
                chrom2: rec.mtid(),
                pos2: rec.mpos(),
                svlen: 0,
            }]));
        }
    }

    Ok(None)
}

/// Breakpoint position of a clip-witnessed event: the clipped read end, or
/// the alignment start when neither end is clipped.
fn breakend_position(rec: &Record, left_clip: i64, right_clip: i64) -> i64 {
    if left_clip >= right_clip {
        rec.pos()
    } else {
        rec.reference_end()
    }
}
