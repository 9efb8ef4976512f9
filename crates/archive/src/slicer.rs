//! Pcap slicer (C4): map a time span to the minimal set of byte ranges
//! that must be read to recover every packet in it (spec §4.3).
//! Grounded on `examples/original_source/pcap/slicer.go` (the later,
//! simpler revision).

use serde::{Deserialize, Serialize};
use zq_core::Span;

/// A half-open byte range `[start, end)` within a pcap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One section of a pcap index: a block header range plus the sorted
/// `(timestamp, byte offset)` samples recorded within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSection {
    /// Byte range of this section's block header(s), always included
    /// in the slice regardless of whether it overlaps the requested
    /// span (spec §4.3 step 2, "pre-existing block ranges").
    pub header_range: ByteRange,
    /// `(ts, byte_offset)` samples, ascending by both fields.
    pub samples: Vec<(i64, u64)>,
    /// Total byte length of the section's packet data, used as the
    /// upper bound when the last sample is the narrowest match.
    pub data_end: u64,
}

/// The index over a single pcap file: an ordered list of sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Index {
    pub sections: Vec<IndexSection>,
}

/// Raised when no section in the index overlaps the requested span at
/// all (spec §4.3 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoPcapsFound;

impl std::fmt::Display for NoPcapsFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("no pcaps found covering the requested span")
    }
}

impl std::error::Error for NoPcapsFound {}

/// Find the narrowest byte range in `samples` covering `[ts, end)`
/// (spec §4.3 step 1, "find-smallest-domain").
///
/// Samples are sparse timestamp checkpoints, not every packet, so the
/// returned range always over-covers slightly: it starts at the last
/// sample at or before `ts` (or the section start if none) and ends at
/// the first sample at or after `end` (or `data_end` if none).
fn find_smallest_domain(samples: &[(i64, u64)], data_end: u64, span: Span) -> Option<ByteRange> {
    if samples.is_empty() {
        return None;
    }
    let lo = samples[0].0;
    let hi = samples[samples.len() - 1].0;
    if span.end() <= lo || span.ts > hi {
        return None;
    }

    let start = samples
        .iter()
        .rev()
        .find(|(ts, _)| *ts <= span.ts)
        .map(|(_, off)| *off)
        .unwrap_or(samples[0].1);

    let end = samples
        .iter()
        .find(|(ts, _)| *ts >= span.end())
        .map(|(_, off)| *off)
        .unwrap_or(data_end);

    Some(ByteRange { start, end })
}

/// Generate the minimal set of non-overlapping byte ranges sufficient
/// to recover every packet whose timestamp lies in `span` (spec §4.3).
///
/// Consumers must still re-filter packets by timestamp: ranges may
/// contain extras at their boundaries.
pub fn generate_slices(index: &Index, span: Span) -> Result<Vec<ByteRange>, NoPcapsFound> {
    let mut ranges: Vec<ByteRange> = Vec::new();
    let mut any_section_matched = false;

    for section in &index.sections {
        let domain = find_smallest_domain(&section.samples, section.data_end, span);
        let Some(domain) = domain else { continue };
        if domain.is_empty() {
            continue;
        }
        any_section_matched = true;

        if !ranges.iter().any(|r| r.overlaps(&section.header_range)) {
            ranges.push(section.header_range);
        }
        ranges.push(domain);
    }

    if !any_section_matched {
        return Err(NoPcapsFound);
    }

    ranges.sort_by_key(|r| r.start);
    Ok(merge_adjacent(ranges))
}

/// Coalesce overlapping/touching ranges in an already start-sorted list.
fn merge_adjacent(ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    let mut out: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.start <= last.end => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}
