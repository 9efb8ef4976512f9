//! Half-open nanosecond time spans (spec §3 "Span").
//!
//! A [`Span`] is `[ts, ts+dur)` in integer nanoseconds since the Unix
//! epoch. `dur` is never negative; a zero-duration span is empty.

use serde::{Deserialize, Serialize};
use std::cmp::{max, min};

/// Half-open interval `[ts, ts + dur)` in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start of the interval, in nanoseconds since the epoch.
    pub ts: i64,
    /// Length of the interval, in nanoseconds. Always `>= 0`.
    pub dur: i64,
}

impl Span {
    /// Construct a span, clamping a negative `dur` to zero.
    ///
    /// spec §3 states the invariant `dur >= 0`; rather than making
    /// construction fallible (every Processor would have to propagate
    /// that error for what is, in practice, a caller bug), we clamp.
    pub fn new(ts: i64, dur: i64) -> Self {
        Span {
            ts,
            dur: dur.max(0),
        }
    }

    /// The exclusive end of the span: `ts + dur`.
    pub fn end(&self) -> i64 {
        self.ts + self.dur
    }

    /// True if the span covers no instants.
    pub fn is_empty(&self) -> bool {
        self.dur == 0
    }

    /// True if `t` falls within `[ts, end)`.
    pub fn contains(&self, t: i64) -> bool {
        t >= self.ts && t < self.end()
    }

    /// True if `self` and `other` share any instant.
    pub fn overlaps(&self, other: &Span) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.ts < other.end() && other.ts < self.end()
    }

    /// The intersection of two spans, or an empty span at the later
    /// start point if they do not overlap.
    pub fn intersect(&self, other: &Span) -> Span {
        let start = max(self.ts, other.ts);
        let end = min(self.end(), other.end());
        Span::new(start, end - start)
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// If either span is empty, the other is returned unchanged.
    pub fn union(&self, other: &Span) -> Span {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let start = min(self.ts, other.ts);
        let end = max(self.end(), other.end());
        Span::new(start, end - start)
    }

    /// Split the span into two at `t`, clamped to the span's bounds.
    ///
    /// Returns `(before, after)` where `before` covers `[ts, t)` and
    /// `after` covers `[t, end)`.
    pub fn split(&self, t: i64) -> (Span, Span) {
        let t = t.clamp(self.ts, self.end());
        (Span::new(self.ts, t - self.ts), Span::new(t, self.end() - t))
    }
}

/// Iteration/sort direction over time-keyed data (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending by timestamp.
    Forward,
    /// Descending by timestamp.
    Reverse,
}

impl Direction {
    /// `1` for [`Direction::Forward`], `-1` for [`Direction::Reverse`],
    /// matching the `dir ∈ {-1,+1}` convention used in spec §4.7/§6.
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// Parse the `{-1,+1}` convention back into a [`Direction`].
    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            1 => Some(Direction::Forward),
            -1 => Some(Direction::Reverse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dur_span_is_empty() {
        assert!(Span::new(10, 0).is_empty());
    }

    #[test]
    fn negative_dur_clamps_to_zero() {
        let s = Span::new(10, -5);
        assert_eq!(s.dur, 0);
    }

    #[test]
    fn contains_is_half_open() {
        let s = Span::new(10, 5);
        assert!(s.contains(10));
        assert!(s.contains(14));
        assert!(!s.contains(15));
    }

    #[test]
    fn overlap_detects_shared_instants() {
        let a = Span::new(0, 10);
        let b = Span::new(5, 10);
        let c = Span::new(10, 10);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // half-open: [0,10) vs [10,20)
    }

    #[test]
    fn empty_span_never_overlaps() {
        let a = Span::new(0, 0);
        let b = Span::new(0, 10);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn split_clamps_to_bounds() {
        let s = Span::new(10, 10);
        let (before, after) = s.split(5);
        assert_eq!(before, Span::new(10, 0));
        assert_eq!(after, Span::new(10, 10));
    }

    #[test]
    fn union_of_disjoint_spans_covers_gap() {
        let a = Span::new(0, 5);
        let b = Span::new(10, 5);
        assert_eq!(a.union(&b), Span::new(0, 15));
    }

    #[test]
    fn direction_round_trips_through_i8() {
        assert_eq!(Direction::from_i8(Direction::Forward.as_i8()), Some(Direction::Forward));
        assert_eq!(Direction::from_i8(Direction::Reverse.as_i8()), Some(Direction::Reverse));
        assert_eq!(Direction::from_i8(0), None);
    }
}
