use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "TimeRange start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Half-open interval overlap: [start, end)
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn overlap_duration(&self, other: &TimeRange) -> TimeDelta {
        let overlap_start = self.start.max(other.start);
        let overlap_end = self.end.min(other.end);
        if overlap_start < overlap_end {
            overlap_end - overlap_start
        } else {
            TimeDelta::zero()
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Merge overlapping time ranges into non-overlapping sorted ranges.
pub fn merge_ranges(ranges: &[TimeRange]) -> Vec<TimeRange> {
    if ranges.is_empty() {
        return vec![];
    }
    let mut sorted: Vec<TimeRange> = ranges.to_vec();
    sorted.sort_by_key(|r| r.start);

    let mut merged: Vec<TimeRange> = vec![sorted[0]];
    for r in &sorted[1..] {
        let last = merged.last_mut().unwrap();
        if r.start <= last.end {
            last.end = last.end.max(r.end);
        } else {
            merged.push(*r);
        }
    }
    merged
}

/// Subtract `busy` ranges from `base` segments, yielding the remaining gaps
/// in ascending order. Busy ranges may overlap each other and the segment
/// boundaries; segments must themselves be disjoint and sorted.
pub fn subtract_ranges(base: &[TimeRange], busy: &[TimeRange]) -> Vec<TimeRange> {
    let merged = merge_ranges(busy);
    let mut gaps = Vec::new();

    for segment in base {
        let mut cursor = segment.start;
        for b in &merged {
            if b.end <= cursor {
                continue;
            }
            if b.start >= segment.end {
                break;
            }
            if b.start > cursor {
                gaps.push(TimeRange::new(cursor, b.start.min(segment.end)));
            }
            cursor = cursor.max(b.end);
            if cursor >= segment.end {
                break;
            }
        }
        if cursor < segment.end {
            gaps.push(TimeRange::new(cursor, segment.end));
        }
    }

    gaps
}
