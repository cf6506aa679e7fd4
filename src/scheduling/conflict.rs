use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::error::EngineError;
use super::event::{CalendarEvent, EventId, EventStatus, EventType};
use super::preferences::{GapTiePrecedence, SchedulePreferences};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Overlap,
    TravelTime,
    PreparationTime,
    CapacityExceeded,
    DeepWorkViolation,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected incompatibility. Pairwise kinds carry both event ids with the
/// pair normalized (earlier start, then smaller id, first) so each unordered
/// pair appears exactly once. `minutes` is the overlap length for `Overlap`,
/// the gap shortfall for the gap kinds, and the intruded duration for
/// `DeepWorkViolation`; zero for `CapacityExceeded`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, schemars::JsonSchema,
)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub event_a: EventId,
    pub event_b: Option<EventId>,
    pub day: Option<NaiveDate>,
    pub minutes: i64,
}

/// Severity of an overlap between two events, per priorities and the share of
/// the shorter event that is covered.
pub(crate) fn overlap_severity(
    priority_a: u8,
    duration_a: TimeDelta,
    priority_b: u8,
    duration_b: TimeDelta,
    overlap: TimeDelta,
) -> Severity {
    let shorter = duration_a.min(duration_b);
    if priority_a >= 8 || priority_b >= 8 || overlap * 2 >= shorter {
        Severity::Critical
    } else if overlap * 4 >= shorter {
        Severity::High
    } else if overlap < TimeDelta::minutes(5) {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// Detect every conflict in the event set. Deterministic and
/// order-independent: the result is a set, and internal traversal order never
/// shows through.
pub fn detect_conflicts(
    events: &[CalendarEvent],
    prefs: &SchedulePreferences,
) -> Result<BTreeSet<Conflict>, EngineError> {
    prefs.validate()?;

    let mut timed: Vec<&CalendarEvent> = events.iter().filter(|e| e.blocks_time()).collect();
    timed.sort_by_key(|e| (e.start, e.id));

    let mut conflicts = BTreeSet::new();
    let overlapping_pairs = sweep_overlaps(&timed, &mut conflicts);
    detect_gap_conflicts(&timed, prefs, &overlapping_pairs, &mut conflicts);
    detect_capacity_conflicts(&timed, prefs, &mut conflicts);
    detect_deep_work_violations(&timed, prefs, &mut conflicts);

    Ok(conflicts)
}

/// Sweep sorted events with a min-heap of open intervals keyed by end time.
/// Every event still open when a new one starts necessarily intersects it.
/// Returns the set of normalized overlapping pairs so the gap pass can skip
/// them.
fn sweep_overlaps(
    sorted: &[&CalendarEvent],
    conflicts: &mut BTreeSet<Conflict>,
) -> HashSet<(EventId, EventId)> {
    let mut pairs = HashSet::new();
    let mut open: BinaryHeap<Reverse<(DateTime<Utc>, usize)>> = BinaryHeap::new();

    for (i, event) in sorted.iter().enumerate() {
        while let Some(Reverse((end, _))) = open.peek() {
            if *end <= event.start {
                open.pop();
            } else {
                break;
            }
        }

        for &Reverse((_, j)) in open.iter() {
            let other = sorted[j];
            let overlap = event.range().overlap_duration(&other.range());
            debug_assert!(overlap > TimeDelta::zero());

            let (a, b) = normalize_pair(other, event);
            pairs.insert((a, b));
            conflicts.insert(Conflict {
                kind: ConflictKind::Overlap,
                severity: overlap_severity(
                    event.priority,
                    event.duration(),
                    other.priority,
                    other.duration(),
                    overlap,
                ),
                event_a: a,
                event_b: Some(b),
                day: None,
                minutes: overlap.num_minutes(),
            });
        }

        open.push(Reverse((event.end, i)));
    }

    pairs
}

fn normalize_pair(x: &CalendarEvent, y: &CalendarEvent) -> (EventId, EventId) {
    if (x.start, x.id) <= (y.start, y.id) {
        (x.id, y.id)
    } else {
        (y.id, x.id)
    }
}

/// Consecutive same-day pairs whose gap is too small for the buffer, the later
/// event's travel time, or its preparation time.
fn detect_gap_conflicts(
    sorted: &[&CalendarEvent],
    prefs: &SchedulePreferences,
    overlapping_pairs: &HashSet<(EventId, EventId)>,
    conflicts: &mut BTreeSet<Conflict>,
) {
    for pair in sorted.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if prefs.local_date(earlier.start) != prefs.local_date(later.start) {
            continue;
        }
        if overlapping_pairs.contains(&normalize_pair(earlier, later)) {
            continue;
        }

        let gap = later.start - earlier.end;
        if gap < TimeDelta::zero() {
            // Overlaps with a third event in between can leave a negative gap
            // between non-overlapping neighbors in start order; not a gap issue.
            continue;
        }
        let required = TimeDelta::minutes(
            prefs
                .buffer_minutes
                .max(later.travel_minutes)
                .max(later.prep_minutes) as i64,
        );
        if gap >= required {
            continue;
        }

        let kind = match later.travel_minutes.cmp(&later.prep_minutes) {
            std::cmp::Ordering::Greater => ConflictKind::TravelTime,
            std::cmp::Ordering::Less => ConflictKind::PreparationTime,
            std::cmp::Ordering::Equal => match prefs.gap_tie_precedence {
                GapTiePrecedence::Travel => ConflictKind::TravelTime,
                GapTiePrecedence::Preparation => ConflictKind::PreparationTime,
            },
        };
        let (a, b) = normalize_pair(earlier, later);
        conflicts.insert(Conflict {
            kind,
            severity: Severity::Medium,
            event_a: a,
            event_b: Some(b),
            day: None,
            minutes: (required - gap).num_minutes(),
        });
    }
}

/// One conflict per day whose confirmed-event count exceeds the cap,
/// referencing the event that should move: lowest priority, ties broken by
/// latest start (prefer displacing the most recently slotted item).
fn detect_capacity_conflicts(
    sorted: &[&CalendarEvent],
    prefs: &SchedulePreferences,
    conflicts: &mut BTreeSet<Conflict>,
) {
    let days: BTreeSet<NaiveDate> = sorted.iter().map(|e| prefs.local_date(e.start)).collect();

    for day in days {
        let confirmed: Vec<&&CalendarEvent> = sorted
            .iter()
            .filter(|e| e.status == EventStatus::Confirmed && prefs.local_date(e.start) == day)
            .collect();
        if confirmed.len() <= prefs.max_meetings_per_day as usize {
            continue;
        }

        let target = confirmed
            .iter()
            .min_by_key(|e| (e.priority, Reverse(e.start), Reverse(e.id)))
            .expect("non-empty by the count check");
        conflicts.insert(Conflict {
            kind: ConflictKind::CapacityExceeded,
            severity: Severity::Medium,
            event_a: target.id,
            event_b: None,
            day: Some(day),
            minutes: 0,
        });
    }
}

/// Confirmed meetings intruding on a deep-work block without the explicit
/// override flag.
fn detect_deep_work_violations(
    sorted: &[&CalendarEvent],
    prefs: &SchedulePreferences,
    conflicts: &mut BTreeSet<Conflict>,
) {
    // Both endpoints: an event spanning midnight can intrude on a next-day
    // block even when nothing starts that day.
    let days: BTreeSet<NaiveDate> = sorted
        .iter()
        .flat_map(|e| [prefs.local_date(e.start), prefs.local_date(e.end)])
        .collect();

    for day in days {
        for block in prefs.deep_work_ranges(day) {
            for event in sorted {
                if event.event_type != EventType::Meeting
                    || event.status != EventStatus::Confirmed
                    || event.deep_work_override
                {
                    continue;
                }
                let intrusion = event.range().overlap_duration(&block);
                if intrusion > TimeDelta::zero() {
                    conflicts.insert(Conflict {
                        kind: ConflictKind::DeepWorkViolation,
                        severity: Severity::Medium,
                        event_a: event.id,
                        event_b: None,
                        day: Some(day),
                        minutes: intrusion.num_minutes(),
                    });
                }
            }
        }
    }
}
