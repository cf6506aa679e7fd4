use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;

use crate::error::EngineError;
use super::event::CalendarEvent;
use super::interval::{self, TimeRange};
use super::preferences::SchedulePreferences;

/// An open window a new event could occupy. Derived, never persisted.
/// `score`: +2 for a peak-hour start, -3 for intersecting a deep-work block,
/// +1 for being carved from an otherwise unused stretch of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: i32,
}

/// Compute candidate slots of exactly `duration_minutes` on `date`.
///
/// The day's work window minus the break window forms the base availability;
/// every event that blocks time is subtracted with the buffer padded on both
/// sides, so a returned slot never intersects an event and never violates the
/// buffer against a neighbor. Gaps are packed greedily left-to-right: a
/// 90-minute gap yields three 30-minute candidates, not one. Results are
/// sorted by score descending, then start ascending.
///
/// A request larger than the whole work window, or a day with no work hours,
/// yields an empty sequence rather than an error.
pub fn find_free_slots(
    date: NaiveDate,
    duration_minutes: u32,
    prefs: &SchedulePreferences,
    events: &[CalendarEvent],
) -> Result<Vec<FreeSlot>, EngineError> {
    prefs.validate()?;
    if duration_minutes == 0 {
        return Err(EngineError::InvalidInterval(
            "requested slot duration must be positive".to_string(),
        ));
    }
    let duration = TimeDelta::minutes(duration_minutes as i64);

    let base = prefs.availability(date);
    if base.is_empty() {
        return Ok(vec![]);
    }

    let buffer = prefs.buffer();
    let blocking: Vec<&CalendarEvent> = events.iter().filter(|e| e.blocks_time()).collect();
    let busy: Vec<TimeRange> = blocking
        .iter()
        .map(|e| TimeRange::new(e.start - buffer, e.end + buffer))
        .collect();

    let deep_work = prefs.deep_work_ranges(date);
    let mut slots = Vec::new();

    for gap in interval::subtract_ranges(&base, &busy) {
        if gap.duration() < duration {
            continue;
        }
        let isolated = gap_is_isolated(&gap, &blocking, buffer);

        let mut cursor = gap.start;
        while cursor + duration <= gap.end {
            let slot = TimeRange::new(cursor, cursor + duration);
            let mut score = 0;
            if prefs.is_peak_hour(slot.start) {
                score += 2;
            }
            if deep_work.iter().any(|d| d.overlaps(&slot)) {
                score -= 3;
            }
            if isolated {
                score += 1;
            }
            slots.push(FreeSlot {
                start: slot.start,
                end: slot.end,
                score,
            });
            cursor += duration;
        }
    }

    slots.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));
    Ok(slots)
}

/// A gap earns the quiet-stretch bonus when no event sits within twice the
/// buffer of either edge.
fn gap_is_isolated(gap: &TimeRange, events: &[&CalendarEvent], buffer: TimeDelta) -> bool {
    let fence = buffer * 2;
    !events.iter().any(|e| {
        (e.end <= gap.start && gap.start - e.end < fence)
            || (e.start >= gap.end && e.start - gap.end < fence)
    })
}
