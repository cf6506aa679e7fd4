use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::EngineError;
use super::conflict::{overlap_severity, Severity};
use super::event::{CalendarEvent, EventId};
use super::interval::TimeRange;
use super::preferences::SchedulePreferences;
use super::slots::{find_free_slots, FreeSlot};

pub const DEFAULT_HORIZON_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct RescheduleCandidate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: i32,
}

/// Rank replacement slots for one event, best first.
///
/// Runs the Free-Slot Finder once per day across the horizon, starting at the
/// event's own local date, with the moving event excluded from the busy set.
/// The event's unchanged original interval is never proposed, and any slot
/// that would reintroduce a critical conflict with a different event is
/// dropped. Ordering: slot score descending, then minimal displacement from
/// the original start, then start ascending. An exhausted horizon yields an
/// empty sequence, not an error; widening the horizon or escalating is the
/// caller's call.
pub fn suggest_reschedule(
    event_id: EventId,
    events: &[CalendarEvent],
    prefs: &SchedulePreferences,
    horizon_days: u32,
) -> Result<Vec<RescheduleCandidate>, EngineError> {
    prefs.validate()?;
    let event = events
        .iter()
        .find(|e| e.id == event_id)
        .ok_or_else(|| EngineError::EventNotFound(event_id.to_string()))?;

    let duration_seconds = event.duration().num_seconds();
    if duration_seconds <= 0 {
        return Err(EngineError::InvalidInterval(format!(
            "event {event_id} has a non-positive duration"
        )));
    }
    // Round up so a proposed slot always holds the whole event.
    let duration_minutes = ((duration_seconds + 59) / 60) as u32;

    let others: Vec<CalendarEvent> = events
        .iter()
        .filter(|e| e.id != event_id)
        .cloned()
        .collect();
    let start_date = prefs.local_date(event.start);

    // Each day's search is independent; evaluating them in order keeps the
    // merge deterministic without any fan-out machinery.
    let mut ranked: Vec<(FreeSlot, TimeDelta)> = Vec::new();
    for offset in 0..horizon_days as i64 {
        let date = start_date + TimeDelta::days(offset);
        for slot in find_free_slots(date, duration_minutes, prefs, &others)? {
            if slot.start == event.start && slot.end == event.end {
                continue;
            }
            if reintroduces_critical(event, &slot, &others) {
                continue;
            }
            ranked.push((slot, (slot.start - event.start).abs()));
        }
    }

    ranked.sort_by(|(a, da), (b, db)| {
        b.score
            .cmp(&a.score)
            .then(da.cmp(db))
            .then(a.start.cmp(&b.start))
    });

    Ok(ranked
        .into_iter()
        .map(|(s, _)| RescheduleCandidate {
            start: s.start,
            end: s.end,
            score: s.score,
        })
        .collect())
}

/// Would placing `event` at `slot` create a critical overlap with anyone else?
/// Slot carving already avoids every blocking interval, so this only fires
/// when callers feed a busy set narrower than the full schedule.
fn reintroduces_critical(event: &CalendarEvent, slot: &FreeSlot, others: &[CalendarEvent]) -> bool {
    let placed = TimeRange::new(slot.start, slot.end);
    others.iter().filter(|o| o.blocks_time()).any(|o| {
        let overlap = placed.overlap_duration(&o.range());
        overlap > TimeDelta::zero()
            && overlap_severity(
                event.priority,
                placed.duration(),
                o.priority,
                o.duration(),
                overlap,
            ) == Severity::Critical
    })
}
