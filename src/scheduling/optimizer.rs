use std::cmp::Reverse;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::EngineError;
use super::conflict::{detect_conflicts, Conflict, ConflictKind};
use super::event::{CalendarEvent, EventId, EventStatus};
use super::preferences::SchedulePreferences;
use super::reschedule::{suggest_reschedule, DEFAULT_HORIZON_DAYS};

#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SuggestionAction {
    /// Move the target event to the advisor's best candidate.
    Reschedule {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        score: i32,
    },
    /// No open slot in the horizon; the caller decides whether to widen the
    /// search or escalate.
    ReviewManually,
}

#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    ResolveConflict {
        conflict: Conflict,
        event_id: EventId,
        action: SuggestionAction,
    },
    /// Informational: the day sits exactly at the meeting cap. Not a conflict.
    CapacityWarning {
        day: NaiveDate,
        confirmed_events: usize,
        max_meetings_per_day: u32,
    },
}

/// Evaluate a date range (inclusive) against the preferences and produce a
/// prioritized adjustment list: one suggestion per detected conflict, ordered
/// by severity descending then best-candidate score descending, followed by
/// capacity warnings for days that are exactly full.
///
/// Pure over its inputs; the whole result materializes before returning, so an
/// abandoned call never leaks partial output.
pub fn optimize_schedule(
    range_start: NaiveDate,
    range_end: NaiveDate,
    events: &[CalendarEvent],
    prefs: &SchedulePreferences,
) -> Result<Vec<Suggestion>, EngineError> {
    prefs.validate()?;
    if range_end < range_start {
        return Err(EngineError::InvalidInterval(format!(
            "date range end ({range_end}) precedes start ({range_start})"
        )));
    }

    let in_range: Vec<CalendarEvent> = events
        .iter()
        .filter(|e| {
            let day = prefs.local_date(e.start);
            day >= range_start && day <= range_end
        })
        .cloned()
        .collect();

    let conflicts = detect_conflicts(&in_range, prefs)?;

    let mut resolutions: Vec<(Conflict, EventId, SuggestionAction, i32)> = Vec::new();
    for conflict in conflicts {
        let Some(target) = reschedule_target(&conflict, &in_range) else {
            continue;
        };
        // The advisor sees the full schedule: its horizon can run past
        // range_end, and events out there still constrain candidate slots.
        let candidates = suggest_reschedule(target, events, prefs, DEFAULT_HORIZON_DAYS)?;
        let (action, top_score) = match candidates.first() {
            Some(c) => (
                SuggestionAction::Reschedule {
                    start: c.start,
                    end: c.end,
                    score: c.score,
                },
                c.score,
            ),
            None => (SuggestionAction::ReviewManually, i32::MIN),
        };
        resolutions.push((conflict, target, action, top_score));
    }

    resolutions.sort_by(|a, b| {
        b.0.severity
            .cmp(&a.0.severity)
            .then(b.3.cmp(&a.3))
            .then(a.0.cmp(&b.0))
    });

    let mut suggestions: Vec<Suggestion> = resolutions
        .into_iter()
        .map(|(conflict, event_id, action, _)| Suggestion::ResolveConflict {
            conflict,
            event_id,
            action,
        })
        .collect();

    suggestions.extend(capacity_warnings(range_start, range_end, &in_range, prefs));
    Ok(suggestions)
}

/// Which event a conflict asks to move: the lower-priority side of a pairwise
/// conflict (ties broken by latest start, then largest id), or the event the
/// detector already flagged.
fn reschedule_target(conflict: &Conflict, events: &[CalendarEvent]) -> Option<EventId> {
    match conflict.kind {
        ConflictKind::Overlap | ConflictKind::TravelTime | ConflictKind::PreparationTime => {
            let b_id = conflict.event_b?;
            let a = events.iter().find(|e| e.id == conflict.event_a)?;
            let b = events.iter().find(|e| e.id == b_id)?;
            [a, b]
                .into_iter()
                .min_by_key(|e| (e.priority, Reverse(e.start), Reverse(e.id)))
                .map(|e| e.id)
        }
        ConflictKind::CapacityExceeded | ConflictKind::DeepWorkViolation => Some(conflict.event_a),
    }
}

/// Days whose confirmed-event count sits exactly at the cap. Days over the cap
/// already surfaced as `capacity_exceeded` conflicts.
fn capacity_warnings(
    range_start: NaiveDate,
    range_end: NaiveDate,
    events: &[CalendarEvent],
    prefs: &SchedulePreferences,
) -> Vec<Suggestion> {
    let mut warnings = Vec::new();
    let mut day = range_start;
    loop {
        let confirmed = events
            .iter()
            .filter(|e| {
                e.status == EventStatus::Confirmed
                    && !e.all_day
                    && prefs.local_date(e.start) == day
            })
            .count();
        if confirmed > 0 && confirmed == prefs.max_meetings_per_day as usize {
            warnings.push(Suggestion::CapacityWarning {
                day,
                confirmed_events: confirmed,
                max_meetings_per_day: prefs.max_meetings_per_day,
            });
        }
        if day >= range_end {
            break;
        }
        let Some(next) = day.succ_opt() else { break };
        day = next;
    }
    warnings
}
