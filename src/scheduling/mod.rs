pub mod conflict;
pub mod event;
pub mod interval;
pub mod optimizer;
pub mod preferences;
pub mod reschedule;
pub mod slots;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use event::{CalendarEvent, EventId, EventStatus, MAX_PRIORITY};
use interval::TimeRange;

/// Owner of all `CalendarEvent` records. Every query hands out owned copies,
/// so a snapshot taken by one caller is never mutated under it by a later
/// upsert or cancellation; the engine functions operate on those snapshots.
#[derive(Debug, Default)]
pub struct EventRepository {
    events: HashMap<EventId, CalendarEvent>,
}

impl EventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event. Rejects `end <= start`, out-of-range
    /// priority, and an `external_id` already carried by a different active
    /// event.
    pub fn upsert(&mut self, event: CalendarEvent) -> Result<EventId, EngineError> {
        if event.end <= event.start {
            return Err(EngineError::InvalidInterval(format!(
                "event '{}' ends ({}) at or before its start ({})",
                event.title, event.end, event.start
            )));
        }
        if event.priority > MAX_PRIORITY {
            return Err(EngineError::InvalidInput(format!(
                "priority {} exceeds the maximum of {MAX_PRIORITY}",
                event.priority
            )));
        }
        if let Some(external_id) = &event.external_id {
            let taken = self.events.values().any(|existing| {
                existing.id != event.id
                    && existing.is_active()
                    && existing.external_id.as_deref() == Some(external_id)
            });
            if taken {
                return Err(EngineError::DuplicateExternalId(external_id.clone()));
            }
        }

        let id = event.id;
        self.events.insert(id, event);
        Ok(id)
    }

    pub fn get(&self, id: &EventId) -> Option<&CalendarEvent> {
        self.events.get(id)
    }

    /// The active event carrying an external-source id, if any. Ingestion
    /// batches are keyed on this: a match means update, not insert.
    pub fn find_by_external_id(&self, external_id: &str) -> Option<&CalendarEvent> {
        self.events
            .values()
            .find(|e| e.is_active() && e.external_id.as_deref() == Some(external_id))
    }

    /// Soft removal: a status flip that preserves conflict history. Repeating
    /// it is a no-op.
    pub fn mark_cancelled(&mut self, id: &EventId) -> Result<(), EngineError> {
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| EngineError::EventNotFound(id.to_string()))?;
        event.status = EventStatus::Cancelled;
        Ok(())
    }

    /// Apply an accepted reschedule suggestion. Time fields only.
    pub fn reschedule(
        &mut self,
        id: &EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if end <= start {
            return Err(EngineError::InvalidInterval(format!(
                "new end ({end}) is at or before new start ({start})"
            )));
        }
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| EngineError::EventNotFound(id.to_string()))?;
        event.start = start;
        event.end = end;
        Ok(())
    }

    /// Events intersecting `[start, end)`, ascending by start time (ids break
    /// ties). Owned and restartable. Rejects `end <= start` like `upsert`.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, EngineError> {
        if end <= start {
            return Err(EngineError::InvalidInterval(format!(
                "query end ({end}) is at or before query start ({start})"
            )));
        }
        let query = TimeRange::new(start, end);
        let mut matched: Vec<CalendarEvent> = self
            .events
            .values()
            .filter(|e| e.range().overlaps(&query))
            .cloned()
            .collect();
        matched.sort_by_key(|e| (e.start, e.id));
        Ok(matched)
    }

    /// Every event, ascending by start time.
    pub fn snapshot(&self) -> Vec<CalendarEvent> {
        let mut all: Vec<CalendarEvent> = self.events.values().cloned().collect();
        all.sort_by_key(|e| (e.start, e.id));
        all
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
