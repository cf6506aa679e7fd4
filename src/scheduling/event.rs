use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::interval::TimeRange;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    schemars::JsonSchema,
)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Meeting,
    Call,
    TaskBlock,
    Personal,
    Reminder,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    /// Unique among active events when present; key for ingestion upserts.
    pub external_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub event_type: EventType,
    pub status: EventStatus,
    /// 0-10, higher wins when a conflict forces one event to move.
    pub priority: u8,
    pub travel_minutes: u32,
    pub prep_minutes: u32,
    /// Explicit permission for a meeting to sit inside a deep-work block.
    pub deep_work_override: bool,
}

impl CalendarEvent {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Cancelled events are kept for history but ignored by every computation.
    pub fn is_active(&self) -> bool {
        self.status != EventStatus::Cancelled
    }

    /// Timed, non-cancelled events are the ones that occupy the schedule.
    /// All-day events carry no concrete interval and stay out of interval math.
    pub fn blocks_time(&self) -> bool {
        self.is_active() && !self.all_day
    }
}
