use schemars::JsonSchema;
use serde::Deserialize;

use crate::scheduling::event::{EventStatus, EventType};

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct JsonEventInput {
    #[schemars(description = "Event title")]
    pub(crate) title: String,
    #[schemars(description = "Start time (ISO 8601, e.g. '2025-01-15T09:00:00Z')")]
    pub(crate) start: String,
    #[schemars(description = "End time (ISO 8601)")]
    pub(crate) end: String,
    #[schemars(description = "External-source id. Unique among active events; batch loads upsert on it.")]
    pub(crate) external_id: Option<String>,
    #[schemars(description = "Event description")]
    pub(crate) description: Option<String>,
    #[schemars(description = "Event location")]
    pub(crate) location: Option<String>,
    #[schemars(description = "All-day flag. All-day events do not occupy clock time. Defaults to false.")]
    pub(crate) all_day: Option<bool>,
    #[schemars(description = "Event type: meeting, call, task_block, personal, reminder. Defaults to meeting.")]
    pub(crate) event_type: Option<EventType>,
    #[schemars(description = "Status: confirmed, tentative, cancelled. Defaults to confirmed.")]
    pub(crate) status: Option<EventStatus>,
    #[schemars(description = "Priority 0-10; 8+ makes any overlap critical. Defaults to 5.")]
    pub(crate) priority: Option<u8>,
    #[schemars(description = "Travel minutes required before this event. Defaults to 0.")]
    pub(crate) travel_minutes: Option<u32>,
    #[schemars(description = "Preparation minutes required before this event. Defaults to 0.")]
    pub(crate) preparation_minutes: Option<u32>,
    #[schemars(description = "Allow this meeting inside a deep-work block. Defaults to false.")]
    pub(crate) deep_work_override: Option<bool>,
}

// -- Tool parameter structs --

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct LoadEventsParams {
    #[schemars(description = "Batch of events to upsert, keyed by external_id when present")]
    pub(crate) events: Vec<JsonEventInput>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct AddEventParams {
    #[serde(flatten)]
    pub(crate) event: JsonEventInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct CancelEventParams {
    #[schemars(description = "The event ID to cancel (soft removal; history is kept)")]
    pub(crate) event_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct RescheduleEventParams {
    #[schemars(description = "The event ID to move")]
    pub(crate) event_id: String,
    #[schemars(description = "New start time (ISO 8601); use a value returned by suggest_reschedule")]
    pub(crate) start: String,
    #[schemars(description = "New end time (ISO 8601)")]
    pub(crate) end: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct ListEventsParams {
    #[schemars(description = "Start of time range (ISO 8601)")]
    pub(crate) start: String,
    #[schemars(description = "End of time range (ISO 8601)")]
    pub(crate) end: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct DetectConflictsParams {
    #[schemars(description = "Start of time range (ISO 8601)")]
    pub(crate) start: String,
    #[schemars(description = "End of time range (ISO 8601)")]
    pub(crate) end: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct FindFreeSlotsParams {
    #[schemars(description = "Date to search (YYYY-MM-DD, interpreted in the preference timezone)")]
    pub(crate) date: String,
    #[schemars(description = "Required slot duration in minutes")]
    pub(crate) duration_minutes: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SuggestRescheduleParams {
    #[schemars(description = "The event ID to find a new placement for")]
    pub(crate) event_id: String,
    #[schemars(description = "Days to search forward from the event's own date. Defaults to 7.")]
    pub(crate) horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct OptimizeScheduleParams {
    #[schemars(description = "First date of the range (YYYY-MM-DD)")]
    pub(crate) start_date: String,
    #[schemars(description = "Last date of the range (YYYY-MM-DD, inclusive)")]
    pub(crate) end_date: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct DeepWorkBlockInput {
    #[schemars(description = "Day of week (e.g. 'mon', 'tuesday')")]
    pub(crate) weekday: String,
    #[schemars(description = "Block start time of day (HH:MM)")]
    pub(crate) start: String,
    #[schemars(description = "Block end time of day (HH:MM)")]
    pub(crate) end: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SetPreferencesParams {
    #[schemars(description = "IANA timezone for all time-of-day fields (e.g. 'America/New_York'). Defaults to 'UTC'.")]
    pub(crate) timezone: Option<String>,
    #[schemars(description = "Daily work window start (HH:MM)")]
    pub(crate) work_start: String,
    #[schemars(description = "Daily work window end (HH:MM)")]
    pub(crate) work_end: String,
    #[schemars(description = "Daily break start (HH:MM); requires break_end")]
    pub(crate) break_start: Option<String>,
    #[schemars(description = "Daily break end (HH:MM); requires break_start")]
    pub(crate) break_end: Option<String>,
    #[schemars(description = "Minimum minutes between consecutive events. Defaults to 0.")]
    pub(crate) buffer_minutes: Option<u32>,
    #[schemars(description = "Maximum confirmed events per day. Defaults to 8.")]
    pub(crate) max_meetings_per_day: Option<u32>,
    #[schemars(description = "Hours of day (0-23) preferred for important events")]
    pub(crate) peak_hours: Option<Vec<u32>>,
    #[schemars(description = "Recurring meeting-free blocks")]
    pub(crate) deep_work_blocks: Option<Vec<DeepWorkBlockInput>>,
    #[schemars(description = "Conflict kind on an exact travel/preparation tie: 'travel' or 'preparation'. Defaults to travel.")]
    pub(crate) gap_tie_precedence: Option<String>,
}
