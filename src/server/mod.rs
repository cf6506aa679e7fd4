mod conversions;
mod types;

pub(crate) use conversions::*;
pub(crate) use types::*;

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_router,
};
use tokio::sync::RwLock;

use crate::scheduling::EventRepository;
use crate::scheduling::conflict::detect_conflicts;
use crate::scheduling::event::EventId;
use crate::scheduling::optimizer::optimize_schedule;
use crate::scheduling::preferences::SchedulePreferences;
use crate::scheduling::reschedule::{suggest_reschedule, DEFAULT_HORIZON_DAYS};
use crate::scheduling::slots::find_free_slots;

#[derive(Debug, Default)]
struct EngineState {
    repository: EventRepository,
    preferences: SchedulePreferences,
}

#[derive(Clone)]
pub struct CadenceServer {
    state: Arc<RwLock<EngineState>>,
}

impl ServerHandler for CadenceServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "cadence".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Cadence is a calendar scheduling and conflict resolution engine. \
                 Recommended workflow: \
                 1) set_preferences with the user's work window, buffer, and deep-work blocks, \
                 2) load_events with the user's calendar (batches upsert on external_id), \
                 3) detect_conflicts or optimize_schedule to find problems, \
                 4) suggest_reschedule for an event that must move, then reschedule_event \
                 with the EXACT start/end of the chosen candidate. \
                 Empty results mean a clean schedule or no open slot, never an error."
                    .into(),
            ),
        }
    }
}

// -- Tool implementations --

#[tool_router]
impl CadenceServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::default())),
        }
    }

    // === Ingestion ===

    #[tool(description = "Load a batch of events, upserting by external_id: an active event with a matching external_id is updated in place, everything else is inserted. Malformed records are skipped and counted.")]
    async fn load_events(
        &self,
        params: Parameters<LoadEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.write().await;
        let mut ids = Vec::new();
        let mut skipped = 0;

        for input in &params.0.events {
            let id = input
                .external_id
                .as_deref()
                .and_then(|ext| state.repository.find_by_external_id(ext))
                .map(|existing| existing.id)
                .unwrap_or_else(EventId::new);

            let result = json_event_to_event(input, id)
                .and_then(|event| state.repository.upsert(event));
            match result {
                Ok(id) => ids.push(id.to_string()),
                Err(e) => {
                    tracing::warn!("Skipping event '{}': {e}", input.title);
                    skipped += 1;
                }
            }
        }

        Ok(json_text(&serde_json::json!({
            "events_loaded": ids.len(),
            "events_skipped": skipped,
            "event_ids": ids,
        })))
    }

    #[tool(description = "Add or replace a single event directly. Unlike load_events, validation errors are returned instead of skipped.")]
    async fn add_event(
        &self,
        params: Parameters<AddEventParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.write().await;
        let id = params
            .0
            .event
            .external_id
            .as_deref()
            .and_then(|ext| state.repository.find_by_external_id(ext))
            .map(|existing| existing.id)
            .unwrap_or_else(EventId::new);
        let event = json_event_to_event(&params.0.event, id).map_err(engine_err)?;
        let id = state.repository.upsert(event).map_err(engine_err)?;

        Ok(json_text(&serde_json::json!({
            "event_id": id.to_string(),
        })))
    }

    // === Mutations ===

    #[tool(description = "Cancel an event. This is a status change, not a deletion: the record stays for history and stops participating in every computation. Idempotent.")]
    async fn cancel_event(
        &self,
        params: Parameters<CancelEventParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_event_id(&params.0.event_id).map_err(engine_err)?;

        let mut state = self.state.write().await;
        state.repository.mark_cancelled(&id).map_err(engine_err)?;

        Ok(json_text(&serde_json::json!({ "cancelled": true })))
    }

    #[tool(description = "Move an event to a new interval (apply an accepted reschedule suggestion). Only the time fields change.")]
    async fn reschedule_event(
        &self,
        params: Parameters<RescheduleEventParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_event_id(&params.0.event_id).map_err(engine_err)?;
        let start = parse_datetime(&params.0.start).map_err(engine_err)?;
        let end = parse_datetime(&params.0.end).map_err(engine_err)?;

        let mut state = self.state.write().await;
        state
            .repository
            .reschedule(&id, start, end)
            .map_err(engine_err)?;

        Ok(json_text(&serde_json::json!({ "rescheduled": true })))
    }

    #[tool(description = "Remove all events. Preferences are NOT affected.")]
    async fn clear_events(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.write().await;
        state.repository.clear();

        Ok(json_text(&serde_json::json!({ "cleared": true })))
    }

    // === Preferences ===

    #[tool(description = "Set the scheduling preferences: work window, break, buffer minutes, daily meeting cap, peak hours, deep-work blocks. Validated before being stored.")]
    async fn set_preferences(
        &self,
        params: Parameters<SetPreferencesParams>,
    ) -> Result<CallToolResult, McpError> {
        let prefs = preferences_from_params(&params.0).map_err(engine_err)?;

        let mut state = self.state.write().await;
        state.preferences = prefs;

        Ok(json_text(&serde_json::json!({ "updated": true })))
    }

    #[tool(description = "Get the current scheduling preferences.")]
    async fn get_preferences(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.read().await;
        Ok(json_text(&state.preferences))
    }

    // === Queries ===

    #[tool(description = "List events intersecting a time range, sorted by start time. Includes cancelled events for history.")]
    async fn list_events(
        &self,
        params: Parameters<ListEventsParams>,
    ) -> Result<CallToolResult, McpError> {
        let start = parse_datetime(&params.0.start).map_err(engine_err)?;
        let end = parse_datetime(&params.0.end).map_err(engine_err)?;

        let state = self.state.read().await;
        let events = state
            .repository
            .events_in_range(start, end)
            .map_err(engine_err)?;

        Ok(json_text(&events))
    }

    #[tool(description = "Detect every conflict in a time range: overlaps, insufficient travel/preparation gaps, days over the meeting cap, and deep-work violations, each with a severity.")]
    async fn detect_conflicts(
        &self,
        params: Parameters<DetectConflictsParams>,
    ) -> Result<CallToolResult, McpError> {
        let start = parse_datetime(&params.0.start).map_err(engine_err)?;
        let end = parse_datetime(&params.0.end).map_err(engine_err)?;

        let state = self.state.read().await;
        let events = state
            .repository
            .events_in_range(start, end)
            .map_err(engine_err)?;
        let conflicts = detect_conflicts(&events, &state.preferences).map_err(engine_err)?;

        Ok(json_text(&conflicts))
    }

    #[tool(description = "Find open slots of exactly the requested duration on a date, consistent with the work window, break, buffer, and existing events. Sorted by preference-fit score, best first.")]
    async fn find_free_slots(
        &self,
        params: Parameters<FindFreeSlotsParams>,
    ) -> Result<CallToolResult, McpError> {
        let date = parse_date(&params.0.date).map_err(engine_err)?;

        let state = self.state.read().await;
        let events = state.repository.snapshot();
        let slots = find_free_slots(date, params.0.duration_minutes, &state.preferences, &events)
            .map_err(engine_err)?;

        Ok(json_text(&slots))
    }

    #[tool(description = "Rank replacement slots for one event across a forward horizon, best first. An empty list means no open slot in the horizon; widen it or handle manually.")]
    async fn suggest_reschedule(
        &self,
        params: Parameters<SuggestRescheduleParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_event_id(&params.0.event_id).map_err(engine_err)?;
        let horizon = params.0.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);

        let state = self.state.read().await;
        let events = state.repository.snapshot();
        let candidates =
            suggest_reschedule(id, &events, &state.preferences, horizon).map_err(engine_err)?;

        Ok(json_text(&candidates))
    }

    #[tool(description = "Evaluate a date range and produce a prioritized adjustment list: a reschedule suggestion per conflict (worst first) plus capacity warnings for days exactly at the meeting cap.")]
    async fn optimize_schedule(
        &self,
        params: Parameters<OptimizeScheduleParams>,
    ) -> Result<CallToolResult, McpError> {
        let start_date = parse_date(&params.0.start_date).map_err(engine_err)?;
        let end_date = parse_date(&params.0.end_date).map_err(engine_err)?;

        let state = self.state.read().await;
        let events = state.repository.snapshot();
        let suggestions = optimize_schedule(start_date, end_date, &events, &state.preferences)
            .map_err(engine_err)?;

        Ok(json_text(&suggestions))
    }
}

impl CadenceServer {
    pub fn into_router(self) -> rmcp::handler::server::router::Router<Self> {
        let mut router = rmcp::handler::server::router::Router::new(self);
        router.tool_router = Self::tool_router();
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::event::{CalendarEvent, EventStatus, EventType};
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn event(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: EventId::new(),
            external_id: None,
            title: title.to_string(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            event_type: EventType::Meeting,
            status: EventStatus::Confirmed,
            priority: 5,
            travel_minutes: 0,
            prep_minutes: 0,
            deep_work_override: false,
        }
    }

    fn input(title: &str, external_id: Option<&str>, start: &str, end: &str) -> JsonEventInput {
        JsonEventInput {
            title: title.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            external_id: external_id.map(str::to_string),
            description: None,
            location: None,
            all_day: None,
            event_type: None,
            status: None,
            priority: None,
            travel_minutes: None,
            preparation_minutes: None,
            deep_work_override: None,
        }
    }

    #[tokio::test]
    async fn load_events_upserts_on_external_id() {
        let server = CadenceServer::new();

        server
            .load_events(Parameters(LoadEventsParams {
                events: vec![input(
                    "Original",
                    Some("src-1"),
                    "2025-06-02T09:00:00Z",
                    "2025-06-02T10:00:00Z",
                )],
            }))
            .await
            .unwrap();

        // Same external id again: update in place, not a duplicate.
        server
            .load_events(Parameters(LoadEventsParams {
                events: vec![input(
                    "Renamed",
                    Some("src-1"),
                    "2025-06-02T11:00:00Z",
                    "2025-06-02T12:00:00Z",
                )],
            }))
            .await
            .unwrap();

        let state = server.state.read().await;
        assert_eq!(state.repository.len(), 1);
        let stored = state.repository.find_by_external_id("src-1").unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.start, utc(2, 11));
    }

    #[tokio::test]
    async fn load_events_skips_malformed_records() {
        let server = CadenceServer::new();
        let result = server
            .load_events(Parameters(LoadEventsParams {
                events: vec![
                    input("Good", None, "2025-06-02T09:00:00Z", "2025-06-02T10:00:00Z"),
                    input("Inverted", None, "2025-06-02T10:00:00Z", "2025-06-02T09:00:00Z"),
                ],
            }))
            .await;
        assert!(result.is_ok());

        let state = server.state.read().await;
        assert_eq!(state.repository.len(), 1);
    }

    #[tokio::test]
    async fn cancel_then_detect_sees_no_conflicts() {
        let server = CadenceServer::new();
        let id = {
            let mut state = server.state.write().await;
            state
                .repository
                .upsert(event("A", utc(2, 9), utc(2, 10)))
                .unwrap();
            state
                .repository
                .upsert(event("B", utc(2, 9), utc(2, 10)))
                .unwrap()
        };

        server
            .cancel_event(Parameters(CancelEventParams {
                event_id: id.to_string(),
            }))
            .await
            .unwrap();

        let state = server.state.read().await;
        let events = state.repository.events_in_range(utc(2, 0), utc(3, 0)).unwrap();
        let conflicts = detect_conflicts(&events, &state.preferences).unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn list_events_rejects_inverted_range() {
        let server = CadenceServer::new();
        let err = server
            .list_events(Parameters(ListEventsParams {
                start: "2025-06-03T00:00:00Z".to_string(),
                end: "2025-06-02T00:00:00Z".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn reschedule_unknown_event_is_not_found() {
        let server = CadenceServer::new();
        let err = server
            .reschedule_event(Parameters(RescheduleEventParams {
                event_id: EventId::new().to_string(),
                start: "2025-06-02T09:00:00Z".to_string(),
                end: "2025-06-02T10:00:00Z".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn set_preferences_rejects_inverted_work_window() {
        let server = CadenceServer::new();
        let err = server
            .set_preferences(Parameters(SetPreferencesParams {
                timezone: None,
                work_start: "17:00".to_string(),
                work_end: "09:00".to_string(),
                break_start: None,
                break_end: None,
                buffer_minutes: None,
                max_meetings_per_day: None,
                peak_hours: None,
                deep_work_blocks: None,
                gap_tie_precedence: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
