use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use rmcp::{ErrorData as McpError, model::*};
use serde::Serialize;

use crate::error::EngineError;
use crate::scheduling::event::{CalendarEvent, EventId, EventStatus, EventType};
use crate::scheduling::preferences::{
    DeepWorkBlock, GapTiePrecedence, SchedulePreferences, TimeOfDayWindow,
};
use super::types::{DeepWorkBlockInput, JsonEventInput, SetPreferencesParams};

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, EngineError> {
    // Try RFC 3339 first (with timezone offset)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Try without timezone (assume UTC)
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(EngineError::InvalidInput(format!(
        "Cannot parse datetime: '{s}'. Use ISO 8601 format."
    )))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidInput(format!("Cannot parse date: '{s}'. Use YYYY-MM-DD.")))
}

pub(crate) fn parse_time_of_day(s: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| EngineError::InvalidInput(format!("Cannot parse time of day: '{s}'. Use HH:MM.")))
}

pub(crate) fn parse_event_id(s: &str) -> Result<EventId, EngineError> {
    uuid::Uuid::parse_str(s)
        .map(EventId)
        .map_err(|e| EngineError::InvalidInput(format!("Invalid event ID: {e}")))
}

fn parse_weekday(s: &str) -> Result<Weekday, EngineError> {
    s.parse::<Weekday>()
        .map_err(|_| EngineError::InvalidInput(format!("Invalid weekday: '{s}'")))
}

fn parse_timezone(s: &str) -> Result<Tz, EngineError> {
    s.parse::<Tz>()
        .map_err(|_| EngineError::InvalidInput(format!("Unknown IANA timezone: '{s}'")))
}

/// Build a domain event from wire input. `id` is the internal id to use: the
/// id of the active event already carrying the same external id (update), or
/// a fresh one (insert). Interval and priority validation happens in the
/// repository.
pub(crate) fn json_event_to_event(
    input: &JsonEventInput,
    id: EventId,
) -> Result<CalendarEvent, EngineError> {
    Ok(CalendarEvent {
        id,
        external_id: input.external_id.clone(),
        title: input.title.clone(),
        description: input.description.clone(),
        location: input.location.clone(),
        start: parse_datetime(&input.start)?,
        end: parse_datetime(&input.end)?,
        all_day: input.all_day.unwrap_or(false),
        event_type: input.event_type.unwrap_or(EventType::Meeting),
        status: input.status.unwrap_or(EventStatus::Confirmed),
        priority: input.priority.unwrap_or(5),
        travel_minutes: input.travel_minutes.unwrap_or(0),
        prep_minutes: input.preparation_minutes.unwrap_or(0),
        deep_work_override: input.deep_work_override.unwrap_or(false),
    })
}

fn deep_work_block(input: &DeepWorkBlockInput) -> Result<DeepWorkBlock, EngineError> {
    Ok(DeepWorkBlock {
        weekday: parse_weekday(&input.weekday)?,
        start: parse_time_of_day(&input.start)?,
        end: parse_time_of_day(&input.end)?,
    })
}

/// Parse and validate a full preference record; the result is stored only if
/// it passes `SchedulePreferences::validate`.
pub(crate) fn preferences_from_params(
    params: &SetPreferencesParams,
) -> Result<SchedulePreferences, EngineError> {
    let break_window = match (&params.break_start, &params.break_end) {
        (Some(start), Some(end)) => Some(TimeOfDayWindow {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        }),
        (None, None) => None,
        _ => {
            return Err(EngineError::InvalidInput(
                "break_start and break_end must be provided together".to_string(),
            ))
        }
    };

    let gap_tie_precedence = match params.gap_tie_precedence.as_deref() {
        None | Some("travel") => GapTiePrecedence::Travel,
        Some("preparation") => GapTiePrecedence::Preparation,
        Some(other) => {
            return Err(EngineError::InvalidInput(format!(
                "Invalid gap_tie_precedence '{other}': use 'travel' or 'preparation'"
            )))
        }
    };

    let prefs = SchedulePreferences {
        timezone: match &params.timezone {
            Some(tz) => parse_timezone(tz)?,
            None => Tz::UTC,
        },
        work_start: parse_time_of_day(&params.work_start)?,
        work_end: parse_time_of_day(&params.work_end)?,
        break_window,
        buffer_minutes: params.buffer_minutes.unwrap_or(0),
        max_meetings_per_day: params.max_meetings_per_day.unwrap_or(8),
        peak_hours: params
            .peak_hours
            .as_ref()
            .map(|hours| hours.iter().copied().collect::<BTreeSet<u32>>())
            .unwrap_or_default(),
        deep_work_blocks: params
            .deep_work_blocks
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(deep_work_block)
            .collect::<Result<Vec<_>, _>>()?,
        gap_tie_precedence,
    };
    prefs.validate()?;
    Ok(prefs)
}

pub(crate) fn engine_err(e: EngineError) -> McpError {
    let code = match &e {
        EngineError::EventNotFound(_) => ErrorCode::RESOURCE_NOT_FOUND,
        _ => ErrorCode::INVALID_PARAMS,
    };
    McpError::new(code, e.to_string(), None::<serde_json::Value>)
}

pub(crate) fn json_text<T: Serialize>(value: &T) -> CallToolResult {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
    CallToolResult::success(vec![Content::text(json)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_input(title: &str) -> JsonEventInput {
        JsonEventInput {
            title: title.to_string(),
            start: "2025-06-02T09:00:00Z".to_string(),
            end: "2025-06-02T10:00:00Z".to_string(),
            external_id: None,
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

    fn minimal_prefs_params() -> SetPreferencesParams {
        SetPreferencesParams {
            timezone: None,
            work_start: "09:00".to_string(),
            work_end: "17:00".to_string(),
            break_start: None,
            break_end: None,
            buffer_minutes: None,
            max_meetings_per_day: None,
            peak_hours: None,
            deep_work_blocks: None,
            gap_tie_precedence: None,
        }
    }

    #[test]
    fn parse_datetime_rfc3339_utc() {
        let dt = parse_datetime("2025-01-15T09:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-15T09:00:00+00:00");
    }

    #[test]
    fn parse_datetime_rfc3339_with_offset() {
        let dt = parse_datetime("2025-01-15T09:00:00-05:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-15T14:00:00+00:00");
    }

    #[test]
    fn parse_datetime_naive_assumes_utc() {
        let dt = parse_datetime("2025-01-15T09:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-15T09:00:00+00:00");
    }

    #[test]
    fn parse_datetime_invalid_returns_error() {
        assert!(parse_datetime("not-a-date").is_err());
    }

    #[test]
    fn parse_time_of_day_accepts_short_and_long_forms() {
        assert_eq!(
            parse_time_of_day("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("09:30:15").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 15).unwrap()
        );
        assert!(parse_time_of_day("9am").is_err());
    }

    #[test]
    fn json_event_defaults_are_applied() {
        let event = json_event_to_event(&minimal_input("Standup"), EventId::new()).unwrap();
        assert_eq!(event.event_type, EventType::Meeting);
        assert_eq!(event.status, EventStatus::Confirmed);
        assert_eq!(event.priority, 5);
        assert_eq!(event.travel_minutes, 0);
        assert!(!event.all_day);
        assert!(!event.deep_work_override);
    }

    #[test]
    fn preferences_from_minimal_params() {
        let prefs = preferences_from_params(&minimal_prefs_params()).unwrap();
        assert_eq!(prefs.timezone, Tz::UTC);
        assert_eq!(prefs.buffer_minutes, 0);
        assert_eq!(prefs.gap_tie_precedence, GapTiePrecedence::Travel);
        assert!(prefs.break_window.is_none());
    }

    #[test]
    fn preferences_parse_full_params() {
        let mut params = minimal_prefs_params();
        params.timezone = Some("America/New_York".to_string());
        params.break_start = Some("12:00".to_string());
        params.break_end = Some("12:45".to_string());
        params.peak_hours = Some(vec![9, 10, 14]);
        params.deep_work_blocks = Some(vec![DeepWorkBlockInput {
            weekday: "wed".to_string(),
            start: "09:00".to_string(),
            end: "11:00".to_string(),
        }]);
        params.gap_tie_precedence = Some("preparation".to_string());

        let prefs = preferences_from_params(&params).unwrap();
        assert_eq!(prefs.timezone, chrono_tz::America::New_York);
        assert_eq!(prefs.peak_hours, BTreeSet::from([9, 10, 14]));
        assert_eq!(prefs.deep_work_blocks[0].weekday, Weekday::Wed);
        assert_eq!(prefs.gap_tie_precedence, GapTiePrecedence::Preparation);
    }

    #[test]
    fn lone_break_bound_is_rejected() {
        let mut params = minimal_prefs_params();
        params.break_start = Some("12:00".to_string());
        assert!(matches!(
            preferences_from_params(&params),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn invalid_window_is_rejected_on_set() {
        let mut params = minimal_prefs_params();
        params.work_start = "17:00".to_string();
        params.work_end = "09:00".to_string();
        assert!(matches!(
            preferences_from_params(&params),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn engine_err_maps_not_found_to_resource_not_found() {
        let err = engine_err(EngineError::EventNotFound("x".to_string()));
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
    }

    #[test]
    fn engine_err_maps_validation_to_invalid_params() {
        let err = engine_err(EngineError::Configuration("bad".to_string()));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
