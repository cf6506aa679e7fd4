use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use super::interval::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDayWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepWorkBlock {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Which conflict kind wins when an undersized gap is attributable equally to
/// travel time and preparation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapTiePrecedence {
    Travel,
    Preparation,
}

/// Per-user scheduling preferences. Always passed explicitly into engine
/// calls; there is no ambient singleton. Time-of-day and day-of-week fields
/// are interpreted in `timezone`; event instants stay in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePreferences {
    pub timezone: Tz,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub break_window: Option<TimeOfDayWindow>,
    pub buffer_minutes: u32,
    pub max_meetings_per_day: u32,
    pub peak_hours: BTreeSet<u32>,
    pub deep_work_blocks: Vec<DeepWorkBlock>,
    pub gap_tie_precedence: GapTiePrecedence,
}

impl Default for SchedulePreferences {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            break_window: None,
            buffer_minutes: 0,
            max_meetings_per_day: 8,
            peak_hours: BTreeSet::new(),
            deep_work_blocks: Vec::new(),
            gap_tie_precedence: GapTiePrecedence::Travel,
        }
    }
}

impl SchedulePreferences {
    /// Checked at the top of every engine operation; a malformed value fails
    /// fast before any computation runs.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.work_start >= self.work_end {
            return Err(EngineError::Configuration(format!(
                "work window start ({}) must be before end ({})",
                self.work_start, self.work_end
            )));
        }
        if let Some(brk) = &self.break_window {
            if brk.start >= brk.end {
                return Err(EngineError::Configuration(format!(
                    "break window start ({}) must be before end ({})",
                    brk.start, brk.end
                )));
            }
            if brk.start < self.work_start || brk.end > self.work_end {
                return Err(EngineError::Configuration(
                    "break window must lie within the work window".to_string(),
                ));
            }
        }
        for block in &self.deep_work_blocks {
            if block.start >= block.end {
                return Err(EngineError::Configuration(format!(
                    "deep-work block on {} has start ({}) not before end ({})",
                    block.weekday, block.start, block.end
                )));
            }
        }
        if let Some(hour) = self.peak_hours.iter().find(|h| **h > 23) {
            return Err(EngineError::Configuration(format!(
                "peak hour {hour} is out of range (0-23)"
            )));
        }
        Ok(())
    }

    pub fn buffer(&self) -> TimeDelta {
        TimeDelta::minutes(self.buffer_minutes as i64)
    }

    /// The calendar date of an instant in the user's timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Resolve a local wall-clock time on `date` to UTC. DST-ambiguous times
    /// take the earlier offset; times inside a DST gap resolve to nothing.
    fn local_instant(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn work_window(&self, date: NaiveDate) -> Option<TimeRange> {
        let start = self.local_instant(date, self.work_start)?;
        let end = self.local_instant(date, self.work_end)?;
        (start < end).then(|| TimeRange::new(start, end))
    }

    /// The day's work window minus the break window: the base availability
    /// the Free-Slot Finder carves slots out of.
    pub fn availability(&self, date: NaiveDate) -> Vec<TimeRange> {
        let Some(work) = self.work_window(date) else {
            return vec![];
        };
        let brk = self.break_window.as_ref().and_then(|b| {
            let start = self.local_instant(date, b.start)?;
            let end = self.local_instant(date, b.end)?;
            (start < end).then(|| TimeRange::new(start, end))
        });

        match brk {
            None => vec![work],
            Some(brk) => {
                let mut segments = Vec::with_capacity(2);
                if work.start < brk.start {
                    segments.push(TimeRange::new(work.start, brk.start.min(work.end)));
                }
                if brk.end < work.end {
                    segments.push(TimeRange::new(brk.end.max(work.start), work.end));
                }
                segments
            }
        }
    }

    /// Deep-work blocks that fall on `date`, resolved to UTC ranges.
    pub fn deep_work_ranges(&self, date: NaiveDate) -> Vec<TimeRange> {
        self.deep_work_blocks
            .iter()
            .filter(|b| b.weekday == date.weekday())
            .filter_map(|b| {
                let start = self.local_instant(date, b.start)?;
                let end = self.local_instant(date, b.end)?;
                (start < end).then(|| TimeRange::new(start, end))
            })
            .collect()
    }

    pub fn is_peak_hour(&self, instant: DateTime<Utc>) -> bool {
        self.peak_hours
            .contains(&instant.with_timezone(&self.timezone).hour())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn default_preferences_are_valid() {
        assert!(SchedulePreferences::default().validate().is_ok());
    }

    #[test]
    fn inverted_work_window_is_rejected() {
        let prefs = SchedulePreferences {
            work_start: time(17, 0),
            work_end: time(9, 0),
            ..Default::default()
        };
        assert!(matches!(
            prefs.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn break_outside_work_window_is_rejected() {
        let prefs = SchedulePreferences {
            break_window: Some(TimeOfDayWindow {
                start: time(8, 0),
                end: time(8, 30),
            }),
            ..Default::default()
        };
        assert!(matches!(
            prefs.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn out_of_range_peak_hour_is_rejected() {
        let prefs = SchedulePreferences {
            peak_hours: BTreeSet::from([9, 24]),
            ..Default::default()
        };
        assert!(matches!(
            prefs.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn work_window_resolves_in_user_timezone() {
        let prefs = SchedulePreferences {
            timezone: chrono_tz::America::New_York,
            ..Default::default()
        };
        // Jan 15 2025: New York is UTC-5, so 09:00 local is 14:00Z.
        let window = prefs.work_window(date(2025, 1, 15)).unwrap();
        assert_eq!(window.start, utc(2025, 1, 15, 14));
        assert_eq!(window.end, utc(2025, 1, 15, 22));
    }

    #[test]
    fn availability_splits_around_break() {
        let prefs = SchedulePreferences {
            break_window: Some(TimeOfDayWindow {
                start: time(12, 0),
                end: time(13, 0),
            }),
            ..Default::default()
        };
        let segments = prefs.availability(date(2025, 1, 15));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], TimeRange::new(utc(2025, 1, 15, 9), utc(2025, 1, 15, 12)));
        assert_eq!(segments[1], TimeRange::new(utc(2025, 1, 15, 13), utc(2025, 1, 15, 17)));
    }

    #[test]
    fn deep_work_ranges_match_weekday_only() {
        let prefs = SchedulePreferences {
            deep_work_blocks: vec![DeepWorkBlock {
                weekday: Weekday::Wed,
                start: time(9, 0),
                end: time(11, 0),
            }],
            ..Default::default()
        };
        // 2025-01-15 is a Wednesday, 2025-01-16 a Thursday.
        assert_eq!(prefs.deep_work_ranges(date(2025, 1, 15)).len(), 1);
        assert!(prefs.deep_work_ranges(date(2025, 1, 16)).is_empty());
    }

    #[test]
    fn peak_hour_uses_local_clock() {
        let prefs = SchedulePreferences {
            timezone: chrono_tz::America::New_York,
            peak_hours: BTreeSet::from([9]),
            ..Default::default()
        };
        // 14:00Z is 09:00 in New York in January.
        assert!(prefs.is_peak_hour(utc(2025, 1, 15, 14)));
        assert!(!prefs.is_peak_hour(utc(2025, 1, 15, 9)));
    }
}
