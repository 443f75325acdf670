use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use log::debug;
use std::fmt;

use crate::state::ScheduleRow;

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingAction {
    pub action: String,
    pub time: NaiveTime,
    pub day: Weekday,
}

impl fmt::Display for UpcomingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} ({})",
            humanize_action(&self.action),
            self.time.format("%H:%M"),
            weekday_name(self.day)
        )
    }
}

/// Parses `H:MM`, `HH:MM` or a bare hour.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');
    let hour = parts.next()?.trim().parse().ok()?;
    let minute = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Whether `row` runs on `weekday`. Rows without a day run every day; rows
/// with an unrecognized day never run.
pub fn runs_on(row: &ScheduleRow, weekday: Weekday) -> bool {
    match &row.day {
        None => true,
        Some(day) => day.trim().parse::<Weekday>().is_ok_and(|d| d == weekday),
    }
}

/// Finds the next enabled row strictly after `now`, looking at the rest of
/// today first and then up to a week ahead.
pub fn upcoming_action(schedule: &[ScheduleRow], now: NaiveDateTime) -> Option<UpcomingAction> {
    let timed: Vec<(&ScheduleRow, NaiveTime)> = schedule
        .iter()
        .filter(|row| row.enabled)
        .filter_map(|row| match parse_time(&row.time) {
            Some(time) => Some((row, time)),
            None => {
                debug!("Skipping row {} with unparsable time {:?}", row.id, row.time);
                None
            }
        })
        .collect();

    for offset in 0..=7 {
        let date = now.date() + Duration::days(offset);
        let weekday = date.weekday();

        let next = timed
            .iter()
            .filter(|(row, _)| runs_on(row, weekday))
            .filter(|(_, time)| offset > 0 || *time > now.time())
            .min_by_key(|(_, time)| *time);

        if let Some((row, time)) = next {
            return Some(UpcomingAction {
                action: row.action.clone(),
                time: *time,
                day: weekday,
            });
        }
    }

    None
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// `start_day` -> `Start day`
fn humanize_action(action: &str) -> String {
    let spaced = action.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: u64, time: &str, action: &str, day: Option<&str>) -> ScheduleRow {
        ScheduleRow {
            id,
            time: time.to_string(),
            action: action.to_string(),
            enabled: true,
            day: day.map(str::to_string),
            location: None,
        }
    }

    // 2025-06-02 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_short_and_padded_times() {
        assert_eq!(parse_time("9:00"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_time("09:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_time("18"), NaiveTime::from_hms_opt(18, 0, 0));
        assert_eq!(parse_time("lunch"), None);
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn picks_next_row_later_today() {
        let schedule = vec![
            row(1, "09:00", "start_day", None),
            row(2, "12:00", "lunch_break", None),
            row(3, "18:00", "stop_day", None),
        ];

        let next = upcoming_action(&schedule, monday_at(10, 30)).unwrap();
        assert_eq!(next.action, "lunch_break");
        assert_eq!(next.to_string(), "Lunch break at 12:00 (Monday)");
    }

    #[test]
    fn skips_disabled_and_wraps_to_following_days() {
        let mut disabled = row(1, "20:00", "stop_day", None);
        disabled.enabled = false;
        let schedule = vec![
            disabled,
            row(2, "08:00", "start_day", Some("Wednesday")),
            row(3, "07:30", "start_day", Some("Monday")),
        ];

        let next = upcoming_action(&schedule, monday_at(19, 0)).unwrap();
        assert_eq!(next.day, Weekday::Wed);
        assert_eq!(next.to_string(), "Start day at 08:00 (Wednesday)");
    }

    #[test]
    fn same_weekday_next_week_is_found() {
        let schedule = vec![row(1, "07:30", "start_day", Some("monday"))];

        let next = upcoming_action(&schedule, monday_at(9, 0)).unwrap();
        assert_eq!(next.day, Weekday::Mon);
        assert_eq!(next.time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    }

    #[test]
    fn nothing_upcoming_without_enabled_rows() {
        let schedule = vec![row(1, "later", "start_day", None)];
        assert_eq!(upcoming_action(&schedule, monday_at(9, 0)), None);
    }
}
