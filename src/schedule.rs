//! Recurring weekly time windows.
//!
//! A slot is labelled by a weekday and a time range such as `7:00-7:45 AM`.
//! This module turns those labels into concrete instants: the next calendar
//! occurrence of a window, and whether a previously computed occurrence has
//! passed.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use serde::Serialize;
use thiserror::Error;

pub const SUBJECTS: [&str; 14] = [
    "Civics EOC",
    "Biology EOC",
    "Algebra 1 EOC",
    "Geometry EOC",
    "AP Pre-Calculus",
    "AP Calculus AB",
    "AICE Geography",
    "AP World History",
    "APUSH",
    "FAST ELA Grade 10",
    "AICE Spanish",
    "Eighth Grade Science Exam",
    "AICE Psychology",
    "AICE Marine Science",
];

const MORNING: &str = "7:00-7:45 AM";
const AFTERNOON_EARLY: &str = "2:45-3:45 PM";
const AFTERNOON_LATE: &str = "3:45-4:45 PM";

/// The weekly grid tutors pick their availability from.
pub const WEEK_SCHEDULE: [ScheduleDay; 4] = [
    ScheduleDay { day: "Monday", slots: &[MORNING, AFTERNOON_EARLY, AFTERNOON_LATE] },
    ScheduleDay { day: "Tuesday", slots: &[MORNING, AFTERNOON_EARLY, AFTERNOON_LATE] },
    ScheduleDay { day: "Wednesday", slots: &[AFTERNOON_EARLY, AFTERNOON_LATE] },
    ScheduleDay { day: "Thursday", slots: &[MORNING, AFTERNOON_EARLY, AFTERNOON_LATE] },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScheduleDay {
    pub day: &'static str,
    pub slots: &'static [&'static str],
}

pub fn is_known_subject(subject: &str) -> bool {
    SUBJECTS.contains(&subject)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unknown day: {0}")]
    UnknownDay(String),

    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("invalid slot key: {0}")]
    InvalidSlotKey(String),

    #[error("{0} does not exist in the school time zone")]
    NonexistentLocalTime(String),
}

/// Full English weekday names, any case.
pub fn parse_day(day: &str) -> Result<Weekday, ScheduleError> {
    let weekday = match day.trim().to_ascii_lowercase().as_str() {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return Err(ScheduleError::UnknownDay(day.to_string())),
    };
    Ok(weekday)
}

pub fn day_name(day: Weekday) -> &'static str {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn label(self) -> &'static str {
        match self {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        }
    }
}

fn strip_meridiem(token: &str) -> (&str, Option<Meridiem>) {
    let token = token.trim();
    let upper = token.to_ascii_uppercase();
    if upper.ends_with("AM") {
        (token[..token.len() - 2].trim_end(), Some(Meridiem::Am))
    } else if upper.ends_with("PM") {
        (token[..token.len() - 2].trim_end(), Some(Meridiem::Pm))
    } else {
        (token, None)
    }
}

fn parse_clock(token: &str) -> Option<(u32, u32)> {
    let (hour, minute) = token.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    (minute < 60).then_some((hour, minute))
}

fn to_24h(hour: u32, meridiem: Meridiem) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    Some(match (meridiem, hour) {
        (Meridiem::Am, 12) => 0,
        (Meridiem::Am, h) => h,
        (Meridiem::Pm, 12) => 12,
        (Meridiem::Pm, h) => h + 12,
    })
}

fn to_12h(time: NaiveTime) -> (u32, u32, Meridiem) {
    let meridiem = if time.hour() < 12 { Meridiem::Am } else { Meridiem::Pm };
    let hour = match time.hour() % 12 {
        0 => 12,
        h => h,
    };
    (hour, time.minute(), meridiem)
}

/// Start and end of a range label like `2:45-3:45 PM`, `11:30 AM-12:15 PM`
/// or `14:45-15:45`. The end must come after the start.
pub fn parse_time_range(time_range: &str) -> Result<(NaiveTime, NaiveTime), ScheduleError> {
    let invalid = || ScheduleError::InvalidTimeRange(time_range.to_string());

    let (start, end) = time_range.split_once('-').ok_or_else(invalid)?;
    let (start, start_meridiem) = strip_meridiem(start);
    let (end, end_meridiem) = strip_meridiem(end);
    let (start_hour, start_minute) = parse_clock(start).ok_or_else(invalid)?;
    let (end_hour, end_minute) = parse_clock(end).ok_or_else(invalid)?;

    let start_hour = match (start_meridiem, end_meridiem) {
        (Some(m), _) => to_24h(start_hour, m).ok_or_else(invalid)?,
        (None, Some(Meridiem::Pm)) => {
            let morning_start =
                start_hour != 12 && (end_hour == 12 || start_hour > end_hour);
            let m = if morning_start { Meridiem::Am } else { Meridiem::Pm };
            to_24h(start_hour, m).ok_or_else(invalid)?
        }
        (None, Some(Meridiem::Am)) => to_24h(start_hour, Meridiem::Am).ok_or_else(invalid)?,
        (None, None) => start_hour,
    };
    let end_hour = match end_meridiem.or(start_meridiem) {
        Some(m) => to_24h(end_hour, m).ok_or_else(invalid)?,
        None => end_hour,
    };

    let start = NaiveTime::from_hms_opt(start_hour, start_minute, 0).ok_or_else(invalid)?;
    let end = NaiveTime::from_hms_opt(end_hour, end_minute, 0).ok_or_else(invalid)?;
    if end <= start {
        return Err(invalid());
    }
    Ok((start, end))
}

pub fn parse_start_time(time_range: &str) -> Result<NaiveTime, ScheduleError> {
    parse_time_range(time_range).map(|(start, _)| start)
}

/// Renders a range the way the week schedule writes it: `7:00-7:45 AM`
/// within one half of the day, `11:30 AM-12:15 PM` across noon.
pub fn format_time_range(start: NaiveTime, end: NaiveTime) -> String {
    let (start_hour, start_minute, start_meridiem) = to_12h(start);
    let (end_hour, end_minute, end_meridiem) = to_12h(end);
    if start_meridiem == end_meridiem {
        format!(
            "{}:{:02}-{}:{:02} {}",
            start_hour, start_minute, end_hour, end_minute, end_meridiem.label()
        )
    } else {
        format!(
            "{}:{:02} {}-{}:{:02} {}",
            start_hour,
            start_minute,
            start_meridiem.label(),
            end_hour,
            end_minute,
            end_meridiem.label()
        )
    }
}

/// Splits a slot key `"<day>-<timeRange>"` at the first dash and returns the
/// canonical day and time labels, so every spelling of one window maps to
/// the same slot id.
pub fn split_slot_key(key: &str) -> Result<(String, String), ScheduleError> {
    let (day, time_range) = key
        .split_once('-')
        .ok_or_else(|| ScheduleError::InvalidSlotKey(key.to_string()))?;
    let day = day_name(parse_day(day)?);
    let (start, end) = parse_time_range(time_range)?;
    Ok((day.to_string(), format_time_range(start, end)))
}

/// Canonical id for a slot key. Fails on keys that do not name a window.
pub fn canonical_slot_key(key: &str) -> Result<String, ScheduleError> {
    let (day, time_range) = split_slot_key(key)?;
    Ok(slot_key(&day, &time_range))
}

pub fn slot_key(day: &str, time_range: &str) -> String {
    format!("{}-{}", day, time_range)
}

/// Position of a window within the week, Monday first. Used to keep slot
/// lists in calendar order.
pub fn week_position(day: &str, time_range: &str) -> Result<(u32, NaiveTime), ScheduleError> {
    Ok((
        parse_day(day)?.num_days_from_monday(),
        parse_start_time(time_range)?,
    ))
}

/// Next occurrence of the weekly window at or after `reference`, computed in
/// the reference's time zone. A window on the same weekday whose start time
/// has already passed rolls over to next week.
pub fn next_occurrence<Tz: TimeZone>(
    day: &str,
    time_range: &str,
    reference: &DateTime<Tz>,
) -> Result<DateTime<Tz>, ScheduleError> {
    let target = parse_day(day)?;
    let start = parse_start_time(time_range)?;

    let local = reference.naive_local();
    let current = local.weekday().num_days_from_sunday();
    let mut delta = (target.num_days_from_sunday() + 7 - current) % 7;
    if delta == 0 && local.time() > start {
        delta = 7;
    }

    let naive = (local.date() + Duration::days(i64::from(delta))).and_time(start);
    reference
        .timezone()
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ScheduleError::NonexistentLocalTime(naive.to_string()))
}

/// A stored expiry with no value never expires on its own.
pub fn is_expired(stored: Option<DateTime<Utc>>, reference: DateTime<Utc>) -> bool {
    match stored {
        Some(stored) => reference > stored,
        None => false,
    }
}
