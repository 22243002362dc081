//! Schedule matching shared by the server sweep and the client mirror.
//!
//! A medication is *due* at a local date and minute when its start date has
//! passed, the weekday is listed in `days_of_week`, and the `HH:mm` string is
//! listed in `reminder_times`. Times are compared as strings: the format is
//! fixed-width 24-hour, so lexicographic order is chronological order.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use thiserror::Error;

use crate::models::Medication;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("at least one reminder time is required")]
    NoReminderTimes,

    #[error("at least one day of the week is required")]
    NoDays,

    #[error("invalid reminder time '{0}', expected HH:mm")]
    InvalidTime(String),

    #[error("invalid day of week '{0}'")]
    InvalidDay(String),
}

pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    WEEKDAY_NAMES
        .iter()
        .position(|n| *n == name)
        .and_then(|i| Weekday::try_from(i as u8).ok())
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn is_valid_hhmm(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

pub fn validate_times(times: &[String]) -> Result<(), ScheduleError> {
    if times.is_empty() {
        return Err(ScheduleError::NoReminderTimes);
    }
    match times.iter().find(|t| !is_valid_hhmm(t)) {
        Some(bad) => Err(ScheduleError::InvalidTime(bad.clone())),
        None => Ok(()),
    }
}

pub fn validate_days(days: &[String]) -> Result<(), ScheduleError> {
    if days.is_empty() {
        return Err(ScheduleError::NoDays);
    }
    match days.iter().find(|d| parse_weekday(d).is_none()) {
        Some(bad) => Err(ScheduleError::InvalidDay(bad.clone())),
        None => Ok(()),
    }
}

pub fn validate_schedule(times: &[String], days: &[String]) -> Result<(), ScheduleError> {
    validate_times(times)?;
    validate_days(days)
}

/// Coarse filter: the medication has started and runs on this weekday.
pub fn is_due_on(med: &Medication, date: NaiveDate, weekday: &str) -> bool {
    med.start_date <= date && med.days_of_week.iter().any(|d| d == weekday)
}

/// Exact-minute match against the reminder times.
pub fn matches_time(med: &Medication, hhmm: &str) -> bool {
    med.reminder_times.iter().any(|t| t == hhmm)
}

pub fn is_due_at(med: &Medication, at: NaiveDateTime) -> bool {
    is_due_on(med, at.date(), weekday_name(at.weekday())) && matches_time(med, &format_hhmm(at.time()))
}
