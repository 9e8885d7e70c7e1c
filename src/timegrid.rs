//! Candidate date and timeslot universes for an exam window.
//!
//! The grid bounds the search space of the evolution loop: every exam is
//! placed on one of the [`ExamDate`]s at one of the [`TimeSlot`]s produced
//! here. An inverted window or a time range too short for a single slot is
//! not an error, it simply yields an empty universe.

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use log::debug;
use serde::Serialize;
use std::fmt;

use crate::error::{Result, TimetableError};

pub const DEFAULT_SLOT_MINUTES: u32 = 90;
pub const DEFAULT_EXCLUDED_WEEKDAY: Weekday = Weekday::Sun;

/// A calendar day on which exams may be held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDate {
    pub date: NaiveDate,
    pub weekday: String,
    pub label: String,
}

impl ExamDate {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weekday: date.format("%A").to_string(),
            label: date.format("%B %d, %Y").to_string(),
        }
    }

    /// ISO form used as the date identifier inside a schedule.
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// A fixed-duration exam slot, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%-I:%M %p"),
            self.end.format("%-I:%M %p")
        )
    }
}

/// Dates from `start` to `end` inclusive, skipping `excluded`.
pub fn generate_dates(start: NaiveDate, end: NaiveDate, excluded: Weekday) -> Vec<ExamDate> {
    if start > end {
        return Vec::new();
    }
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| day.weekday() != excluded)
        .map(ExamDate::new)
        .collect()
}

/// Back-to-back slots of `duration` starting at `start`. A slot is only
/// emitted if it ends at or before `end`.
pub fn generate_timeslots(start: NaiveTime, end: NaiveTime, duration: TimeDelta) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    if duration <= TimeDelta::zero() {
        return slots;
    }

    let mut current = start;
    loop {
        let (slot_end, wrapped) = current.overflowing_add_signed(duration);
        // past midnight can never fit before `end`
        if wrapped != 0 || slot_end > end {
            break;
        }
        slots.push(TimeSlot {
            start: current,
            end: slot_end,
        });
        current = slot_end;
    }
    slots
}

/// The full candidate universe for one solve.
#[derive(Debug, Clone, Default)]
pub struct TimeGrid {
    pub dates: Vec<ExamDate>,
    pub timeslots: Vec<TimeSlot>,
}

impl TimeGrid {
    pub fn date_keys(&self) -> Vec<String> {
        self.dates.iter().map(ExamDate::key).collect()
    }

    pub fn timeslot_labels(&self) -> Vec<String> {
        self.timeslots.iter().map(ToString::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.timeslots.is_empty()
    }
}

pub fn build_time_grid(
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_minutes: u32,
    excluded_weekday: Weekday,
) -> TimeGrid {
    let dates = generate_dates(start_date, end_date, excluded_weekday);
    let timeslots = generate_timeslots(
        start_time,
        end_time,
        TimeDelta::minutes(i64::from(slot_minutes)),
    );
    debug!(
        "Time grid built: {} dates x {} timeslots ({} to {}, excluding {})",
        dates.len(),
        timeslots.len(),
        start_date,
        end_date,
        excluded_weekday
    );
    TimeGrid { dates, timeslots }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| TimetableError::InvalidDate(value.to_string()))
}

pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| TimetableError::InvalidTime(value.to_string()))
}

/// Accepts full or abbreviated English names, case-insensitive.
pub fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| TimetableError::InvalidWeekday(value.to_string()))
}
