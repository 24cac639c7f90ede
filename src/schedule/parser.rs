//! Time-range parsing for delivery and pickup slots.
//!
//! Accepts the shopper-facing 12-hour form (`9 AM - 12:30 PM`, `9:00am–5pm`)
//! and the canonical 24-hour form (`09:00-12:00`). Anything else, including
//! out-of-range hours or minutes, parses to `None`.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use serde::Serialize;

/// Courier windows the dispatch side accepts.
pub const DELIVERY_TIME_SLOTS: [&str; 4] = ["09:00-12:00", "12:00-15:00", "15:00-18:00", "18:00-21:00"];

static TWELVE_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*([AP]M)\s*[-–]\s*(\d{1,2})(?::(\d{2}))?\s*([AP]M)\s*$")
        .expect("12-hour slot regex is valid")
});

static TWENTY_FOUR_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*[-–]\s*(\d{1,2}):(\d{2})\s*$")
        .expect("24-hour slot regex is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    /// `HH:MM-HH:MM`, the form stored with an order.
    pub fn canonical(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }

    /// `9:00 AM - 12:00 PM`, the form shown to shoppers.
    pub fn display(&self) -> String {
        format!("{} - {}", twelve_hour(self.start), twelve_hour(self.end))
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.canonical()) }
}

fn twelve_hour(t: NaiveTime) -> String {
    let (pm, hour) = t.hour12();
    format!("{}:{:02} {}", hour, t.minute(), if pm { "PM" } else { "AM" })
}

fn number(caps: &Captures<'_>, i: usize) -> Option<u32> {
    match caps.get(i) {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}

fn clock_12(hour: u32, minute: u32, meridiem: &str) -> Option<NaiveTime> {
    if !(1..=12).contains(&hour) { return None; }
    let hour = match (meridiem.eq_ignore_ascii_case("PM"), hour) {
        (false, 12) => 0,
        (false, h) => h,
        (true, 12) => 12,
        (true, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parses slot strings and anchors them to dates in the store's zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSlotParser { zone: Tz }

impl Default for TimeSlotParser {
    fn default() -> Self { Self { zone: Tz::UTC } }
}

impl TimeSlotParser {
    pub fn new(zone: Tz) -> Self { Self { zone } }
    pub fn zone(&self) -> Tz { self.zone }

    /// Calendar date of `now` in the parser's zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate { now.with_timezone(&self.zone).date_naive() }

    pub fn parse_time_slot(&self, value: &str) -> Option<TimeSlot> {
        if let Some(caps) = TWELVE_HOUR.captures(value) {
            let start = clock_12(number(&caps, 1)?, number(&caps, 2)?, &caps[3])?;
            let end = clock_12(number(&caps, 4)?, number(&caps, 5)?, &caps[6])?;
            return Some(TimeSlot { start, end });
        }
        let caps = TWENTY_FOUR_HOUR.captures(value)?;
        // from_hms_opt rejects hour > 23 and minute > 59
        let start = NaiveTime::from_hms_opt(number(&caps, 1)?, number(&caps, 2)?, 0)?;
        let end = NaiveTime::from_hms_opt(number(&caps, 3)?, number(&caps, 4)?, 0)?;
        Some(TimeSlot { start, end })
    }

    pub fn is_valid(&self, value: &str) -> bool { self.parse_time_slot(value).is_some() }

    /// Start and end of the slot on `date`, in the parser's zone.
    pub fn parse_datetime_range(&self, value: &str, date: NaiveDate) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        let slot = self.parse_time_slot(value)?;
        Some((self.at(date, slot.start)?, self.at(date, slot.end)?))
    }

    /// Exact match against [`DELIVERY_TIME_SLOTS`]; stricter than [`TimeSlotParser::is_valid`].
    pub fn is_valid_delivery_time_slot(&self, value: &str) -> bool { DELIVERY_TIME_SLOTS.contains(&value) }

    /// Start of an allowed courier slot on `date`.
    pub fn parse_delivery_datetime(&self, value: &str, date: NaiveDate) -> Option<DateTime<Tz>> {
        if !self.is_valid_delivery_time_slot(value) { return None; }
        self.parse_datetime_range(value, date).map(|(start, _)| start)
    }

    /// Ambiguous local times take the earlier instant; times inside a
    /// spring-forward gap move past it.
    fn at(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
        let local: NaiveDateTime = date.and_time(time);
        self.zone.from_local_datetime(&local).earliest()
            .or_else(|| self.zone.from_local_datetime(&(local + Duration::hours(1))).earliest())
    }
}
