use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{self, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Available,
    Booked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "Available",
            SlotStatus::Booked => "Booked",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(SlotStatus::Available),
            "Booked" => Ok(SlotStatus::Booked),
            other => Err(format!("unknown slot status: {}", other)),
        }
    }
}

/// A recurring weekly window one tutor offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub day: String,
    #[serde(rename = "time")]
    pub time_range: String,
    pub status: SlotStatus,
    pub offered: bool,
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub booked_at: Option<DateTime<Utc>>,
}

impl Slot {
    pub fn available(day: &str, time_range: &str) -> Self {
        Self {
            id: schedule::slot_key(day, time_range),
            day: day.to_string(),
            time_range: time_range.to_string(),
            status: SlotStatus::Available,
            offered: true,
            student_name: None,
            subject: None,
            expiry_date: None,
            booked_at: None,
        }
    }

    pub fn from_key(key: &str) -> Result<Self, ScheduleError> {
        let (day, time_range) = schedule::split_slot_key(key)?;
        Ok(Self::available(&day, &time_range))
    }

    /// Booked with an expiry that has passed. Still marked Booked in storage
    /// but logically free.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Booked
            && self.expiry_date.is_some()
            && schedule::is_expired(self.expiry_date, now)
    }

    /// A booking that still holds the slot. A Booked slot with no recorded
    /// expiry counts as live.
    pub fn has_live_booking(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Booked && !schedule::is_expired(self.expiry_date, now)
    }

    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.offered && (self.status == SlotStatus::Available || self.is_stale(now))
    }

    pub fn to_open(&self) -> OpenSlot {
        OpenSlot {
            id: self.id.clone(),
            day: self.day.clone(),
            time_range: self.time_range.clone(),
        }
    }
}

/// Public view of a bookable slot; carries nothing about earlier bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub id: String,
    pub day: String,
    #[serde(rename = "time")]
    pub time_range: String,
}

/// Fields written onto a slot by a successful booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBooking {
    pub student_name: String,
    pub subject: String,
    pub expiry_date: DateTime<Utc>,
    pub booked_at: DateTime<Utc>,
}
