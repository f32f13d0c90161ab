use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub tutor_id: String,
    pub slot_id: String,
    pub student_name: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmed {
    pub tutor_id: String,
    pub tutor_name: String,
    pub slot_id: String,
    pub day: String,
    #[serde(rename = "time")]
    pub time_range: String,
    pub student_name: String,
    pub subject: String,
    pub expiry_date: DateTime<Utc>,
}

/// A live booking as shown on a tutor dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveBooking {
    pub tutor_id: String,
    pub tutor_name: String,
    pub slot_id: String,
    pub day: String,
    #[serde(rename = "time")]
    pub time_range: String,
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// History entry appended with every successful booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub tutor_id: String,
    pub slot_id: String,
    pub day: String,
    #[serde(rename = "time")]
    pub time_range: String,
    pub student_name: String,
    pub subject: String,
    pub expiry_date: DateTime<Utc>,
    pub booked_at: DateTime<Utc>,
}
