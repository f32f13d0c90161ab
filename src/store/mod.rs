//! Persistence seam for tutor documents, their slots, booking history and
//! sessions.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{BookingRecord, ProfileUpdate, PublishOutcome, Session, Slot, SlotBooking, TutorProfile};
use crate::schedule;

pub use memory::MemoryStore;

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    async fn fetch_tutor(&self, tutor_id: &str) -> Result<Option<TutorProfile>, AppError>;

    /// All tutors in insertion order.
    async fn fetch_tutors(&self) -> Result<Vec<TutorProfile>, AppError>;

    /// Tutors whose subjects contain `subject`, in insertion order.
    async fn fetch_tutors_by_subject(&self, subject: &str) -> Result<Vec<TutorProfile>, AppError>;

    /// `Ok(None)` when the tutor is unknown or has no stored password.
    async fn fetch_password(&self, tutor_id: &str) -> Result<Option<String>, AppError>;

    /// Creates an empty profile. Returns `Ok(None)` if the id is taken.
    async fn insert_tutor(
        &self,
        tutor_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TutorProfile>, AppError>;

    /// Upserts the profile and recomputes its slots with [`merge_slots`] as
    /// one atomic unit.
    async fn save_profile(
        &self,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, AppError>;

    /// Writes `booking` onto the slot only if it is still bookable at
    /// `booking.booked_at`, and appends the history record in the same
    /// atomic step. Returns whether the write landed.
    async fn compare_and_book(
        &self,
        tutor_id: &str,
        slot_id: &str,
        booking: &SlotBooking,
    ) -> Result<bool, AppError>;

    /// Newest first.
    async fn fetch_booking_history(&self, limit: u32) -> Result<Vec<BookingRecord>, AppError>;

    async fn insert_session(&self, session: &Session) -> Result<(), AppError>;

    async fn fetch_session(&self, token: &str) -> Result<Option<Session>, AppError>;

    async fn delete_session(&self, token: &str) -> Result<bool, AppError>;

    /// Drops sessions no longer active at `now`. Returns how many went.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Recomputes a tutor's slot list from the newly offered windows.
///
/// Offered slots that already exist keep their booking state. Slots no longer
/// offered are dropped unless they hold a live booking, in which case they are
/// kept withdrawn (`offered = false`) and their ids are returned alongside.
/// The result is in week order.
pub fn merge_slots(current: &[Slot], offered: &[Slot], now: DateTime<Utc>) -> (Vec<Slot>, Vec<String>) {
    let mut merged: Vec<Slot> = offered
        .iter()
        .map(|fresh| match current.iter().find(|s| s.id == fresh.id) {
            Some(existing) => Slot { offered: true, ..existing.clone() },
            None => fresh.clone(),
        })
        .collect();

    let mut retained = Vec::new();
    for existing in current {
        if offered.iter().any(|s| s.id == existing.id) {
            continue;
        }
        if existing.has_live_booking(now) {
            merged.push(Slot { offered: false, ..existing.clone() });
            retained.push(existing.id.clone());
        }
    }

    merged.sort_by_key(|s| schedule::week_position(&s.day, &s.time_range).ok());
    (merged, retained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotStatus;
    use chrono::Duration;

    fn booked(key: &str, expiry: DateTime<Utc>) -> Slot {
        Slot {
            status: SlotStatus::Booked,
            student_name: Some("Alice".to_string()),
            subject: Some("Biology EOC".to_string()),
            expiry_date: Some(expiry),
            ..Slot::from_key(key).unwrap()
        }
    }

    #[test]
    fn test_merge_keeps_booking_on_still_offered_slot() {
        let now = Utc::now();
        let current = vec![booked("Monday-7:00-7:45 AM", now + Duration::days(2))];
        let offered = vec![Slot::from_key("Monday-7:00-7:45 AM").unwrap()];

        let (merged, retained) = merge_slots(&current, &offered, now);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, SlotStatus::Booked);
        assert_eq!(merged[0].student_name.as_deref(), Some("Alice"));
        assert!(retained.is_empty());
    }

    #[test]
    fn test_merge_retains_withdrawn_live_booking() {
        let now = Utc::now();
        let current = vec![
            booked("Tuesday-2:45-3:45 PM", now + Duration::days(1)),
            Slot::from_key("Monday-7:00-7:45 AM").unwrap(),
        ];
        let offered = vec![Slot::from_key("Thursday-7:00-7:45 AM").unwrap()];

        let (merged, retained) = merge_slots(&current, &offered, now);
        let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Tuesday-2:45-3:45 PM", "Thursday-7:00-7:45 AM"]);
        assert!(!merged[0].offered);
        assert!(merged[1].offered);
        assert_eq!(retained, vec!["Tuesday-2:45-3:45 PM".to_string()]);
    }

    #[test]
    fn test_merge_drops_withdrawn_expired_booking() {
        let now = Utc::now();
        let current = vec![booked("Wednesday-2:45-3:45 PM", now - Duration::hours(1))];

        let (merged, retained) = merge_slots(&current, &[], now);
        assert!(merged.is_empty());
        assert!(retained.is_empty());
    }

    #[test]
    fn test_merge_orders_by_week_position() {
        let offered = vec![
            Slot::from_key("Thursday-3:45-4:45 PM").unwrap(),
            Slot::from_key("Monday-2:45-3:45 PM").unwrap(),
            Slot::from_key("Monday-7:00-7:45 AM").unwrap(),
        ];
        let (merged, _) = merge_slots(&[], &offered, Utc::now());
        let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["Monday-7:00-7:45 AM", "Monday-2:45-3:45 PM", "Thursday-3:45-4:45 PM"]
        );
    }
}
