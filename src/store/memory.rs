use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    BookingRecord, ProfileUpdate, PublishOutcome, Session, SlotBooking, SlotStatus, TutorProfile,
};

use super::{SlotStore, merge_slots};

struct TutorRecord {
    profile: TutorProfile,
    password: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    tutors: Vec<TutorRecord>,
    history: Vec<BookingRecord>,
    sessions: HashMap<String, Session>,
}

impl MemoryState {
    fn tutor_mut(&mut self, tutor_id: &str) -> Option<&mut TutorRecord> {
        self.tutors.iter_mut().find(|t| t.profile.id == tutor_id)
    }
}

/// Non-durable store. Every operation runs under one mutex, which makes each
/// of them atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn fetch_tutor(&self, tutor_id: &str) -> Result<Option<TutorProfile>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .tutors
            .iter()
            .find(|t| t.profile.id == tutor_id)
            .map(|t| t.profile.clone()))
    }

    async fn fetch_tutors(&self) -> Result<Vec<TutorProfile>, AppError> {
        let state = self.state.lock().await;
        Ok(state.tutors.iter().map(|t| t.profile.clone()).collect())
    }

    async fn fetch_tutors_by_subject(&self, subject: &str) -> Result<Vec<TutorProfile>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .tutors
            .iter()
            .filter(|t| t.profile.offers(subject))
            .map(|t| t.profile.clone())
            .collect())
    }

    async fn fetch_password(&self, tutor_id: &str) -> Result<Option<String>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .tutors
            .iter()
            .find(|t| t.profile.id == tutor_id)
            .and_then(|t| t.password.clone()))
    }

    async fn insert_tutor(
        &self,
        tutor_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TutorProfile>, AppError> {
        let mut state = self.state.lock().await;
        if state.tutor_mut(tutor_id).is_some() {
            return Ok(None);
        }
        let profile = TutorProfile::empty(tutor_id, now);
        state.tutors.push(TutorRecord {
            profile: profile.clone(),
            password: Some(password.to_string()),
        });
        Ok(Some(profile))
    }

    async fn save_profile(
        &self,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, AppError> {
        let mut state = self.state.lock().await;
        if state.tutor_mut(&update.tutor_id).is_none() {
            state.tutors.push(TutorRecord {
                profile: TutorProfile::empty(&update.tutor_id, now),
                password: None,
            });
        }
        let record = state
            .tutor_mut(&update.tutor_id)
            .ok_or(AppError::InternalServerError)?;

        let (slots, retained_slot_ids) = merge_slots(&record.profile.slots, &update.offered, now);
        let profile = &mut record.profile;
        profile.subjects = update.subjects.clone();
        profile.weekly_availability = update.weekly_availability.clone();
        profile.bio = update.bio.clone();
        profile.grade_level = update.grade_level.clone();
        profile.slots = slots;
        profile.updated_at = now;

        Ok(PublishOutcome {
            profile: profile.clone(),
            retained_slot_ids,
        })
    }

    async fn compare_and_book(
        &self,
        tutor_id: &str,
        slot_id: &str,
        booking: &SlotBooking,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.tutor_mut(tutor_id) else {
            return Ok(false);
        };
        let Some(slot) = record.profile.slots.iter_mut().find(|s| s.id == slot_id) else {
            return Ok(false);
        };
        if !slot.is_bookable(booking.booked_at) {
            return Ok(false);
        }

        slot.status = SlotStatus::Booked;
        slot.student_name = Some(booking.student_name.clone());
        slot.subject = Some(booking.subject.clone());
        slot.expiry_date = Some(booking.expiry_date);
        slot.booked_at = Some(booking.booked_at);

        let entry = BookingRecord {
            id: Uuid::new_v4().to_string(),
            tutor_id: tutor_id.to_string(),
            slot_id: slot_id.to_string(),
            day: slot.day.clone(),
            time_range: slot.time_range.clone(),
            student_name: booking.student_name.clone(),
            subject: booking.subject.clone(),
            expiry_date: booking.expiry_date,
            booked_at: booking.booked_at,
        };
        state.history.push(entry);
        Ok(true)
    }

    async fn fetch_booking_history(&self, limit: u32) -> Result<Vec<BookingRecord>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn fetch_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.sessions.remove(token).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.is_active(now));
        Ok((before - state.sessions.len()) as u64)
    }
}
