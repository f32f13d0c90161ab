use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{BookingRecord, BookingRequest, Confirmed, LiveBooking, SlotBooking, TutorAvailability, TutorProfile};
use crate::schedule;
use crate::store::SlotStore;

pub struct BookingService {
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    school_time_zone: Tz,
}

impl BookingService {
    pub fn new(store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>, school_time_zone: Tz) -> Self {
        Self {
            store,
            clock,
            school_time_zone,
        }
    }

    /// Tutors offering `subject` together with the slots a student may book
    /// right now. Stale bookings count as open; tutors left with no open slot
    /// are omitted.
    pub async fn search_available(&self, subject: &str) -> Result<Vec<TutorAvailability>, AppError> {
        let now = self.clock.now();
        let tutors = self.store.fetch_tutors_by_subject(subject).await?;

        let results: Vec<TutorAvailability> = tutors
            .iter()
            .filter_map(|tutor| {
                let slots: Vec<_> = tutor
                    .slots
                    .iter()
                    .filter(|slot| slot.is_bookable(now))
                    .map(|slot| slot.to_open())
                    .collect();
                if slots.is_empty() {
                    return None;
                }
                Some(TutorAvailability {
                    tutor: tutor.summary(),
                    slots,
                })
            })
            .collect();

        info!("search for {:?}: {} tutors with open slots", subject, results.len());
        Ok(results)
    }

    /// Books a slot through the store's conditional write. Only the write
    /// decides the outcome; the preceding read supplies the slot's day and
    /// time, which are fixed by its id.
    pub async fn confirm_booking(&self, mut req: BookingRequest) -> Result<Confirmed, AppError> {
        if let Ok(id) = schedule::canonical_slot_key(&req.slot_id) {
            req.slot_id = id;
        }
        let student_name = req.student_name.trim();
        if student_name.is_empty() {
            return Err(AppError::BadRequest("Student name is required".to_string()));
        }

        let tutor = self
            .store
            .fetch_tutor(&req.tutor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tutor {} not found", req.tutor_id)))?;
        let slot = tutor
            .slot(&req.slot_id)
            .ok_or_else(|| AppError::NotFound(format!("Slot {} not found", req.slot_id)))?;

        if !tutor.offers(&req.subject) {
            return Err(AppError::BadRequest(format!(
                "{} does not tutor {}",
                tutor.name, req.subject
            )));
        }

        let now = self.clock.now();
        let expiry_date = schedule::next_occurrence(
            &slot.day,
            &slot.time_range,
            &now.with_timezone(&self.school_time_zone),
        )?
        .with_timezone(&Utc);

        let booking = SlotBooking {
            student_name: student_name.to_string(),
            subject: req.subject.clone(),
            expiry_date,
            booked_at: now,
        };

        if !self
            .store
            .compare_and_book(&req.tutor_id, &req.slot_id, &booking)
            .await?
        {
            return Err(self.classify_rejection(&req).await?);
        }

        info!(
            "booked {} with {} for {} ({} until {})",
            req.slot_id, req.tutor_id, booking.subject, booking.student_name, expiry_date
        );

        Ok(Confirmed {
            tutor_id: tutor.id.clone(),
            tutor_name: tutor.name.clone(),
            slot_id: slot.id.clone(),
            day: slot.day.clone(),
            time_range: slot.time_range.clone(),
            student_name: booking.student_name,
            subject: booking.subject,
            expiry_date,
        })
    }

    /// Re-reads after a rejected write: the slot may have been removed by a
    /// republish in between, otherwise someone else holds it.
    async fn classify_rejection(&self, req: &BookingRequest) -> Result<AppError, AppError> {
        let still_there = self
            .store
            .fetch_tutor(&req.tutor_id)
            .await?
            .is_some_and(|tutor| tutor.slot(&req.slot_id).is_some());

        if still_there {
            warn!("booking conflict on {} with {}", req.slot_id, req.tutor_id);
            Ok(AppError::Conflict(
                "This slot has already been booked by someone else.".to_string(),
            ))
        } else {
            Ok(AppError::NotFound(format!("Slot {} not found", req.slot_id)))
        }
    }

    /// Bookings still holding one tutor's slots.
    pub async fn live_bookings(&self, tutor_id: &str) -> Result<Vec<LiveBooking>, AppError> {
        let now = self.clock.now();
        let bookings = self
            .store
            .fetch_tutor(tutor_id)
            .await?
            .map(|tutor| collect_live(&tutor, now))
            .unwrap_or_default();
        Ok(bookings)
    }

    pub async fn all_live_bookings(&self) -> Result<Vec<LiveBooking>, AppError> {
        let now = self.clock.now();
        let tutors = self.store.fetch_tutors().await?;
        Ok(tutors.iter().flat_map(|tutor| collect_live(tutor, now)).collect())
    }

    pub async fn booking_history(&self, limit: u32) -> Result<Vec<BookingRecord>, AppError> {
        self.store.fetch_booking_history(limit).await
    }
}

fn collect_live(tutor: &TutorProfile, now: chrono::DateTime<Utc>) -> Vec<LiveBooking> {
    tutor
        .slots
        .iter()
        .filter(|slot| slot.has_live_booking(now))
        .map(|slot| LiveBooking {
            tutor_id: tutor.id.clone(),
            tutor_name: tutor.name.clone(),
            slot_id: slot.id.clone(),
            day: slot.day.clone(),
            time_range: slot.time_range.clone(),
            student_name: slot.student_name.clone(),
            subject: slot.subject.clone(),
            expiry_date: slot.expiry_date,
        })
        .collect()
}
