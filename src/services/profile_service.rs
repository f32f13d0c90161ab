use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{
    NewTutorRequest, ProfileUpdate, PublishAvailabilityRequest, PublishOutcome, Slot, TutorProfile,
    WeeklyAvailability,
};
use crate::schedule;
use crate::store::SlotStore;

pub struct ProfileService {
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The stored profile, or an empty one for a tutor who signed in but has
    /// not saved yet.
    pub async fn profile(&self, tutor_id: &str) -> Result<TutorProfile, AppError> {
        let profile = self
            .store
            .fetch_tutor(tutor_id)
            .await?
            .unwrap_or_else(|| TutorProfile::empty(tutor_id, self.clock.now()));
        Ok(profile)
    }

    /// Saves subjects, bio and weekly availability, and regenerates the slot
    /// list. Live bookings survive: a slot that stays on keeps its booking,
    /// a slot turned off is retained withdrawn until the booking expires.
    pub async fn publish_availability(
        &self,
        tutor_id: &str,
        req: PublishAvailabilityRequest,
    ) -> Result<PublishOutcome, AppError> {
        let update = build_update(tutor_id, req)?;
        let outcome = self.store.save_profile(&update, self.clock.now()).await?;

        if !outcome.retained_slot_ids.is_empty() {
            warn!(
                "{} withdrew slots with live bookings, kept until they expire: {:?}",
                tutor_id, outcome.retained_slot_ids
            );
        }
        info!(
            "{} published {} slots for {} subjects",
            tutor_id,
            outcome.profile.slots.len(),
            outcome.profile.subjects.len()
        );
        Ok(outcome)
    }

    pub async fn register_tutor(&self, req: NewTutorRequest) -> Result<TutorProfile, AppError> {
        let name = req.name.trim();
        if name.is_empty() || req.password.is_empty() {
            return Err(AppError::BadRequest("Name and password are required".to_string()));
        }

        let profile = self
            .store
            .insert_tutor(name, &req.password, self.clock.now())
            .await?
            .ok_or_else(|| AppError::Conflict("A tutor with this name already exists.".to_string()))?;

        info!("registered tutor {}", profile.id);
        Ok(profile)
    }
}

fn build_update(tutor_id: &str, req: PublishAvailabilityRequest) -> Result<ProfileUpdate, AppError> {
    let mut subjects: Vec<String> = Vec::with_capacity(req.subjects.len());
    for subject in req.subjects {
        if !schedule::is_known_subject(&subject) {
            return Err(AppError::BadRequest(format!("Unknown subject: {}", subject)));
        }
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }

    // Spellings of one window collapse onto its canonical id; it is on if
    // any of them is.
    let mut weekly_availability = WeeklyAvailability::new();
    for (key, on) in req.availability {
        let id = schedule::canonical_slot_key(&key)?;
        *weekly_availability.entry(id).or_insert(false) |= on;
    }

    let mut offered = weekly_availability
        .iter()
        .filter(|(_, on)| **on)
        .map(|(id, _)| Slot::from_key(id))
        .collect::<Result<Vec<_>, _>>()?;
    offered.sort_by_key(|s| schedule::week_position(&s.day, &s.time_range).ok());

    Ok(ProfileUpdate {
        tutor_id: tutor_id.to_string(),
        subjects,
        weekly_availability,
        offered,
        bio: req.bio.trim().to_string(),
        grade_level: req.grade_level.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{SlotBooking, SlotStatus};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn service() -> (ProfileService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (ProfileService::new(store.clone(), clock.clone()), store, clock)
    }

    fn publish(keys: &[(&str, bool)]) -> PublishAvailabilityRequest {
        PublishAvailabilityRequest {
            subjects: vec!["Biology EOC".to_string(), "APUSH".to_string()],
            availability: keys
                .iter()
                .map(|(k, on)| (k.to_string(), *on))
                .collect::<WeeklyAvailability>(),
            bio: "  Happy to help  ".to_string(),
            grade_level: "11th".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_creates_on_slots_only() {
        let (service, _, _) = service();
        let outcome = service
            .publish_availability(
                "Grace",
                publish(&[
                    ("Tuesday-7:00-7:45 AM", true),
                    ("Monday-2:45-3:45 PM", true),
                    ("Wednesday-3:45-4:45 PM", false),
                ]),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.profile.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Monday-2:45-3:45 PM", "Tuesday-7:00-7:45 AM"]);
        assert!(outcome.profile.slots.iter().all(|s| s.status == SlotStatus::Available));
        assert_eq!(outcome.profile.bio, "Happy to help");
        assert_eq!(outcome.profile.weekly_availability.len(), 3);
        assert!(outcome.retained_slot_ids.is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_unknown_subject_and_bad_key() {
        let (service, _, _) = service();

        let mut req = publish(&[]);
        req.subjects.push("Alchemy".to_string());
        assert!(matches!(
            service.publish_availability("Grace", req).await,
            Err(AppError::BadRequest(_))
        ));

        let req = publish(&[("Caturday-7:00-7:45 AM", true)]);
        assert!(matches!(
            service.publish_availability("Grace", req).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_republish_keeps_live_booking_of_withdrawn_slot() {
        let (service, store, clock) = service();
        service
            .publish_availability("Grace", publish(&[("Monday-7:00-7:45 AM", true)]))
            .await
            .unwrap();

        let now = clock.now();
        let booked = store
            .compare_and_book(
                "Grace",
                "Monday-7:00-7:45 AM",
                &SlotBooking {
                    student_name: "Alice".to_string(),
                    subject: "Biology EOC".to_string(),
                    expiry_date: now + Duration::days(3),
                    booked_at: now,
                },
            )
            .await
            .unwrap();
        assert!(booked);

        let outcome = service
            .publish_availability("Grace", publish(&[("Monday-7:00-7:45 AM", false)]))
            .await
            .unwrap();
        assert_eq!(outcome.retained_slot_ids, vec!["Monday-7:00-7:45 AM".to_string()]);
        let slot = &outcome.profile.slots[0];
        assert!(!slot.offered);
        assert_eq!(slot.student_name.as_deref(), Some("Alice"));

        clock.advance(Duration::days(4));
        let outcome = service
            .publish_availability("Grace", publish(&[]))
            .await
            .unwrap();
        assert!(outcome.profile.slots.is_empty());
    }

    #[tokio::test]
    async fn test_publish_collapses_spellings_of_one_window() {
        let (service, _, _) = service();
        let outcome = service
            .publish_availability(
                "Grace",
                publish(&[
                    ("Monday-7:00-7:45 AM", true),
                    ("monday-7:00-7:45 AM", true),
                    ("Monday-07:00-7:45 AM", false),
                    ("thursday-14:45-15:45", true),
                ]),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.profile.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Monday-7:00-7:45 AM", "Thursday-2:45-3:45 PM"]);
        let keys: Vec<&str> = outcome
            .profile
            .weekly_availability
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["Monday-7:00-7:45 AM", "Thursday-2:45-3:45 PM"]);
    }

    #[tokio::test]
    async fn test_profile_defaults_to_empty() {
        let (service, _, _) = service();
        let profile = service.profile("Newcomer").await.unwrap();
        assert_eq!(profile.id, "Newcomer");
        assert!(profile.slots.is_empty());
    }

    #[tokio::test]
    async fn test_register_tutor_conflicts_on_duplicate() {
        let (service, _, _) = service();
        let req = NewTutorRequest {
            name: "Linus".to_string(),
            password: "secret".to_string(),
        };
        service.register_tutor(req.clone()).await.unwrap();
        assert!(matches!(
            service.register_tutor(req).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service
                .register_tutor(NewTutorRequest {
                    name: " ".to_string(),
                    password: "x".to_string(),
                })
                .await,
            Err(AppError::BadRequest(_))
        ));
    }
}
