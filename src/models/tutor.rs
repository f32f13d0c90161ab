use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slot::{OpenSlot, Slot};

/// Weekly availability keyed by slot id (`"<day>-<timeRange>"`).
pub type WeeklyAvailability = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorProfile {
    pub id: String,
    pub name: String,
    pub subjects: Vec<String>,
    pub weekly_availability: WeeklyAvailability,
    pub slots: Vec<Slot>,
    pub bio: String,
    pub grade_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TutorProfile {
    /// Profile for a tutor who has never saved anything.
    pub fn empty(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            subjects: Vec::new(),
            weekly_availability: WeeklyAvailability::new(),
            slots: Vec::new(),
            bio: String::new(),
            grade_level: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn offers(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }

    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    pub fn summary(&self) -> TutorSummary {
        TutorSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            bio: self.bio.clone(),
            grade_level: self.grade_level.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorSummary {
    pub id: String,
    pub name: String,
    pub bio: String,
    pub grade_level: String,
}

/// One search hit: a tutor with the slots a student may book right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorAvailability {
    pub tutor: TutorSummary,
    pub slots: Vec<OpenSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTutorRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAvailabilityRequest {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub availability: WeeklyAvailability,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub grade_level: String,
}

/// Validated profile save, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub tutor_id: String,
    pub subjects: Vec<String>,
    pub weekly_availability: WeeklyAvailability,
    /// Slots to offer, in week order, derived from `weekly_availability`.
    pub offered: Vec<Slot>,
    pub bio: String,
    pub grade_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishOutcome {
    pub profile: TutorProfile,
    /// Slots the tutor turned off that stay until their live booking expires.
    pub retained_slot_ids: Vec<String>,
}
