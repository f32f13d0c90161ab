pub mod booking;
pub mod session;
pub mod slot;
pub mod tutor;

pub use booking::{BookingRecord, BookingRequest, Confirmed, LiveBooking};
pub use session::{LoginRequest, LoginResponse, Session};
pub use slot::{OpenSlot, Slot, SlotBooking, SlotStatus};
pub use tutor::{
    NewTutorRequest, ProfileUpdate, PublishAvailabilityRequest, PublishOutcome, TutorAvailability,
    TutorProfile, TutorSummary, WeeklyAvailability,
};
