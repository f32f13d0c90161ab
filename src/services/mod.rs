pub mod booking_service;
pub mod profile_service;

pub use booking_service::BookingService;
pub use profile_service::ProfileService;
