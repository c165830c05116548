pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod video;

pub use booking::AppointmentService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use video::VideoTokenService;
