pub mod consultation;
pub mod lifecycle;
pub mod summary;

pub use consultation::ConsultationService;
pub use lifecycle::ConsultationLifecycleService;
