pub mod analysis;
pub mod prescription;

pub use prescription::PrescriptionService;
