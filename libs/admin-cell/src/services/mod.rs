pub mod dashboard;

pub use dashboard::AdminDashboardService;
