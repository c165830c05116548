pub mod auth;
pub mod passkey;

pub use auth::AuthService;
