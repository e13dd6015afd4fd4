pub mod error;
pub mod health;
pub mod notifications;
pub mod scheduler;
pub mod services;
pub mod status;
pub mod triggers;
