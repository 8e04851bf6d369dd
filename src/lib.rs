//! Client core for the payroll desk: backend and fingerprint bridge
//! access, request deduplication, the domain event bus, enrollment and
//! the background refreshers that keep list views current.

pub mod api;
pub mod biometric;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod realtime;
pub mod rules;
pub mod session;
pub mod utils;

pub use client::Desk;
pub use config::Config;
pub use error::ApiError;
