//! Route handlers.

pub mod admin;
pub mod driver;
pub mod events;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
