//! Shared types for the order coordination core.
//!
//! Every entity the core touches is identified by a UUID; each gets its own
//! newtype so an order id can never be passed where a driver id is expected.

pub mod actor;
pub mod ids;

pub use actor::{Actor, ParseRoleError, Role};
pub use ids::{ConnectionId, DriverId, OrderId, OrderItemId, UserId, VariantId};
