//! Order lifecycle coordination.
//!
//! Services in this crate sit between the HTTP layer and storage. Each one
//! runs its reads and writes inside a single store transaction and publishes
//! notifications to the [`notify::Hub`] only after that transaction commits.

mod announce;
pub mod checkout;
pub mod claim;
pub mod drivers;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod payment;
pub mod services;

pub use checkout::{ACCEPT_ORDERS_KEY, Checkout, LineRequest, OrderRequest};
pub use claim::ClaimService;
pub use drivers::DriverService;
pub use error::{CoreError, ErrorKind, Result};
pub use lifecycle::OrderLifecycle;
pub use payment::{
    IntentReceipt, PaymentCoordinator, PaymentEvent, PaymentEventKind, ReconcileOutcome,
};
