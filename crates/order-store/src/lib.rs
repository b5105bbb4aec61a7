//! Transactional storage for orders, inventory and drivers.
//!
//! Two backends implement [`OrderStore`]:
//! - [`InMemoryOrderStore`] for tests and single-process runs
//! - [`PostgresOrderStore`] using row locks and conditional updates

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{MAX_PAGE_SIZE, OrderFilter, OrderStore, StoreTx};
