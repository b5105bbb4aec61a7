//! External service traits and in-memory implementations.

pub mod cache;
pub mod payment;

pub use cache::{Cache, CacheError, InMemoryCache};
pub use payment::{InMemoryPaymentProvider, PaymentIntent, PaymentProvider, PaymentProviderError};
