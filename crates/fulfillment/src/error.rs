//! Error taxonomy for coordination operations.

use common::OrderId;
use domain::{MIN_CHARGE_CENTS, OrderError, OrderStatus};
use order_store::StoreError;
use thiserror::Error;

use crate::services::cache::CacheError;
use crate::services::payment::PaymentProviderError;

/// Errors returned by coordination services.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Carries the variant's display name.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("Order was already claimed by another driver")]
    AlreadyClaimed { order_id: OrderId },

    #[error("Order is no longer available")]
    NoLongerAvailable { order_id: OrderId, status: OrderStatus },

    #[error("Amount mismatch: order total is {expected_cents} cents, got {provided_cents}")]
    AmountMismatch {
        expected_cents: i64,
        provided_cents: i64,
    },

    #[error("Payments are not configured")]
    PaymentUnavailable,

    #[error("Access denied: {0}")]
    AccessDenied(&'static str),

    #[error("Amount {cents} cents is below the minimum charge of {min} cents", min = MIN_CHARGE_CENTS)]
    BelowMinimumCharge { cents: i64 },

    #[error("Order cannot be paid in status {status}")]
    OrderNotPayable { status: OrderStatus },

    #[error("Order can no longer be cancelled in status {status}")]
    CancellationWindowClosed { status: OrderStatus },

    #[error("Driver is not available")]
    DriverUnavailable,

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid location: ({lat}, {lng})")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("The store is not accepting orders right now")]
    OrdersPaused,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    PaymentProvider(#[from] PaymentProviderError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Stable classification of a [`CoreError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    InsufficientStock,
    AlreadyClaimed,
    NoLongerAvailable,
    AmountMismatch,
    PaymentUnavailable,
    AccessDenied,
    BelowMinimumCharge,
    OrderNotPayable,
    CancellationWindowClosed,
    DriverUnavailable,
    InvalidOrder,
    InvalidLocation,
    OrdersPaused,
    Infrastructure,
}

impl ErrorKind {
    /// Machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::AlreadyClaimed => "ALREADY_CLAIMED",
            ErrorKind::NoLongerAvailable => "NO_LONGER_AVAILABLE",
            ErrorKind::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorKind::PaymentUnavailable => "PAYMENT_UNAVAILABLE",
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::BelowMinimumCharge => "BELOW_MINIMUM_CHARGE",
            ErrorKind::OrderNotPayable => "ORDER_NOT_PAYABLE",
            ErrorKind::CancellationWindowClosed => "CANCELLATION_WINDOW_CLOSED",
            ErrorKind::DriverUnavailable => "DRIVER_UNAVAILABLE",
            ErrorKind::InvalidOrder => "INVALID_ORDER",
            ErrorKind::InvalidLocation => "INVALID_LOCATION",
            ErrorKind::OrdersPaused => "ORDERS_PAUSED",
            ErrorKind::Infrastructure => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::InsufficientStock(_) => ErrorKind::InsufficientStock,
            CoreError::AlreadyClaimed { .. } => ErrorKind::AlreadyClaimed,
            CoreError::NoLongerAvailable { .. } => ErrorKind::NoLongerAvailable,
            CoreError::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            CoreError::PaymentUnavailable => ErrorKind::PaymentUnavailable,
            CoreError::AccessDenied(_) => ErrorKind::AccessDenied,
            CoreError::BelowMinimumCharge { .. } => ErrorKind::BelowMinimumCharge,
            CoreError::OrderNotPayable { .. } => ErrorKind::OrderNotPayable,
            CoreError::CancellationWindowClosed { .. } => ErrorKind::CancellationWindowClosed,
            CoreError::DriverUnavailable => ErrorKind::DriverUnavailable,
            CoreError::InvalidOrder(_) => ErrorKind::InvalidOrder,
            CoreError::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            CoreError::OrdersPaused => ErrorKind::OrdersPaused,
            CoreError::Store(_) | CoreError::PaymentProvider(_) | CoreError::Cache(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}

impl From<OrderError> for CoreError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { from, to } => CoreError::InvalidTransition { from, to },
            OrderError::BelowMinimumCharge { cents } => CoreError::BelowMinimumCharge { cents },
            other => CoreError::InvalidOrder(other.to_string()),
        }
    }
}

/// Convenience type alias for coordination results.
pub type Result<T> = std::result::Result<T, CoreError>;
