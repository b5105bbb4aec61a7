//! Notification kinds pushed to live connections.
//!
//! The wire shape is `{"type": "...", "payload": {...}}` with camelCase payload
//! fields. Every payload carries the UTC time it was produced.

use chrono::{DateTime, Utc};
use common::{ConnectionId, DriverId, OrderId, UserId};
use domain::{GeoPoint, Money, OrderStatus};
use serde::{Deserialize, Serialize};

/// A real-time notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Notification {
    /// Greeting sent to a connection right after it subscribes.
    #[serde(rename = "connected")]
    Connected(Connected),

    /// A customer placed an order. Sent to admins.
    #[serde(rename = "order:new")]
    OrderNew(OrderNew),

    /// A new order can be picked up. Sent to drivers.
    #[serde(rename = "order:available")]
    OrderAvailable(OrderAvailable),

    /// An order changed status.
    #[serde(rename = "order:updated")]
    OrderUpdated(OrderUpdated),

    /// A driver won the claim on an order. Sent to that driver.
    #[serde(rename = "order:assigned")]
    OrderAssigned(OrderAssigned),

    /// A driver reported a new location.
    #[serde(rename = "driver:location")]
    DriverLocation(DriverLocation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub client_id: ConnectionId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNew {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Order total in cents.
    pub total: Money,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAvailable {
    pub order_id: OrderId,
    pub delivery_address: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdated {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// The customer who owns the order.
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAssigned {
    pub order_id: OrderId,
    pub delivery_address: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocation {
    pub driver_id: DriverId,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn connected(client_id: ConnectionId) -> Self {
        Self::Connected(Connected {
            client_id,
            timestamp: Utc::now(),
        })
    }

    pub fn order_new(order_id: OrderId, user_id: UserId, total: Money) -> Self {
        Self::OrderNew(OrderNew {
            order_id,
            user_id,
            total,
            timestamp: Utc::now(),
        })
    }

    pub fn order_available(order_id: OrderId, delivery_address: impl Into<String>) -> Self {
        Self::OrderAvailable(OrderAvailable {
            order_id,
            delivery_address: delivery_address.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn order_updated(
        order_id: OrderId,
        status: OrderStatus,
        user_id: UserId,
        driver_id: Option<DriverId>,
    ) -> Self {
        Self::OrderUpdated(OrderUpdated {
            order_id,
            status,
            user_id,
            driver_id,
            timestamp: Utc::now(),
        })
    }

    pub fn order_assigned(order_id: OrderId, delivery_address: impl Into<String>) -> Self {
        Self::OrderAssigned(OrderAssigned {
            order_id,
            delivery_address: delivery_address.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn driver_location(driver_id: DriverId, location: GeoPoint) -> Self {
        Self::DriverLocation(DriverLocation {
            driver_id,
            location,
            timestamp: Utc::now(),
        })
    }

    /// The wire name of this notification kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::OrderNew(_) => "order:new",
            Self::OrderAvailable(_) => "order:available",
            Self::OrderUpdated(_) => "order:updated",
            Self::OrderAssigned(_) => "order:assigned",
            Self::DriverLocation(_) => "driver:location",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
