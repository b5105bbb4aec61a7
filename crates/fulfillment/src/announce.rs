//! Post-commit notifications shared by the coordination services.

use common::{Role, UserId};
use domain::Order;
use notify::{Audience, Hub, Notification};
use order_store::OrderStore;
use tracing::warn;

/// Resolves the user behind the order's assigned driver, if any.
///
/// Lookup failures only cost the driver one notification, so they are logged
/// and swallowed.
pub(crate) async fn driver_user<S: OrderStore>(store: &S, order: &Order) -> Option<UserId> {
    let driver_id = order.driver_id?;
    match store.get_driver(driver_id).await {
        Ok(driver) => driver.map(|d| d.user_id),
        Err(e) => {
            warn!(order_id = %order.id, %driver_id, error = %e, "Driver lookup failed");
            None
        }
    }
}

/// Publishes `order:updated` to the owning customer, every admin and the
/// assigned driver in a single fan-out.
pub(crate) fn order_updated(hub: &Hub, order: &Order, driver_user: Option<UserId>) {
    let mut audience = Audience::user(order.customer_id).and_role(Role::Admin);
    if let Some(user_id) = driver_user {
        audience = audience.and_user(user_id);
    }

    let notification =
        Notification::order_updated(order.id, order.status, order.customer_id, order.driver_id);
    hub.publish(&notification, &audience);
}
