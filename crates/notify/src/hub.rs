use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use common::{Actor, ConnectionId, Role, UserId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::Notification;
use crate::sink::PushSink;

/// The hub no longer accepts connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("notification hub is shut down")]
pub struct HubClosed;

/// Who a live connection belongs to. Anonymous connections only receive
/// broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
}

impl Subscriber {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
        }
    }
}

impl From<Actor> for Subscriber {
    fn from(actor: Actor) -> Self {
        Self::new(actor.user_id, actor.role)
    }
}

/// Recipients of a publish: any union of users, roles, or everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience {
    users: Vec<UserId>,
    roles: Vec<Role>,
    broadcast: bool,
}

impl Audience {
    /// Every live connection, anonymous ones included.
    pub fn everyone() -> Self {
        Self {
            broadcast: true,
            ..Self::default()
        }
    }

    pub fn user(user_id: UserId) -> Self {
        Self::default().and_user(user_id)
    }

    pub fn role(role: Role) -> Self {
        Self::default().and_role(role)
    }

    pub fn and_user(mut self, user_id: UserId) -> Self {
        if !self.users.contains(&user_id) {
            self.users.push(user_id);
        }
        self
    }

    pub fn and_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.broadcast && self.users.is_empty() && self.roles.is_empty()
    }
}

struct Connection {
    subscriber: Subscriber,
    sink: Arc<dyn PushSink>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_role: HashMap<Role, HashSet<ConnectionId>>,
}

impl Registry {
    fn insert(&mut self, id: ConnectionId, connection: Connection) {
        if let Some(user_id) = connection.subscriber.user_id {
            self.by_user.entry(user_id).or_default().insert(id);
        }
        if let Some(role) = connection.subscriber.role {
            self.by_role.entry(role).or_default().insert(id);
        }
        self.connections.insert(id, connection);
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        if let Some(user_id) = connection.subscriber.user_id
            && let Some(ids) = self.by_user.get_mut(&user_id)
        {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
        if let Some(role) = connection.subscriber.role
            && let Some(ids) = self.by_role.get_mut(&role)
        {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_role.remove(&role);
            }
        }
        Some(connection)
    }

    /// Resolves an audience to distinct connection ids.
    fn resolve(&self, audience: &Audience) -> HashSet<ConnectionId> {
        if audience.broadcast {
            return self.connections.keys().copied().collect();
        }

        let mut targets = HashSet::new();
        for user_id in &audience.users {
            if let Some(ids) = self.by_user.get(user_id) {
                targets.extend(ids.iter().copied());
            }
        }
        for role in &audience.roles {
            if let Some(ids) = self.by_role.get(role) {
                targets.extend(ids.iter().copied());
            }
        }
        targets
    }
}

/// Registry of live connections and the fan-out over them.
///
/// Owned by the process and shared as `Arc<Hub>` with every producer. Delivery
/// is best effort: there is no queue, retry or persistence, and a connection
/// whose write fails is dropped from the registry. The registry lock is
/// synchronous and is never held across an `.await`.
#[derive(Default)]
pub struct Hub {
    registry: RwLock<Registry>,
    closed: AtomicBool,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and sends it the `connected` greeting.
    ///
    /// A connection whose greeting cannot be written is never registered.
    pub fn subscribe(
        &self,
        subscriber: Subscriber,
        sink: Arc<dyn PushSink>,
    ) -> Result<ConnectionId, HubClosed> {
        let id = ConnectionId::new();
        let greeting = Notification::connected(id).to_json().ok();

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so a concurrent shutdown cannot miss us.
        if self.closed.load(Ordering::Acquire) {
            return Err(HubClosed);
        }
        // Written under the lock so the greeting precedes every publish.
        if let Some(greeting) = greeting
            && sink.write(greeting.into()).is_err()
        {
            debug!(%id, "Connection closed before greeting");
            return Ok(id);
        }
        registry.insert(id, Connection { subscriber, sink });
        metrics::gauge!("hub_connections").set(registry.connections.len() as f64);

        debug!(%id, user_id = ?subscriber.user_id, role = ?subscriber.role, "Connection subscribed");
        Ok(id)
    }

    /// Removes a connection. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let removed = registry.remove(id).is_some();
        if removed {
            metrics::gauge!("hub_connections").set(registry.connections.len() as f64);
            debug!(%id, "Connection unsubscribed");
        }
        removed
    }

    /// Sends a notification to every connection in the audience, at most once
    /// per connection. Returns the number of successful deliveries.
    pub fn publish(&self, notification: &Notification, audience: &Audience) -> usize {
        if audience.is_empty() {
            return 0;
        }

        let frame: Arc<str> = match notification.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(
                    error = %e,
                    event_type = notification.event_type(),
                    "Failed to serialize notification"
                );
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            for id in registry.resolve(audience) {
                if let Some(connection) = registry.connections.get(&id) {
                    match connection.sink.write(Arc::clone(&frame)) {
                        Ok(()) => delivered += 1,
                        Err(_) => dead.push(id),
                    }
                }
            }
        }

        for id in dead {
            self.unsubscribe(id);
        }

        metrics::counter!("notifications_published_total", "type" => notification.event_type())
            .increment(1);
        debug!(
            event_type = notification.event_type(),
            delivered, "Notification published"
        );
        delivered
    }

    /// Drains the registry, closing every connection, and refuses new ones.
    pub fn shutdown(&self) {
        let drained = {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *registry)
        };

        let count = drained.connections.len();
        drop(drained);
        metrics::gauge!("hub_connections").set(0.0);
        info!(connections = count, "Notification hub shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn connection_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::sink::SinkClosed;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<String>>,
        broken: AtomicBool,
    }

    impl RecordingSink {
        fn types(&self) -> Vec<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| {
                    let value: serde_json::Value = serde_json::from_str(f).unwrap();
                    value["type"].as_str().unwrap().to_string()
                })
                .collect()
        }
    }

    impl PushSink for RecordingSink {
        fn write(&self, frame: Arc<str>) -> Result<(), SinkClosed> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(SinkClosed);
            }
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    fn connect(hub: &Hub, subscriber: Subscriber) -> (ConnectionId, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let id = hub.subscribe(subscriber, sink.clone()).unwrap();
        (id, sink)
    }

    fn sample() -> Notification {
        Notification::order_available(common::OrderId::new(), "1 Main St")
    }

    #[test]
    fn new_connection_gets_greeting() {
        let hub = Hub::new();
        let (_, sink) = connect(&hub, Subscriber::anonymous());
        assert_eq!(sink.types(), vec!["connected"]);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn union_audience_delivers_once_per_connection() {
        let hub = Hub::new();
        let admin = UserId::new();
        let (_, sink) = connect(&hub, Subscriber::new(admin, Role::Admin));

        let audience = Audience::user(admin).and_role(Role::Admin);
        assert_eq!(hub.publish(&sample(), &audience), 1);
        assert_eq!(sink.types(), vec!["connected", "order:available"]);
    }

    #[test]
    fn routes_by_user_and_role() {
        let hub = Hub::new();
        let customer = UserId::new();
        let (_, customer_sink) = connect(&hub, Subscriber::new(customer, Role::Customer));
        let (_, other_sink) = connect(&hub, Subscriber::new(UserId::new(), Role::Customer));
        let (_, driver_sink) = connect(&hub, Subscriber::new(UserId::new(), Role::Driver));
        let (_, anon_sink) = connect(&hub, Subscriber::anonymous());

        hub.publish(&sample(), &Audience::user(customer));
        hub.publish(&sample(), &Audience::role(Role::Driver));

        assert_eq!(customer_sink.types().len(), 2);
        assert_eq!(other_sink.types().len(), 1);
        assert_eq!(driver_sink.types().len(), 2);
        assert_eq!(anon_sink.types().len(), 1);

        assert_eq!(hub.publish(&sample(), &Audience::everyone()), 4);
        assert_eq!(anon_sink.types().len(), 2);
    }

    #[test]
    fn multiple_connections_per_user() {
        let hub = Hub::new();
        let user = UserId::new();
        let (_, a) = connect(&hub, Subscriber::new(user, Role::Customer));
        let (_, b) = connect(&hub, Subscriber::new(user, Role::Customer));

        assert_eq!(hub.publish(&sample(), &Audience::user(user)), 2);
        assert_eq!(a.types().len(), 2);
        assert_eq!(b.types().len(), 2);
    }

    #[test]
    fn failed_write_deregisters_silently() {
        let hub = Hub::new();
        let user = UserId::new();
        let (_, sink) = connect(&hub, Subscriber::new(user, Role::Customer));
        sink.broken.store(true, Ordering::SeqCst);

        assert_eq!(hub.publish(&sample(), &Audience::user(user)), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = Hub::new();
        let user = UserId::new();
        let (id, sink) = connect(&hub, Subscriber::new(user, Role::Customer));

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.publish(&sample(), &Audience::user(user)), 0);
        assert_eq!(sink.types(), vec!["connected"]);
    }

    #[test]
    fn per_connection_order_follows_publish_order() {
        let hub = Hub::new();
        let (_, sink) = connect(&hub, Subscriber::new(UserId::new(), Role::Admin));

        let order_id = common::OrderId::new();
        let admins = Audience::role(Role::Admin);
        let total = domain::Money::from_cents(100);
        hub.publish(&Notification::order_new(order_id, UserId::new(), total), &admins);
        hub.publish(&Notification::order_available(order_id, "x"), &admins);

        assert_eq!(sink.types(), vec!["connected", "order:new", "order:available"]);
    }

    #[test]
    fn shutdown_drains_and_refuses_new_connections() {
        let hub = Hub::new();
        connect(&hub, Subscriber::anonymous());
        connect(&hub, Subscriber::anonymous());

        hub.shutdown();
        assert!(hub.is_closed());
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(
            hub.subscribe(Subscriber::anonymous(), Arc::new(RecordingSink::default())),
            Err(HubClosed)
        );
    }

    #[test]
    fn empty_audience_reaches_nobody() {
        let hub = Hub::new();
        connect(&hub, Subscriber::anonymous());
        assert_eq!(hub.publish(&sample(), &Audience::default()), 0);
    }
}
