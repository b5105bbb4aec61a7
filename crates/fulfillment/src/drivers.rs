//! Driver profile, availability and location updates.

use std::sync::Arc;

use common::UserId;
use domain::{Driver, GeoPoint};
use notify::{Audience, Hub, Notification};
use order_store::OrderStore;
use tracing::{debug, info};

use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct DriverService<S: OrderStore> {
    store: S,
    hub: Arc<Hub>,
}

impl<S: OrderStore> DriverService<S> {
    pub fn new(store: S, hub: Arc<Hub>) -> Self {
        Self { store, hub }
    }

    /// Creates the driver profile for a user, or updates its vehicle details.
    ///
    /// Availability and location of an existing profile are kept.
    #[tracing::instrument(skip(self, vehicle_type, license_plate))]
    pub async fn register(
        &self,
        user_id: UserId,
        vehicle_type: String,
        license_plate: String,
    ) -> Result<Driver> {
        if vehicle_type.trim().is_empty() || license_plate.trim().is_empty() {
            return Err(CoreError::InvalidOrder(
                "vehicle type and license plate are required".to_string(),
            ));
        }

        let driver = match self.store.driver_by_user(user_id).await? {
            Some(existing) => Driver {
                vehicle_type,
                license_plate,
                ..existing
            },
            None => Driver::new(user_id, vehicle_type, license_plate),
        };
        self.store.upsert_driver(&driver).await?;

        info!(driver_id = %driver.id, "Driver profile saved");
        Ok(driver)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Driver> {
        self.store
            .driver_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", user_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_availability(&self, user_id: UserId, available: bool) -> Result<Driver> {
        let driver = self
            .store
            .set_driver_availability(user_id, available)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", user_id))?;

        info!(driver_id = %driver.id, available, "Driver availability changed");
        Ok(driver)
    }

    /// Stores the driver's position and broadcasts it to every connection.
    pub async fn update_location(&self, user_id: UserId, lat: f64, lng: f64) -> Result<Driver> {
        let point = GeoPoint::new(lat, lng).ok_or(CoreError::InvalidLocation { lat, lng })?;

        let driver = self
            .store
            .set_driver_location(user_id, point)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", user_id))?;

        let delivered = self.hub.publish(
            &Notification::driver_location(driver.id, point),
            &Audience::everyone(),
        );
        debug!(driver_id = %driver.id, delivered, "Driver location broadcast");
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use notify::{PushSink, SinkClosed, Subscriber};
    use order_store::InMemoryOrderStore;
    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Default)]
    struct Frames(Mutex<Vec<String>>);

    impl PushSink for Frames {
        fn write(&self, frame: Arc<str>) -> std::result::Result<(), SinkClosed> {
            self.0.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    fn service() -> (DriverService<InMemoryOrderStore>, Arc<Hub>) {
        let hub = Arc::new(Hub::new());
        (DriverService::new(InMemoryOrderStore::new(), hub.clone()), hub)
    }

    #[tokio::test]
    async fn register_keeps_existing_state() {
        let (drivers, _) = service();
        let user = UserId::new();

        let first = drivers
            .register(user, "bike".into(), "AB-1".into())
            .await
            .unwrap();
        drivers.set_availability(user, true).await.unwrap();

        let second = drivers
            .register(user, "van".into(), "XY-9".into())
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert!(second.available);
        assert_eq!(second.vehicle_type, "van");
    }

    #[tokio::test]
    async fn unknown_driver_is_not_found() {
        let (drivers, _) = service();
        let err = drivers
            .set_availability(UserId::new(), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn location_is_validated_then_broadcast() {
        let (drivers, hub) = service();
        let user = UserId::new();
        drivers
            .register(user, "car".into(), "CD-2".into())
            .await
            .unwrap();

        let frames = Arc::new(Frames::default());
        hub.subscribe(Subscriber::anonymous(), frames.clone()).unwrap();

        let err = drivers.update_location(user, 91.0, 0.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidLocation);

        let driver = drivers.update_location(user, 40.7, -74.0).await.unwrap();
        assert_eq!(driver.location, GeoPoint::new(40.7, -74.0));

        let frames = frames.0.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains("driver:location"));
    }
}
