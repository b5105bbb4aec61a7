use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DriverId, OrderId, OrderItemId, UserId, VariantId};
use domain::{Driver, GeoPoint, Money, Order, OrderItem, OrderStatus, OrderTotals, VariantRecord};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderFilter, OrderStore, StoreTx},
};

const ORDER_COLUMNS: &str = "id, customer_id, status, subtotal_cents, tip_cents, tax_cents, \
     delivery_fee_cents, total_cents, delivery_address, delivery_instructions, driver_id, \
     payment_intent_id, delivery_photo_ref, delivery_notes, delivered_at, created_at, updated_at";

const DRIVER_COLUMNS: &str = "id, user_id, available, vehicle_type, license_plate, lat, lng";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Order store migrations applied");
        Ok(())
    }

    async fn order_with_items(&self, row: Option<PgRow>) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        hydrate_one(&mut conn, row).await
    }
}

/// Maps constraint violations to [`StoreError::Constraint`].
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        debug!(constraint, message = db_err.message(), "Write rejected by constraint");
        return StoreError::Constraint(format!("{constraint}: {}", db_err.message()));
    }
    StoreError::Database(e)
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(what.to_string())
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let id: Uuid = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = status.parse::<OrderStatus>().map_err(corrupt)?;

    let subtotal = Money::from_cents(row.try_get("subtotal_cents")?);
    let tip = Money::from_cents(row.try_get("tip_cents")?);
    let totals = OrderTotals::compute(subtotal, tip).map_err(corrupt)?;

    let stored_total: i64 = row.try_get("total_cents")?;
    if stored_total != totals.total().cents() {
        return Err(corrupt(format!(
            "order {id} total {stored_total} does not match its breakdown"
        )));
    }

    Ok(Order {
        id: OrderId::from_uuid(id),
        customer_id: UserId::from_uuid(row.try_get("customer_id")?),
        status,
        totals,
        delivery_address: row.try_get("delivery_address")?,
        delivery_instructions: row.try_get("delivery_instructions")?,
        driver_id: row
            .try_get::<Option<Uuid>, _>("driver_id")?
            .map(DriverId::from_uuid),
        payment_intent_id: row.try_get("payment_intent_id")?,
        delivery_photo_ref: row.try_get("delivery_photo_ref")?,
        delivery_notes: row.try_get("delivery_notes")?,
        delivered_at: row.try_get("delivered_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
        variant_name: row.try_get("variant_name")?,
        quantity: u32::try_from(quantity).map_err(corrupt)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        line_total: Money::from_cents(row.try_get("line_total_cents")?),
    })
}

fn row_to_variant(row: &PgRow) -> Result<VariantRecord> {
    Ok(VariantRecord {
        id: VariantId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        stock: row.try_get("stock")?,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_driver(row: &PgRow) -> Result<Driver> {
    let lat: Option<f64> = row.try_get("lat")?;
    let lng: Option<f64> = row.try_get("lng")?;
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(
            GeoPoint::new(lat, lng)
                .ok_or_else(|| corrupt(format!("driver location ({lat}, {lng}) out of range")))?,
        ),
        _ => None,
    };

    Ok(Driver {
        id: DriverId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        available: row.try_get("available")?,
        vehicle_type: row.try_get("vehicle_type")?,
        license_plate: row.try_get("license_plate")?,
        location,
    })
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, variant_id, variant_name, quantity, unit_price_cents, line_total_cents
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, position ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        let item = row_to_item(row)?;
        items.entry(item.order_id.as_uuid()).or_default().push(item);
    }
    Ok(items)
}

async fn hydrate_one(conn: &mut PgConnection, row: Option<PgRow>) -> Result<Option<Order>> {
    let Some(row) = row else {
        return Ok(None);
    };
    let id: Uuid = row.try_get("id")?;
    let mut items = fetch_items(conn, vec![id]).await?;
    row_to_order(&row, items.remove(&id).unwrap_or_default()).map(Some)
}

/// A PostgreSQL transaction. Rolls back when dropped without commit.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn variants_for_update(
        &mut self,
        ids: &[VariantId],
    ) -> Result<HashMap<VariantId, VariantRecord>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, stock, price_cents FROM variants
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| row_to_variant(row).map(|v| (v.id, v)))
            .collect()
    }

    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE variants SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!("variant {id} does not exist")));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, subtotal_cents, tip_cents, tax_cents,
                                delivery_fee_cents, total_cents, delivery_address,
                                delivery_instructions, driver_id, payment_intent_id,
                                delivery_photo_ref, delivery_notes, delivered_at,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.totals.subtotal().cents())
        .bind(order.totals.tip().cents())
        .bind(order.totals.tax().cents())
        .bind(order.totals.delivery_fee().cents())
        .bind(order.totals.total().cents())
        .bind(&order.delivery_address)
        .bind(&order.delivery_instructions)
        .bind(order.driver_id.map(|d| d.as_uuid()))
        .bind(&order.payment_intent_id)
        .bind(&order.delivery_photo_ref)
        .bind(&order.delivery_notes)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        for (position, item) in order.items.iter().enumerate() {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                StoreError::Constraint(format!("quantity {} out of range", item.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, variant_id, variant_name, quantity,
                                         unit_price_cents, line_total_cents, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(item.variant_id.as_uuid())
            .bind(&item.variant_name)
            .bind(quantity)
            .bind(item.unit_price.cents())
            .bind(item.line_total.cents())
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        }

        Ok(())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        hydrate_one(&mut *self.tx, row).await
    }

    async fn order_by_intent_for_update(&mut self, intent_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_intent_id = $1 FOR UPDATE"
        ))
        .bind(intent_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        hydrate_one(&mut *self.tx, row).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, driver_id = $3, payment_intent_id = $4, delivery_photo_ref = $5,
                delivery_notes = $6, delivered_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.driver_id.map(|d| d.as_uuid()))
        .bind(&order.payment_intent_id)
        .bind(&order.delivery_photo_ref)
        .bind(&order.delivery_notes)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!(
                "order {} does not exist",
                order.id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        self.order_with_items(row).await
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if let Some(customer_id) = filter.customer_id {
            query
                .push(" AND customer_id = ")
                .push_bind(customer_id.as_uuid());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(driver_id) = filter.driver_id {
            query.push(" AND driver_id = ").push_bind(driver_id.as_uuid());
        }
        if filter.unassigned_only {
            query.push(" AND driver_id IS NULL");
        }

        query.push(if filter.oldest_first {
            " ORDER BY created_at ASC, id ASC"
        } else {
            " ORDER BY created_at DESC, id DESC"
        });
        query
            .push(" LIMIT ")
            .push_bind(filter.limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let mut conn = self.pool.acquire().await?;
        let rows = query.build().fetch_all(&mut *conn).await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = fetch_items(&mut conn, ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                row_to_order(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn claim_order(
        &self,
        id: OrderId,
        driver_id: DriverId,
        claimable: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let statuses: Vec<String> = claimable.iter().map(|s| s.as_str().to_string()).collect();

        // One statement: the row lock taken by UPDATE makes the status and
        // driver check atomic with the write.
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET driver_id = $2, status = 'delivering', updated_at = $3
            WHERE id = $1 AND status = ANY($4) AND driver_id IS NULL
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(driver_id.as_uuid())
        .bind(at)
        .bind(statuses)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.order_with_items(row).await
    }

    async fn attach_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET payment_intent_id = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending' AND payment_intent_id IS NULL
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(intent_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.order_with_items(row).await
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>> {
        let row = sqlx::query("SELECT id, name, stock, price_cents FROM variants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn upsert_variant(&self, variant: &VariantRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO variants (id, name, stock, price_cents)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, stock = EXCLUDED.stock,
                price_cents = EXCLUDED.price_cents, updated_at = NOW()
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(&variant.name)
        .bind(variant.stock)
        .bind(variant.price.cents())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>> {
        let row = sqlx::query(&format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_driver).transpose()
    }

    async fn driver_by_user(&self, user_id: UserId) -> Result<Option<Driver>> {
        let row = sqlx::query(&format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_driver).transpose()
    }

    async fn upsert_driver(&self, driver: &Driver) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO drivers (id, user_id, available, vehicle_type, license_plate, lat, lng)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET available = EXCLUDED.available, vehicle_type = EXCLUDED.vehicle_type,
                license_plate = EXCLUDED.license_plate, lat = EXCLUDED.lat, lng = EXCLUDED.lng
            "#,
        )
        .bind(driver.id.as_uuid())
        .bind(driver.user_id.as_uuid())
        .bind(driver.available)
        .bind(&driver.vehicle_type)
        .bind(&driver.license_plate)
        .bind(driver.location.map(|p| p.lat))
        .bind(driver.location.map(|p| p.lng))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn set_driver_availability(
        &self,
        user_id: UserId,
        available: bool,
    ) -> Result<Option<Driver>> {
        let row = sqlx::query(&format!(
            "UPDATE drivers SET available = $2 WHERE user_id = $1 RETURNING {DRIVER_COLUMNS}"
        ))
        .bind(user_id.as_uuid())
        .bind(available)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_driver).transpose()
    }

    async fn set_driver_location(
        &self,
        user_id: UserId,
        point: GeoPoint,
    ) -> Result<Option<Driver>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE drivers
            SET lat = $2, lng = $3, location_updated_at = NOW()
            WHERE user_id = $1
            RETURNING {DRIVER_COLUMNS}
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(point.lat)
        .bind(point.lng)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_driver).transpose()
    }
}
