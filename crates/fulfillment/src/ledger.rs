//! Inventory ledger: stock reservation and restoration.
//!
//! Both operations run inside a caller-owned transaction, so they commit or
//! roll back together with the order write that motivated them.

use common::VariantId;
use domain::{StockLine, VariantRecord};
use order_store::StoreTx;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Locks every variant up front, then checks and decrements them in
/// declaration order.
///
/// Returns the variant records as read before the decrement, in line order,
/// so callers can snapshot names and prices. Fails the whole unit on the
/// first line that cannot be satisfied; the caller's transaction is expected
/// to be dropped, which undoes earlier decrements.
pub async fn reserve(tx: &mut dyn StoreTx, lines: &[StockLine]) -> Result<Vec<VariantRecord>> {
    let ids: Vec<VariantId> = lines.iter().map(|line| line.variant_id).collect();
    let mut locked = tx.variants_for_update(&ids).await?;
    let mut reserved = Vec::with_capacity(lines.len());

    for line in lines {
        let variant = locked
            .get_mut(&line.variant_id)
            .ok_or_else(|| CoreError::not_found("Variant", line.variant_id))?;

        if !variant.has_stock_for(line.quantity) {
            return Err(CoreError::InsufficientStock(variant.name.clone()));
        }

        reserved.push(variant.clone());
        // Repeated lines for one variant draw from what is left.
        variant.stock -= line.delta();
        tx.adjust_stock(line.variant_id, -line.delta()).await?;
        debug!(variant_id = %line.variant_id, quantity = line.quantity, "Stock reserved");
    }

    Ok(reserved)
}

/// Returns each line's quantity to stock.
pub async fn restore(tx: &mut dyn StoreTx, lines: &[StockLine]) -> Result<()> {
    for line in lines {
        tx.adjust_stock(line.variant_id, line.delta()).await?;
        debug!(variant_id = %line.variant_id, quantity = line.quantity, "Stock restored");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::VariantId;
    use domain::Money;
    use order_store::{InMemoryOrderStore, OrderStore};

    use super::*;
    use crate::error::ErrorKind;

    async fn seed(store: &InMemoryOrderStore, name: &str, stock: i64) -> VariantRecord {
        let v = VariantRecord::new(VariantId::new(), name, stock, Money::from_cents(1000));
        store.upsert_variant(&v).await.unwrap();
        v
    }

    async fn stock_of(store: &InMemoryOrderStore, v: &VariantRecord) -> i64 {
        store.get_variant(v.id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn reserve_then_restore_round_trips() {
        let store = InMemoryOrderStore::new();
        let a = seed(&store, "A", 5).await;
        let b = seed(&store, "B", 3).await;
        let c = seed(&store, "C", 9).await;
        let lines = [
            StockLine::new(a.id, 2),
            StockLine::new(b.id, 3),
            StockLine::new(c.id, 1),
        ];

        let mut tx = store.begin().await.unwrap();
        let reserved = reserve(tx.as_mut(), &lines).await.unwrap();
        assert_eq!(
            reserved.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            ["A", "B", "C"]
        );
        tx.commit().await.unwrap();
        assert_eq!(stock_of(&store, &a).await, 3);
        assert_eq!(stock_of(&store, &b).await, 0);

        let mut tx = store.begin().await.unwrap();
        restore(tx.as_mut(), &lines).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(stock_of(&store, &a).await, 5);
        assert_eq!(stock_of(&store, &b).await, 3);
        assert_eq!(stock_of(&store, &c).await, 9);
    }

    #[tokio::test]
    async fn insufficient_stock_names_the_variant() {
        let store = InMemoryOrderStore::new();
        let a = seed(&store, "Tulips", 5).await;
        let b = seed(&store, "Orchid", 1).await;

        let mut tx = store.begin().await.unwrap();
        let err = reserve(tx.as_mut(), &[StockLine::new(a.id, 2), StockLine::new(b.id, 2)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err.to_string(), "Insufficient stock for Orchid");
        drop(tx);

        assert_eq!(stock_of(&store, &a).await, 5);
    }

    #[tokio::test]
    async fn unknown_variant_is_not_found() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = reserve(tx.as_mut(), &[StockLine::new(VariantId::new(), 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn repeated_variant_accumulates() {
        let store = InMemoryOrderStore::new();
        let a = seed(&store, "A", 3).await;

        let mut tx = store.begin().await.unwrap();
        let err = reserve(tx.as_mut(), &[StockLine::new(a.id, 2), StockLine::new(a.id, 2)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }
}
