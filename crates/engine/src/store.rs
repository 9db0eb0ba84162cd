use crate::error::EngineError;
use core_types::{Order, OrderId, OrderStats, OrderStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Arc<Mutex<Order>>>,
    /// `(asset, address)` pairs handed to any order, ever.
    claimed_addresses: HashSet<(String, String)>,
}

/// The in-memory table of swap orders, keyed by id.
///
/// The map lock is only held to look up or insert an entry; each order sits
/// behind its own mutex, which is the critical section for every mutation of
/// that order. Different orders never contend with each other.
#[derive(Default)]
pub struct OrderStore {
    inner: RwLock<Inner>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new order.
    ///
    /// Fails if the id is taken or if the deposit address was already given to
    /// another order for the same asset, whatever that order's status.
    pub async fn create(&self, order: Order) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(EngineError::DuplicateOrder(order.id));
        }
        let claim = (order.source_asset.clone(), order.deposit_address.clone());
        if inner.claimed_addresses.contains(&claim) {
            return Err(EngineError::DuplicateDepositAddress {
                asset: claim.0,
                address: claim.1,
            });
        }
        inner.claimed_addresses.insert(claim);
        inner
            .orders
            .insert(order.id.clone(), Arc::new(Mutex::new(order)));
        Ok(())
    }

    async fn entry(&self, id: &OrderId) -> Option<Arc<Mutex<Order>>> {
        self.inner.read().await.orders.get(id).cloned()
    }

    /// A copy of the order, or `None` if the id is unknown.
    pub async fn get(&self, id: &OrderId) -> Option<Order> {
        let entry = self.entry(id).await?;
        let order = entry.lock().await;
        Some(order.clone())
    }

    /// Applies `mutator` to the order inside its critical section.
    ///
    /// The mutator works on a copy which is only written back when it returns
    /// `Ok`, so a rejected mutation leaves the stored order untouched.
    pub async fn update<R, F>(&self, id: &OrderId, mutator: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Order) -> Result<R, EngineError>,
    {
        let entry = self
            .entry(id)
            .await
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let mut stored = entry.lock().await;
        let mut draft = stored.clone();
        let result = mutator(&mut draft)?;
        *stored = draft;
        Ok(result)
    }

    async fn snapshot(&self) -> Vec<Order> {
        let entries: Vec<_> = self.inner.read().await.orders.values().cloned().collect();
        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            orders.push(entry.lock().await.clone());
        }
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    /// Orders currently in `status`, oldest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|order| order.status == status)
            .collect()
    }

    /// Every order, oldest first.
    pub async fn all(&self) -> Vec<Order> {
        self.snapshot().await
    }

    pub async fn stats(&self) -> OrderStats {
        let mut stats = OrderStats::default();
        for order in self.snapshot().await {
            stats.record(order.status);
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use core_types::{DepositAddress, NewOrder};
    use rust_decimal_macros::dec;

    fn order(address: &str) -> Order {
        Order::open(
            NewOrder {
                source_asset: "BTC".to_string(),
                dest_asset: "USDT".to_string(),
                source_amount: dec!(0.001),
                dest_amount: dec!(59.82),
                deposit: DepositAddress {
                    address: address.to_string(),
                    network: "BTC".to_string(),
                    memo: None,
                },
                destination_address: "0x521b7FE4D6C6c21B42336E8F2D73C04B142FD6d7".to_string(),
            },
            Utc::now(),
            Duration::seconds(1200),
        )
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = OrderStore::new();
        assert!(store.get(&OrderId::from("SWAP_0_00000000")).await.is_none());
        let err = store
            .update(&OrderId::from("SWAP_0_00000000"), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn deposit_address_is_never_reused() {
        let store = OrderStore::new();
        let first = order("bc1qsame");
        let first_id = first.id.clone();
        store.create(first).await.unwrap();
        store.update(&first_id, |o| Ok(o.expire()?)).await.unwrap();

        let err = store.create(order("bc1qsame")).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDepositAddress { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_order_untouched() {
        let store = OrderStore::new();
        let order = order("bc1qa");
        let id = order.id.clone();
        store.create(order).await.unwrap();

        let result: Result<(), _> = store
            .update(&id, |o| {
                o.error = Some("half-written".to_string());
                Err(EngineError::Validation("nope".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(&id).await.unwrap().error, None);
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_interleave() {
        let store = Arc::new(OrderStore::new());
        let order = order("bc1qb");
        let id = order.id.clone();
        store.create(order).await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    store
                        .update(&id, |o| {
                            o.source_amount += dec!(1);
                            Ok(())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.get(&id).await.unwrap().source_amount, dec!(50.001));
    }

    #[tokio::test]
    async fn listing_and_stats_reflect_statuses() {
        let store = OrderStore::new();
        let expired = order("a1");
        let expired_id = expired.id.clone();
        store.create(expired).await.unwrap();
        store.create(order("a2")).await.unwrap();
        store.update(&expired_id, |o| Ok(o.expire()?)).await.unwrap();

        assert_eq!(store.list_by_status(OrderStatus::Pending).await.len(), 1);
        assert_eq!(store.list_by_status(OrderStatus::Expired).await[0].id, expired_id);
        let stats = store.stats().await;
        assert_eq!((stats.total, stats.pending, stats.expired), (2, 1, 1));
    }
}
