use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use super::requests::CreateOrderRequest;
use super::responses::OrderResponse;

/// In-memory order book backing the demo routes.
#[derive(Default)]
pub struct OrderStore {
    orders: RwLock<HashMap<u64, OrderResponse>>,
    next_id: RwLock<u64>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, request: CreateOrderRequest) -> OrderResponse {
        let mut next_id = self.next_id.write().await;
        *next_id += 1;

        let order = OrderResponse {
            id: *next_id,
            item: request.item,
            quantity: request.quantity,
            created_at: Utc::now(),
        };
        self.orders.write().await.insert(order.id, order.clone());

        info!("Created order {}", order.id);
        order
    }

    pub async fn get(&self, id: u64) -> Option<OrderResponse> {
        self.orders.read().await.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_increase_from_one() {
        let store = OrderStore::new();
        let first = store
            .create(CreateOrderRequest { item: "kayak".into(), quantity: 1 })
            .await;
        let second = store
            .create(CreateOrderRequest { item: "paddle".into(), quantity: 2 })
            .await;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.get(2).await.unwrap().item, "paddle");
        assert!(store.get(3).await.is_none());
    }
}
