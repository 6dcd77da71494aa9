//! Orders API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{CreateOrderRequest, Order, OrderDecisionRequest, OrderListQuery, Paginated};

/// Orders API client.
pub struct OrdersApi {
    client: VeloClient,
}

impl OrdersApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// List orders, filtered server-side by the caller's role.
    pub async fn list(&self, query: OrderListQuery) -> Result<Paginated<Order>> {
        self.client.get_with_query("orders/", &query).await
    }

    /// Get an order by ID.
    pub async fn get(&self, id: i64) -> Result<Order> {
        self.client.get(&format!("orders/{}/", id)).await
    }

    /// Create an order (dealer).
    pub async fn create(&self, request: CreateOrderRequest) -> Result<Order> {
        self.client.post("orders/create/", &request).await
    }

    /// Approve an order (admin).
    pub async fn approve(&self, id: i64, request: OrderDecisionRequest) -> Result<Order> {
        self.client
            .post(&format!("orders/{}/approve/", id), &request)
            .await
    }

    /// Reject an order (admin).
    pub async fn reject(&self, id: i64, request: OrderDecisionRequest) -> Result<Order> {
        self.client
            .post(&format!("orders/{}/reject/", id), &request)
            .await
    }

    /// Mark an order as shipped (admin).
    pub async fn ship(&self, id: i64, request: OrderDecisionRequest) -> Result<Order> {
        self.client
            .post(&format!("orders/{}/ship/", id), &request)
            .await
    }
}
