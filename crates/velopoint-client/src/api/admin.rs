//! Admin API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{
    DashboardStats, Order, OrderDecisionRequest, OrderListQuery, Paginated, RegisterRequest,
    RegisterResponse, UpdateProfileRequest, User, UserListQuery,
};

/// Admin API client.
pub struct AdminApi {
    client: VeloClient,
}

impl AdminApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// Dashboard headline stats.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.client.get("analytics/admin/dashboard/").await
    }

    /// List all users.
    pub async fn users(&self, query: UserListQuery) -> Result<Paginated<User>> {
        self.client.get_with_query("auth/users/", &query).await
    }

    /// Create a dealer account.
    pub async fn create_dealer(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        self.client.post("auth/register-dealer/", &request).await
    }

    /// Update a user.
    pub async fn update_user(&self, user_id: i64, request: UpdateProfileRequest) -> Result<User> {
        self.client
            .patch(&format!("auth/users/{}/", user_id), &request)
            .await
    }

    /// Delete a user.
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        self.client.delete(&format!("auth/users/{}/", user_id)).await
    }

    /// List all dealer orders.
    pub async fn orders(&self, query: OrderListQuery) -> Result<Paginated<Order>> {
        self.client.get_with_query("orders/dealer/", &query).await
    }

    /// Get a dealer order with full details.
    pub async fn order(&self, order_id: i64) -> Result<Order> {
        self.client.get(&format!("orders/dealer/{}/", order_id)).await
    }

    /// Approve a dealer order.
    pub async fn approve_order(
        &self,
        order_id: i64,
        request: OrderDecisionRequest,
    ) -> Result<Order> {
        self.client
            .post(&format!("orders/dealer/{}/approve/", order_id), &request)
            .await
    }

    /// Reject a dealer order.
    pub async fn reject_order(
        &self,
        order_id: i64,
        request: OrderDecisionRequest,
    ) -> Result<Order> {
        self.client
            .post(&format!("orders/dealer/{}/reject/", order_id), &request)
            .await
    }

    /// Mark a dealer order as shipped.
    pub async fn ship_order(&self, order_id: i64, request: OrderDecisionRequest) -> Result<Order> {
        self.client
            .post(&format!("orders/dealer/{}/ship/", order_id), &request)
            .await
    }
}
