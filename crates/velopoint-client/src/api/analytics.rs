//! Analytics API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{
    AnalyticsRangeQuery, DashboardStats, PaymentMethodStat, RevenuePoint, TopDealer, TopProduct,
};

/// Analytics API client.
pub struct AnalyticsApi {
    client: VeloClient,
}

impl AnalyticsApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// Admin dashboard stats.
    pub async fn admin_dashboard(&self) -> Result<DashboardStats> {
        self.client.get("analytics/admin/dashboard/").await
    }

    /// Raw sales analytics over a date range.
    pub async fn sales(&self, query: AnalyticsRangeQuery) -> Result<serde_json::Value> {
        self.client.get_with_query("analytics/sales/", &query).await
    }

    /// Sales dashboard for dealers and employees.
    pub async fn sales_dashboard(&self) -> Result<DashboardStats> {
        self.client.get("analytics/sales/dashboard/").await
    }

    /// Revenue trend line.
    pub async fn revenue_trends(&self, query: AnalyticsRangeQuery) -> Result<Vec<RevenuePoint>> {
        self.client
            .get_with_query("analytics/revenue-trends/", &query)
            .await
    }

    /// Top products by units sold.
    pub async fn top_products(&self, query: AnalyticsRangeQuery) -> Result<Vec<TopProduct>> {
        self.client
            .get_with_query("analytics/top-products/", &query)
            .await
    }

    /// Top dealers by revenue.
    pub async fn top_dealers(&self, query: AnalyticsRangeQuery) -> Result<Vec<TopDealer>> {
        self.client
            .get_with_query("analytics/top-dealers/", &query)
            .await
    }

    /// Sales split by payment method.
    pub async fn payment_methods(
        &self,
        query: AnalyticsRangeQuery,
    ) -> Result<Vec<PaymentMethodStat>> {
        self.client
            .get_with_query("analytics/payment-methods/", &query)
            .await
    }
}
