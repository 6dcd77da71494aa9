//! Products API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{Product, ProductListQuery, ProductRequest, StockOverview};

/// Products API client.
pub struct ProductsApi {
    client: VeloClient,
}

impl ProductsApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// List products (public).
    ///
    /// The endpoint has served three payload shapes over time: a bare
    /// array, a `{results: []}` envelope, and a `{products: []}`
    /// envelope. Anything else coerces to an empty list.
    pub async fn list(&self, query: ProductListQuery) -> Result<Vec<Product>> {
        let payload: serde_json::Value = self.client.get_with_query("products/", &query).await?;
        Ok(Self::coerce_list(payload))
    }

    fn coerce_list(payload: serde_json::Value) -> Vec<Product> {
        let items = match payload {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => match map.remove("results").or_else(|| map.remove("products")) {
                Some(serde_json::Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }

    /// Get a product by ID.
    pub async fn get(&self, id: i64) -> Result<Product> {
        self.client.get(&format!("products/{}/", id)).await
    }

    /// Get a product by slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Product> {
        self.client.get(&format!("products/slug/{}/", slug)).await
    }

    /// Create a product (admin only).
    pub async fn create(&self, request: ProductRequest) -> Result<Product> {
        self.client.post("products/admin/create/", &request).await
    }

    /// Update a product (admin only).
    pub async fn update(&self, id: i64, request: ProductRequest) -> Result<Product> {
        self.client
            .put(&format!("products/admin/{}/update/", id), &request)
            .await
    }

    /// Delete a product (admin only).
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .delete(&format!("products/admin/{}/delete/", id))
            .await
    }

    /// Get the admin stock overview.
    pub async fn stock_overview(&self) -> Result<StockOverview> {
        self.client.get("products/admin/stock/overview/").await
    }
}
