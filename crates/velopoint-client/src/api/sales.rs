//! Sales (billing) API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{CreateSaleRequest, Paginated, Sale, SaleListQuery};

/// Sales API client.
pub struct SalesApi {
    client: VeloClient,
}

impl SalesApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// List sales visible to the caller.
    pub async fn list(&self, query: SaleListQuery) -> Result<Paginated<Sale>> {
        self.client.get_with_query("billing/sales/", &query).await
    }

    /// Get a sale by ID.
    pub async fn get(&self, id: i64) -> Result<Sale> {
        self.client.get(&format!("billing/sales/{}/", id)).await
    }

    /// Record a sale (dealer or employee). Activates the warranty.
    pub async fn create(&self, request: CreateSaleRequest) -> Result<Sale> {
        self.client.post("billing/sales/create/", &request).await
    }
}
