//! API endpoint implementations.

mod admin;
mod analytics;
mod auth;
mod notifications;
mod orders;
mod products;
mod sales;

pub use admin::AdminApi;
pub use analytics::AnalyticsApi;
pub use auth::AuthApi;
pub use notifications::NotificationsApi;
pub use orders::OrdersApi;
pub use products::ProductsApi;
pub use sales::SalesApi;
