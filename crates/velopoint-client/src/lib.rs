//! HTTP client SDK for the velopoint commerce platform.
//!
//! This crate provides a typed client for the platform's REST API: one
//! module per resource, a builder-configured core client, and an error
//! taxonomy that distinguishes transport failures, server errors,
//! authorization failures, and field-validation failures.
//!
//! # Example
//!
//! ```no_run
//! use velopoint_client::{VeloClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = VeloClient::builder()
//!     .base_url("http://localhost:8000/api")
//!     .bearer_token("secret")
//!     .build()?;
//!
//! // Log in and inspect the authenticated user.
//! let login = client.auth().login("dealer@velopoint.in", "hunter2").await?;
//! println!("Welcome {}", login.user.email);
//!
//! // List pending orders.
//! use velopoint_client::types::{OrderListQuery, OrderStatus};
//! let pending = client
//!     .orders()
//!     .list(OrderListQuery {
//!         status: Some(OrderStatus::Pending),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} pending orders", pending.count);
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Auth**: register, login, logout, profile, password, token refresh
//! - **Products**: catalogue CRUD, stock overview
//! - **Orders**: dealer orders and admin decisions
//! - **Sales**: billing records
//! - **Notifications**: listing, unread count, read markers
//! - **Admin**: user management, dealer orders
//! - **Analytics**: dashboards, trends, top products/dealers

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientBuilder, StaticToken, TokenSource, VeloClient};
pub use error::{Error, Result};
pub use types::*;
