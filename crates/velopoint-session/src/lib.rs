//! Persisted session store for the velopoint platform client.
//!
//! This crate owns the process's authenticated-user state:
//! - a [`SessionStore`] exposing login/logout/profile operations and a
//!   change subscription,
//! - a [`SessionVault`] trait over durable named-slot storage, with
//!   file-backed and in-memory implementations,
//! - a [`VaultTokenSource`] adapter so the HTTP client always sends the
//!   credential of the currently persisted session.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use velopoint_client::VeloClient;
//! use velopoint_session::{FileVault, SessionStore, VaultTokenSource};
//!
//! let vault = Arc::new(FileVault::default_location()?);
//! let client = VeloClient::builder()
//!     .base_url("http://localhost:8000/api")
//!     .token_source(Arc::new(VaultTokenSource(vault.clone())))
//!     .build()?;
//!
//! let session = SessionStore::new(&client, vault);
//! session.check_auth().await;
//! ```

mod error;
mod store;
mod vault;

pub use error::{Error, Result};
pub use store::{AuthAdapter, Redirect, SessionProjection, SessionState, SessionStore};
pub use vault::{
    FileVault, MemoryVault, SessionVault, VaultTokenSource, ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT,
    SESSION_SLOT, VAULT_FILE,
};
