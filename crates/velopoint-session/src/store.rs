//! The session store.
//!
//! Owns the authenticated-user state for the process: who is logged in,
//! whether a credential is persisted, and the last auth error for UI
//! display. All durable writes go through the [`SessionVault`]; all
//! network calls go through the [`AuthAdapter`] seam.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use velopoint_client::api::AuthApi;
use velopoint_client::types::{LoginResponse, ProfileResponse, UpdateProfileRequest, User};
use velopoint_client::VeloClient;

use crate::error::Result;
use crate::vault::{SessionVault, ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT, SESSION_SLOT};

/// Fallback message when a login failure carries no server text.
const LOGIN_FALLBACK: &str = "Login failed";

/// Fallback message when a profile update failure carries no server text.
const PROFILE_FALLBACK: &str = "Failed to update profile";

/// Current session state.
///
/// `is_authenticated` is true iff `user` is set and an access credential
/// is persisted in the vault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// The authenticated user, if any.
    pub user: Option<User>,
    /// Whether a user is logged in.
    pub is_authenticated: bool,
    /// Whether a session operation is in flight.
    pub is_loading: bool,
    /// Message from the most recent failed operation.
    pub last_error: Option<String>,
}

/// The minimal projection persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProjection {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

/// Where a freshly logged-in user should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Role-based dashboard path; `/` for unrecognized roles.
    pub path: String,
}

/// Network seam for the operations the store delegates.
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> velopoint_client::Result<LoginResponse>;
    async fn logout(&self, refresh_token: &str) -> velopoint_client::Result<()>;
    async fn update_profile(
        &self,
        request: UpdateProfileRequest,
    ) -> velopoint_client::Result<ProfileResponse>;
}

#[async_trait]
impl AuthAdapter for AuthApi {
    async fn login(&self, email: &str, password: &str) -> velopoint_client::Result<LoginResponse> {
        AuthApi::login(self, email, password).await
    }

    async fn logout(&self, refresh_token: &str) -> velopoint_client::Result<()> {
        AuthApi::logout(self, refresh_token).await
    }

    async fn update_profile(
        &self,
        request: UpdateProfileRequest,
    ) -> velopoint_client::Result<ProfileResponse> {
        AuthApi::update_profile(self, request).await
    }
}

struct StoreInner {
    state: RwLock<SessionState>,
    watch_tx: watch::Sender<SessionState>,
    vault: Arc<dyn SessionVault>,
    auth: Arc<dyn AuthAdapter>,
}

/// Session store handle. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Create a store backed by the given client and vault.
    pub fn new(client: &VeloClient, vault: Arc<dyn SessionVault>) -> Self {
        Self::with_adapter(Arc::new(client.auth()), vault)
    }

    /// Create a store with a custom auth adapter (used by tests).
    pub fn with_adapter(auth: Arc<dyn AuthAdapter>, vault: Arc<dyn SessionVault>) -> Self {
        let (watch_tx, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(SessionState::default()),
                watch_tx,
                vault,
                auth,
            }),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.watch_tx.subscribe()
    }

    fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.inner.state.write();
        f(&mut state);
        let snapshot = state.clone();
        drop(state);
        self.inner.watch_tx.send_replace(snapshot);
    }

    async fn persist_projection(&self, user: &User) -> Result<()> {
        let projection = SessionProjection {
            user: Some(user.clone()),
            is_authenticated: true,
        };
        self.inner
            .vault
            .set(SESSION_SLOT, &serde_json::to_string(&projection)?)
            .await
    }

    /// Restore the session from the vault at process start.
    ///
    /// No network call is made; the persisted session is trusted until a
    /// later API call fails with an authorization error. A malformed
    /// projection resets to anonymous.
    pub async fn check_auth(&self) -> SessionState {
        let token = self.inner.vault.get(ACCESS_TOKEN_SLOT).await.ok().flatten();
        let raw = self.inner.vault.get(SESSION_SLOT).await.ok().flatten();

        match (token, raw) {
            (Some(_), Some(raw)) => match serde_json::from_str::<SessionProjection>(&raw) {
                Ok(SessionProjection {
                    user: Some(user),
                    is_authenticated: true,
                }) => {
                    debug!(user_id = user.id, "restored persisted session");
                    self.update_state(|s| {
                        s.user = Some(user);
                        s.is_authenticated = true;
                    });
                }
                _ => {
                    warn!("persisted session malformed, resetting to anonymous");
                    self.update_state(|s| {
                        s.user = None;
                        s.is_authenticated = false;
                    });
                }
            },
            _ => {
                // Nothing (or only half a session) persisted; stay anonymous.
            }
        }

        self.snapshot()
    }

    /// Log in, persist the session, and return the role-based redirect.
    pub async fn login(&self, email: &str, password: &str) -> Result<Redirect> {
        self.update_state(|s| {
            s.is_loading = true;
            s.last_error = None;
        });

        match self.inner.auth.login(email, password).await {
            Ok(response) => {
                self.inner
                    .vault
                    .set(ACCESS_TOKEN_SLOT, &response.access)
                    .await?;
                self.inner
                    .vault
                    .set(REFRESH_TOKEN_SLOT, &response.refresh)
                    .await?;
                self.persist_projection(&response.user).await?;

                let redirect = Redirect {
                    path: response.user.role.dashboard_path().to_string(),
                };
                debug!(user_id = response.user.id, "login succeeded");
                self.update_state(|s| {
                    s.user = Some(response.user);
                    s.is_authenticated = true;
                    s.is_loading = false;
                    s.last_error = None;
                });
                Ok(redirect)
            }
            Err(e) => {
                let message = e.message_or(LOGIN_FALLBACK);
                self.update_state(|s| {
                    s.is_loading = false;
                    s.last_error = Some(message);
                });
                Err(e.into())
            }
        }
    }

    /// Log out.
    ///
    /// Server-side invalidation is best effort; local state and the vault
    /// are always cleared, so a failed server call can never leave the
    /// client looking authenticated.
    pub async fn logout(&self) {
        self.update_state(|s| s.is_loading = true);

        if let Ok(Some(refresh)) = self.inner.vault.get(REFRESH_TOKEN_SLOT).await {
            if let Err(e) = self.inner.auth.logout(&refresh).await {
                warn!(error = %e, "server-side logout failed, clearing local session anyway");
            }
        }

        if let Err(e) = self.inner.vault.clear().await {
            warn!(error = %e, "failed to clear session vault");
        }

        self.update_state(|s| {
            *s = SessionState::default();
        });
    }

    /// Update the current user's profile.
    ///
    /// On failure the prior user is preserved and the error is recorded.
    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<User> {
        self.update_state(|s| {
            s.is_loading = true;
            s.last_error = None;
        });

        match self.inner.auth.update_profile(request).await {
            Ok(response) => {
                self.persist_projection(&response.user).await?;
                self.update_state(|s| {
                    s.user = Some(response.user.clone());
                    s.is_loading = false;
                });
                Ok(response.user)
            }
            Err(e) => {
                let message = e.message_or(PROFILE_FALLBACK);
                self.update_state(|s| {
                    s.is_loading = false;
                    s.last_error = Some(message);
                });
                Err(e.into())
            }
        }
    }

    /// Directly install a user, e.g. after an external registration flow
    /// that already stored tokens. Always authenticates.
    pub async fn set_user(&self, user: User) -> Result<()> {
        self.persist_projection(&user).await?;
        self.update_state(|s| {
            s.user = Some(user);
            s.is_authenticated = true;
            s.last_error = None;
        });
        Ok(())
    }

    /// Clear the recorded error.
    pub fn clear_error(&self) {
        self.update_state(|s| s.last_error = None);
    }
}
