//! Authentication API.

use crate::client::VeloClient;
use crate::error::Result;
use crate::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, ProfileResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, RegisterResponse, UpdateProfileRequest, User,
};

/// Authentication API client.
pub struct AuthApi {
    client: VeloClient,
}

impl AuthApi {
    pub(crate) fn new(client: VeloClient) -> Self {
        Self { client }
    }

    /// Register a new customer account.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        self.client.post("auth/register/", &request).await
    }

    /// Register a dealer account (admin only).
    pub async fn register_dealer(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        self.client.post("auth/register-dealer/", &request).await
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        self.client
            .post(
                "auth/login/",
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await
    }

    /// Invalidate the given refresh token server-side.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post(
                "auth/logout/",
                &RefreshRequest {
                    refresh: refresh_token.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Get the current user's profile.
    pub async fn profile(&self) -> Result<User> {
        self.client.get("auth/me/").await
    }

    /// Update the current user's profile.
    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<ProfileResponse> {
        self.client.put("auth/profile/", &request).await
    }

    /// Change the current user's password.
    pub async fn change_password(&self, request: ChangePasswordRequest) -> Result<()> {
        let _: serde_json::Value = self.client.post("auth/change-password/", &request).await?;
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh: &str) -> Result<RefreshResponse> {
        self.client
            .post(
                "auth/token/refresh/",
                &RefreshRequest {
                    refresh: refresh.to_string(),
                },
            )
            .await
    }

    /// Delete the current user's account.
    pub async fn delete_account(&self, refresh: &str) -> Result<()> {
        self.client
            .delete_with_body(
                "auth/delete-account/",
                &RefreshRequest {
                    refresh: refresh.to_string(),
                },
            )
            .await
    }
}
