//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use url::Url;

use crate::api::{
    AdminApi, AnalyticsApi, AuthApi, NotificationsApi, OrdersApi, ProductsApi, SalesApi,
};
use crate::error::{Error, Result};
use crate::types::ErrorEnvelope;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default API origin for local development.
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable selecting the API origin.
const BASE_URL_ENV: &str = "VELOPOINT_API_URL";

/// Source of the current access credential.
///
/// Authenticated requests ask the source for a token at send time, so a
/// login or logout elsewhere in the process takes effect on the next
/// request. Returning `None` sends the request unauthenticated.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// The current access token, if any.
    async fn access_token(&self) -> Option<String>;
}

/// Token source holding a fixed credential.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Token source for unauthenticated clients.
#[derive(Debug, Clone, Default)]
struct NoToken;

#[async_trait]
impl TokenSource for NoToken {
    async fn access_token(&self) -> Option<String> {
        None
    }
}

/// velopoint API client.
///
/// Provides typed access to all platform endpoints.
///
/// # Example
///
/// ```no_run
/// use velopoint_client::VeloClient;
///
/// # async fn example() -> velopoint_client::Result<()> {
/// let client = VeloClient::builder()
///     .base_url("http://localhost:8000/api")
///     .bearer_token("secret")
///     .build()?;
///
/// let products = client.products().list(Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VeloClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Source of the bearer credential.
    pub(crate) token_source: Arc<dyn TokenSource>,
}

impl VeloClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from the environment.
    ///
    /// Reads `VELOPOINT_API_URL`, falling back to the local development
    /// endpoint when unset.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::builder().base_url(base_url).build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the products API.
    pub fn products(&self) -> ProductsApi {
        ProductsApi::new(self.clone())
    }

    /// Access the orders API.
    pub fn orders(&self) -> OrdersApi {
        OrdersApi::new(self.clone())
    }

    /// Access the sales API.
    pub fn sales(&self) -> SalesApi {
        SalesApi::new(self.clone())
    }

    /// Access the notifications API.
    pub fn notifications(&self) -> NotificationsApi {
        NotificationsApi::new(self.clone())
    }

    /// Access the admin API.
    pub fn admin(&self) -> AdminApi {
        AdminApi::new(self.clone())
    }

    /// Access the analytics API.
    pub fn analytics(&self) -> AnalyticsApi {
        AnalyticsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Attach the current credential, if any, to a request.
    async fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.inner.token_source.access_token().await {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let req = self.inner.http.get(url).timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;
        self.handle_response(response).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let req = self
            .inner
            .http
            .get(url)
            .query(query)
            .timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;
        self.handle_response(response).await
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let req = self
            .inner
            .http
            .post(url)
            .json(body)
            .timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;
        self.handle_response(response).await
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let req = self
            .inner
            .http
            .put(url)
            .json(body)
            .timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;
        self.handle_response(response).await
    }

    /// Make a PATCH request.
    pub(crate) async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let req = self
            .inner
            .http
            .patch(url)
            .json(body)
            .timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;
        self.handle_response(response).await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        let req = self.inner.http.delete(url).timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        Ok(())
    }

    /// Make a DELETE request carrying a JSON body.
    pub(crate) async fn delete_with_body<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let req = self
            .inner
            .http
            .delete(url)
            .json(body)
            .timeout(self.inner.timeout);
        let response = self.authorize(req).await.send().await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        Ok(())
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();

        let envelope = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope,
            Err(_) => {
                return Error::Http {
                    status,
                    message: format!("HTTP {}", status),
                };
            }
        };

        let message = envelope
            .message
            .or(envelope.detail)
            .unwrap_or_else(|| format!("HTTP {}", status));

        if status == 401 || status == 403 {
            return Error::Unauthorized { status, message };
        }

        // A 400 whose body is a field -> [messages] map is a validation
        // failure; anything else keeps the envelope message.
        if status == 400 {
            let fields: std::collections::HashMap<String, Vec<String>> = envelope
                .fields
                .iter()
                .filter_map(|(name, value)| {
                    let messages: Vec<String> = value
                        .as_array()?
                        .iter()
                        .filter_map(|m| m.as_str().map(str::to_string))
                        .collect();
                    (!messages.is_empty()).then(|| (name.clone(), messages))
                })
                .collect();

            if !fields.is_empty() {
                return Error::Validation { fields };
            }
        }

        Error::Http { status, message }
    }
}

/// Builder for creating a VeloClient.
pub struct ClientBuilder {
    base_url: Option<String>,
    token_source: Option<Arc<dyn TokenSource>>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token_source: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the base URL for the API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the source of the bearer credential.
    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    /// Use a fixed bearer token.
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.token_source(Arc::new(StaticToken(token.into())))
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<VeloClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL so joins append path segments.
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("velopoint-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(VeloClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                token_source: self.token_source.unwrap_or_else(|| Arc::new(NoToken)),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
