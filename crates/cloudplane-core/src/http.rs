//! JSON REST client shared by the vendor service clients
//!
//! Every call carries the API key as a bearer token, uses a request timeout,
//! and maps non-success statuses through [`Error::from_status`] so a 404 is
//! always [`Error::NotFound`].

use crate::error::{Error, Result};
use reqwest::RequestBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub use reqwest::Method;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A bearer-authenticated JSON client for one vendor service
#[derive(Clone)]
pub struct RestClient {
    /// Service label used in error messages (e.g. "power")
    service: &'static str,

    /// Base URL without trailing slash
    base_url: String,

    /// API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Headers sent with every request
    headers: Vec<(String, String)>,

    http: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl RestClient {
    /// Create a client for `service` rooted at `base_url`
    ///
    /// # Returns
    ///
    /// - `Err(Error::ClientInit)`: If the key is empty or the HTTP client
    ///   cannot be built
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::client_init(format!("{service}: API key cannot be empty")));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::client_init(format!("{service}: {e}")))?;

        Ok(Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            headers: Vec::new(),
            http,
        })
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.call(Method::GET, path, query, &[], None::<&()>).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(Method::POST, path, &[], &[], Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(Method::PUT, path, &[], &[], Some(body)).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(Method::PATCH, path, &[], &[], Some(body)).await
    }

    /// DELETE `path`, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        let operation = format!("DELETE {path}");
        let request = self.request(Method::DELETE, path, &[], &[]);
        self.send(&operation, request).await?;
        Ok(())
    }

    /// Send a request and decode the JSON response
    ///
    /// An empty response body decodes as JSON `null`.
    pub async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let operation = format!("{method} {path}");
        let mut request = self.request(method, path, query, headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(&operation, request).await?;
        let text = response.text().await.map_err(|e| {
            Error::api(self.service, &operation, None, format!("Failed to read response: {e}"))
        })?;

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            Error::api(self.service, &operation, None, format!("Failed to parse response: {e}"))
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        debug!("{} {}", self.service, operation);

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{} {operation}: HTTP request failed: {e}", self.service)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::from_status(self.service, operation, status.as_u16(), &error_text));
        }

        Ok(response)
    }
}

/// Value of the `name` query parameter in a possibly relative URL
///
/// Used to follow continuation links such as `next_url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url)
        .or_else(|_| reqwest::Url::parse("http://localhost/")?.join(url))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
