//! # Backend HTTP Client
//!
//! A thin asynchronous wrapper around `reqwest` for the request-style
//! accessors. Includes middleware support for exponential backoff retries
//! and decodes the `{ success, data }` envelope every OfficeStream endpoint
//! responds with: `success:false` is folded into the same error path as a
//! transport failure, so callers see one kind of fetch failure.

use anyhow::{anyhow, bail};
use reqwest::{header::AUTHORIZATION, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// The response envelope shared by all backend endpoints.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct ServiceEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
}

/// A middleware-enabled HTTP client bound to one backend base URL.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with a 3-retry exponential backoff policy.
    ///
    /// # Errors
    /// Fails if `base_url` is not a valid absolute URL.
    pub fn new(base_url: &str, auth_token: Option<String>) -> anyhow::Result<Self> {
        // A trailing slash makes Url::join treat the last path segment as a
        // directory, which keeps prefixed base URLs intact.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let url = Url::parse(&normalized)
            .map_err(|e| anyhow!("Invalid base URL '{}': {}", base_url, e))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth_token,
        })
    }

    /// GET a resource, returning the envelope's `data`.
    pub async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, query, None::<&()>).await
    }

    /// POST a JSON body, returning the envelope's `data`.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let full_url = self.base_url.join(path.trim_start_matches('/'))?;
        let mut req = self.inner.request(method, full_url);

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} from {}", status.as_u16(), path);
        }

        let envelope: ServiceEnvelope<T> = response.json().await?;
        if !envelope.success {
            bail!("Backend reported failure for {}", path);
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("Backend returned no data for {}", path))
    }
}
