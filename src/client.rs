use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{ACCEPT, HeaderValue};
use http::{HeaderMap, StatusCode};
use reqwest::Url;
use reqwest::cookie::Jar;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::util::env::Env;

/// Read access to the backend's JSON API.
///
/// Implementations attach whatever ambient credentials the backend needs (session cookies for
/// [`HttpApiClient`]). `Ok(None)` means the server answered successfully but sent no payload.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Option<Value>>;
}

#[async_trait]
impl<C: ApiClient + ?Sized> ApiClient for Arc<C> {
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Option<Value>> {
        (**self).get_json(path, query).await
    }
}

/// `reqwest`-backed [`ApiClient`] holding a cookie store, so session cookies set by the backend
/// are replayed on later requests.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> HttpApiClientBuilder {
        HttpApiClientBuilder {
            base_url: base_url.to_string(),
            session_cookie: None,
            timeout: None,
        }
    }

    pub fn from_env(env: &Env) -> ApiResult<Self> {
        Self::builder(&env.backend_url)
            .session_cookie(env.session_cookie.as_deref())
            .timeout(env.http_timeout_secs.map(Duration::from_secs))
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` below the base URL, keeping any path prefix the base carries
    /// (`https://host/app/` + `/api/x` is `https://host/app/api/x`).
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiErr::InvalidUrl(format!("{path}: {e}")))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    #[instrument(skip(self, query), fields(base = %self.base_url))]
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Option<Value>> {
        let uri = self.endpoint(path)?;
        let res = self.client.get(uri).query(query).send().await?;

        let status = res.status();
        if !status.is_success() {
            tracing::error!(code = %status, "non-success response");

            // attach the error body if the server sent JSON along with the status; a body that
            // fails to arrive still leaves the status as the error
            let body = res
                .bytes()
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok());
            if let Some(body) = &body {
                tracing::debug!(?body, "error body in response");
            }

            return Err(ApiErr::Status { status, body });
        }

        let bytes = res.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!(code = %status, "response carried no payload");
            return Ok(None);
        }

        tracing::debug!(code = %status, body_len = bytes.len(), "received payload");
        Ok(Some(serde_json::from_slice::<Value>(&bytes)?))
    }
}

pub struct HttpApiClientBuilder {
    base_url: String,
    session_cookie: Option<String>,
    timeout: Option<Duration>,
}

impl HttpApiClientBuilder {
    /// Seeds the cookie store with a `name=value` session cookie scoped to the base URL.
    pub fn session_cookie(mut self, cookie: Option<&str>) -> Self {
        self.session_cookie = cookie.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub fn build(self) -> ApiResult<HttpApiClient> {
        let mut base_url = Url::parse(&self.base_url)
            .map_err(|e| ApiErr::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        // `Url::join` replaces the last segment unless the base ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &self.session_cookie {
            jar.add_cookie_str(cookie, &base_url);
            tracing::debug!("seeded session cookie");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .default_headers(headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(HttpApiClient {
            client: builder.build()?,
            base_url,
        })
    }
}

pub type ApiResult<T> = core::result::Result<T, ApiErr>;

#[derive(Debug, Error)]
pub enum ApiErr {
    /// The request could not be completed at all.
    #[error("reqwest error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with {status}")]
    Status {
        status: StatusCode,
        body: Option<Value>,
    },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url ({0})")]
    InvalidUrl(String),
}
