//! Request executor
//!
//! Issues a request with the standard storefront headers, classifies the
//! response, and turns the classification into a `Payload` or a
//! `RequestError`. Headers are rebuilt from the credential store on every
//! call so a token stored by a login is picked up by the very next request,
//! including the replay of the call that triggered the login.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use storefront_auth::{CredentialStore, SELLER_LOGIN_PATH, STORE_CREDENTIAL_HEADER, TokenSlot};
use tracing::{debug, info, instrument, warn};

use crate::call::{BoxFuture, Payload, RetryableCall};
use crate::classify::{Classification, classify_response};
use crate::error::{RequestError, Result};
use crate::metrics;
use crate::prompt::Navigator;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reaction to a 401/403 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedPolicy {
    /// Distinguish store-credential from user-auth failures; the latter
    /// yield a replayable `AuthenticationRequired`.
    #[default]
    Challenge,
    /// Clear the token, signal navigation to the login page, never retry.
    ForceReauth,
}

/// Per-executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Prefix for relative request paths
    pub base_url: String,
    /// Which bearer token to attach
    pub slot: TokenSlot,
    pub on_unauthorized: UnauthorizedPolicy,
    /// Navigation target reported on `ForceReauth`
    pub login_path: String,
    pub timeout: Duration,
}

impl ExecutorOptions {
    /// Customer storefront settings: challenge on 401/403.
    pub fn challenge(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            slot: TokenSlot::Customer,
            on_unauthorized: UnauthorizedPolicy::Challenge,
            login_path: SELLER_LOGIN_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Seller admin settings: any 401/403 ends the session.
    pub fn force_reauth(base_url: impl Into<String>, login_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            slot: TokenSlot::Seller,
            on_unauthorized: UnauthorizedPolicy::ForceReauth,
            login_path: login_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Cheap-to-clone handle; clones share the HTTP client and credential store.
#[derive(Clone)]
pub struct RequestExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    http: reqwest::Client,
    store: Arc<CredentialStore>,
    options: ExecutorOptions,
    navigator: Option<Arc<dyn Navigator>>,
}

impl RequestExecutor {
    pub fn new(
        http: reqwest::Client,
        store: Arc<CredentialStore>,
        options: ExecutorOptions,
    ) -> Self {
        Self::build(http, store, options, None)
    }

    /// Executor that reports force-reauth redirects to `navigator`.
    pub fn with_navigator(
        http: reqwest::Client,
        store: Arc<CredentialStore>,
        options: ExecutorOptions,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::build(http, store, options, Some(navigator))
    }

    fn build(
        http: reqwest::Client,
        store: Arc<CredentialStore>,
        options: ExecutorOptions,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> Self {
        debug!(
            base_url = %options.base_url,
            slot = options.slot.label(),
            policy = ?options.on_unauthorized,
            "request executor created"
        );
        Self {
            inner: Arc::new(ExecutorInner {
                http,
                store,
                options,
                navigator,
            }),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.inner.options
    }

    /// Standard headers from the current credential store contents.
    ///
    /// Values the HTTP layer cannot carry (control characters, non-ASCII)
    /// are skipped with a warning rather than failing the request.
    pub async fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(credential) = self.inner.store.store_credential().await {
            insert_sensitive(&mut headers, STORE_CREDENTIAL_HEADER, &credential);
        }

        let slot = self.inner.options.slot;
        if let Some(token) = self.inner.store.token(slot).await {
            insert_sensitive(&mut headers, slot.header_name(), &format!("Bearer {token}"));
        }

        headers
    }

    /// Absolute URL for `path`. Absolute inputs pass through unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.inner.options.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Issue a request and classify its response.
    ///
    /// Returns a boxed `'static` future so a failed call can capture a clone
    /// of this executor and replay itself later.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> BoxFuture<'static, Result<Payload>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move { this.send(method, path, body).await })
    }

    pub fn get(&self, path: &str) -> BoxFuture<'static, Result<Payload>> {
        self.execute(Method::GET, path, None)
    }

    pub fn post(&self, path: &str, body: serde_json::Value) -> BoxFuture<'static, Result<Payload>> {
        self.execute(Method::POST, path, Some(body))
    }

    pub fn put(&self, path: &str, body: serde_json::Value) -> BoxFuture<'static, Result<Payload>> {
        self.execute(Method::PUT, path, Some(body))
    }

    pub fn delete(&self, path: &str) -> BoxFuture<'static, Result<Payload>> {
        self.execute(Method::DELETE, path, None)
    }

    /// Clear this executor's token and tell the navigator to show the login page.
    pub async fn end_session(&self) -> String {
        let slot = self.inner.options.slot;
        if let Err(e) = self.inner.store.clear_token(slot).await {
            warn!(slot = slot.label(), error = %e, "failed to persist token removal");
        }
        let login_path = self.inner.options.login_path.clone();
        info!(slot = slot.label(), login_path = %login_path, "session ended, redirecting to login");
        if let Some(navigator) = &self.inner.navigator {
            navigator.navigate_to_login(&login_path);
        }
        login_path
    }

    #[instrument(skip_all, fields(method = %method, path = %path))]
    async fn send(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<Payload> {
        let url = self.url(&path);
        let headers = self.headers().await;

        let mut request = self
            .inner
            .http
            .request(method.clone(), &url)
            .headers(headers)
            .timeout(self.inner.options.timeout);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(method.as_str(), "network_error");
                warn!(error = %e, "request failed before a response arrived");
                return Err(RequestError::Network(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await.map_err(|e| {
            metrics::record_request(method.as_str(), "network_error");
            RequestError::Network(format!("reading response body: {e}"))
        })?;
        metrics::record_request(method.as_str(), &status.to_string());
        debug!(status, "response received");

        match classify_response(
            status,
            content_type.as_deref(),
            &bytes,
            self.inner.options.on_unauthorized,
        ) {
            Classification::Success(payload) => Ok(payload),
            Classification::StoreCredentialInvalid => {
                warn!(status, "store credential rejected by the API");
                Err(RequestError::Configuration)
            }
            Classification::Unauthorized => {
                debug!(status, "authentication required");
                let this = self.clone();
                let retry_method = method.clone();
                let retry_path = path.clone();
                Err(RequestError::AuthenticationRequired(RetryableCall::new(
                    method,
                    path,
                    move || this.execute(retry_method, &retry_path, body),
                )))
            }
            Classification::SessionExpired => {
                let login_path = self.end_session().await;
                Err(RequestError::SessionExpired { login_path })
            }
            Classification::Failed { status, message } => {
                debug!(status, message = %message, "request failed");
                Err(RequestError::Http { status, message })
            }
            Classification::Undecodable(e) => {
                warn!(status, error = %e, "response body is not valid JSON");
                Err(RequestError::Decode(e))
            }
        }
    }
}

fn insert_sensitive(headers: &mut HeaderMap, name: &str, value: &str) {
    let name = match HeaderName::from_str(name) {
        Ok(n) => n,
        Err(e) => {
            warn!(header = name, error = %e, "skipping invalid header name");
            return;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(mut v) => {
            v.set_sensitive(true);
            headers.insert(name, v);
        }
        Err(e) => warn!(header = %name, error = %e, "skipping invalid header value"),
    }
}
