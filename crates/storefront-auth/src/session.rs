//! Login and registration calls
//!
//! Both endpoints answer with the same `{access_token, name, ...}` shape on
//! success and `{detail}` on failure. They do not go through the request
//! executor: a rejected login is a form error, never another login prompt.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{CUSTOMER_AUTH_PATH, CUSTOMER_REGISTER_PATH, MIN_PASSWORD_LEN};
use crate::error::{Error, Result};
use crate::secret::Secret;

/// Credentials submitted from the login form.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: Secret::new(password),
        }
    }

    /// Reject blank fields before any network traffic.
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(Error::Validation("Fill in every field".into()));
        }
        Ok(())
    }
}

/// Details submitted from the account-creation form.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: Secret,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: Secret::new(password),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(Error::Validation("Fill in every field".into()));
        }
        if self.password.expose().chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Successful login or registration response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: Secret,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Authenticate an existing customer.
///
/// `headers` should be the executor's standard headers so the store
/// credential travels with the login call.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    headers: HeaderMap,
    request: &LoginRequest,
) -> Result<AuthSession> {
    request.validate()?;
    let session = post_credentials(
        client,
        &endpoint(base_url, CUSTOMER_AUTH_PATH),
        headers,
        request,
        "Login failed",
    )
    .await?;
    info!(name = session.name.as_deref().unwrap_or(""), "customer logged in");
    Ok(session)
}

/// Create a customer account; the response carries a ready-to-use token.
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    headers: HeaderMap,
    request: &RegisterRequest,
) -> Result<AuthSession> {
    request.validate()?;
    let session = post_credentials(
        client,
        &endpoint(base_url, CUSTOMER_REGISTER_PATH),
        headers,
        request,
        "Could not create account",
    )
    .await?;
    info!(name = session.name.as_deref().unwrap_or(""), "customer registered");
    Ok(session)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

async fn post_credentials<B: Serialize>(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: &B,
    fallback: &str,
) -> Result<AuthSession> {
    debug!(url, "posting credentials");
    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("auth request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail)
            .and_then(|d| d.as_str().map(str::to_owned))
            .filter(|d| !d.is_empty());
        debug!(status = status.as_u16(), "auth endpoint rejected credentials");
        return Err(Error::Rejected(detail.unwrap_or_else(|| fallback.to_string())));
    }

    let session = response
        .json::<AuthSession>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))?;
    if session.access_token.is_empty() {
        return Err(Error::InvalidResponse("empty access_token".into()));
    }
    Ok(session)
}
