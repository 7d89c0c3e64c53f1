//! Seller admin session guard
//!
//! The admin side never prompts: a missing, rejected or unusable seller
//! session sends the user to the login page. All calls go through a
//! force-reauth executor on the seller token slot.

use reqwest::Method;
use serde::Deserialize;
use storefront_auth::{Secret, TokenSlot};
use thiserror::Error;
use tracing::{info, warn};

use crate::call::Payload;
use crate::error::RequestError;
use crate::executor::{RequestExecutor, UnauthorizedPolicy};

const SELLER_PROFILE_PATH: &str = "/sellers/me";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("not signed in, sign in at {login_path}")]
    NotSignedIn { login_path: String },

    #[error("seller has no store, create one before using the admin panel")]
    NoStore { login_path: String },

    #[error("could not load seller profile: {source}")]
    Profile {
        login_path: String,
        #[source]
        source: RequestError,
    },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("credential store: {0}")]
    Store(#[from] storefront_auth::Error),
}

impl AdminError {
    /// Where the user was sent, when the error ended the session.
    pub fn login_path(&self) -> Option<&str> {
        match self {
            AdminError::NotSignedIn { login_path }
            | AdminError::NoStore { login_path }
            | AdminError::Profile { login_path, .. }
            | AdminError::Request(RequestError::SessionExpired { login_path }) => Some(login_path),
            _ => None,
        }
    }
}

/// `GET /sellers/me` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SellerProfile {
    pub username: String,
    #[serde(default)]
    pub store_id: Option<i64>,
    #[serde(default)]
    pub store_credential: Option<Secret>,
    #[serde(default)]
    pub store_name: Option<String>,
}

impl SellerProfile {
    fn usable_store_credential(&self) -> Option<&str> {
        self.store_id?;
        self.store_credential
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(Secret::expose)
    }
}

pub struct SellerAdmin {
    executor: RequestExecutor,
}

impl SellerAdmin {
    pub fn new(executor: RequestExecutor) -> Self {
        let options = executor.options();
        if options.slot != TokenSlot::Seller
            || options.on_unauthorized != UnauthorizedPolicy::ForceReauth
        {
            warn!(
                slot = options.slot.label(),
                policy = ?options.on_unauthorized,
                "seller admin expects a force-reauth executor on the seller slot"
            );
        }
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Fail fast, and send the user to the login page, when no seller token is stored.
    pub async fn ensure_session(&self) -> Result<(), AdminError> {
        if self.executor.store().token(TokenSlot::Seller).await.is_some() {
            return Ok(());
        }
        let login_path = self.executor.end_session().await;
        Err(AdminError::NotSignedIn { login_path })
    }

    /// Load the signed-in seller and remember their store credential.
    ///
    /// Any failure signs the seller out. A seller without a store is signed
    /// out too, since every admin call needs the store credential.
    pub async fn load_seller_info(&self) -> Result<SellerProfile, AdminError> {
        self.ensure_session().await?;

        let payload = match self.executor.get(SELLER_PROFILE_PATH).await {
            Ok(payload) => payload,
            // The executor has already cleared the token and navigated
            Err(e @ RequestError::SessionExpired { .. }) => return Err(e.into()),
            Err(source) => {
                warn!(error = %source, "seller profile request failed, signing out");
                let login_path = self.executor.end_session().await;
                return Err(AdminError::Profile { login_path, source });
            }
        };

        let profile = payload
            .into_json()
            .ok_or_else(|| RequestError::Decode("seller profile has no body".into()))
            .and_then(|value| {
                serde_json::from_value::<SellerProfile>(value)
                    .map_err(|e| RequestError::Decode(e.to_string()))
            });
        let profile = match profile {
            Ok(profile) => profile,
            Err(source) => {
                let login_path = self.executor.end_session().await;
                return Err(AdminError::Profile { login_path, source });
            }
        };

        let Some(credential) = profile.usable_store_credential() else {
            warn!(seller = %profile.username, "seller has no store configured");
            let login_path = self.executor.end_session().await;
            return Err(AdminError::NoStore { login_path });
        };
        self.executor
            .store()
            .set_store_credential(credential.to_string())
            .await?;
        info!(
            seller = %profile.username,
            store = profile.store_name.as_deref().unwrap_or(""),
            "seller session ready"
        );
        Ok(profile)
    }

    /// Drop the seller token and store credential, then go to the login page.
    pub async fn logout(&self) -> Result<String, AdminError> {
        self.executor.store().clear_store_credential().await?;
        Ok(self.executor.end_session().await)
    }

    /// Arbitrary admin call under the force-reauth policy.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Payload, AdminError> {
        Ok(self.executor.execute(method, path, body).await?)
    }
}
