//! Durable credential storage
//!
//! Keeps the customer token, the seller token, and the store credential in a
//! small JSON file so a session survives restarts. Every mutation updates the
//! in-memory copy first and then rewrites the file with temp-file + rename.
//! A tokio Mutex serializes writers; readers clone out of the lock.
//!
//! No validation happens here. Whatever string the API handed out is stored
//! and handed back verbatim.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{CUSTOMER_AUTHORIZATION_HEADER, SELLER_AUTHORIZATION_HEADER};
use crate::error::{Error, Result};

/// Which end-user session a bearer token belongs to.
///
/// Storefront pages authenticate customers; the seller admin panel
/// authenticates sellers. Each slot has its own storage key and header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenSlot {
    #[default]
    Customer,
    Seller,
}

impl TokenSlot {
    /// Request header that carries `Bearer <token>` for this slot.
    pub fn header_name(self) -> &'static str {
        match self {
            TokenSlot::Customer => CUSTOMER_AUTHORIZATION_HEADER,
            TokenSlot::Seller => SELLER_AUTHORIZATION_HEADER,
        }
    }

    /// Label for logs.
    pub fn label(self) -> &'static str {
        match self {
            TokenSlot::Customer => "customer",
            TokenSlot::Seller => "seller",
        }
    }
}

/// On-disk layout. Absent values are omitted rather than written as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seller_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    store_credential: Option<String>,
}

impl StoredCredentials {
    fn token_mut(&mut self, slot: TokenSlot) -> &mut Option<String> {
        match slot {
            TokenSlot::Customer => &mut self.customer_token,
            TokenSlot::Seller => &mut self.seller_token,
        }
    }

    fn token(&self, slot: TokenSlot) -> Option<&String> {
        match slot {
            TokenSlot::Customer => self.customer_token.as_ref(),
            TokenSlot::Seller => self.seller_token.as_ref(),
        }
    }
}

/// File-backed store for bearer tokens and the store credential.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<StoredCredentials>,
}

impl CredentialStore {
    /// Load credentials from `path`, creating an empty file on first use.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let stored: StoredCredentials = if contents.trim().is_empty() {
                StoredCredentials::default()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?
            };
            info!(
                path = %path.display(),
                customer = stored.customer_token.is_some(),
                seller = stored.seller_token.is_some(),
                "loaded credentials"
            );
            stored
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let stored = StoredCredentials::default();
            write_atomic(&path, &stored).await?;
            stored
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current bearer token for `slot`, if any.
    pub async fn token(&self, slot: TokenSlot) -> Option<String> {
        let state = self.state.lock().await;
        state.token(slot).cloned()
    }

    /// Store a bearer token for `slot`, replacing any previous one.
    pub async fn set_token(&self, slot: TokenSlot, token: String) -> Result<()> {
        let mut state = self.state.lock().await;
        *state.token_mut(slot) = Some(token);
        debug!(slot = slot.label(), "stored token");
        write_atomic(&self.path, &state).await
    }

    /// Remove the bearer token for `slot`. A no-op when nothing is stored.
    pub async fn clear_token(&self, slot: TokenSlot) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.token_mut(slot).take().is_some() {
            debug!(slot = slot.label(), "cleared token");
            write_atomic(&self.path, &state).await?;
        }
        Ok(())
    }

    pub async fn store_credential(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.store_credential.clone()
    }

    pub async fn set_store_credential(&self, credential: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state.store_credential = Some(credential);
        debug!("stored store credential");
        write_atomic(&self.path, &state).await
    }

    pub async fn clear_store_credential(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.store_credential.take().is_some() {
            debug!("cleared store credential");
            write_atomic(&self.path, &state).await?;
        }
        Ok(())
    }
}

/// Write credentials to `path` atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &StoredCredentials) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;
    }

    let tmp_path = dir.join(format!(".storefront-credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
