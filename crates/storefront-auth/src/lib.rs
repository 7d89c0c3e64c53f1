//! Storefront authentication library
//!
//! Owns everything the storefront client knows about end-user identity: the
//! durable credential file (bearer tokens and the store credential), the
//! login and registration calls that mint tokens, and the wire constants the
//! commerce API uses to report authentication failures.
//!
//! Token flow:
//! 1. A protected call fails with 401/403 `Unauthorized`
//! 2. The prompt collects credentials and calls `session::login()` or `session::register()`
//! 3. The returned `AuthSession` token is saved via `CredentialStore::set_token()`
//! 4. Every later request reads the token back through `CredentialStore::token()`
//! 5. Logout (or a force-reauth rejection) calls `CredentialStore::clear_token()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod secret;
pub mod session;

pub use constants::*;
pub use credentials::{CredentialStore, TokenSlot};
pub use error::{Error, Result};
pub use secret::Secret;
pub use session::{AuthSession, LoginRequest, RegisterRequest, login, register};
