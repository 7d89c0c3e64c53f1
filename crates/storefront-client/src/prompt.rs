//! Collaborators the client drives but does not implement
//!
//! A `Prompt` is whatever collects credentials from a person: a terminal
//! dialogue, a modal, a test double. A `Navigator` is told when the user must
//! be sent to a login page. Both are trait objects so the coordinator and
//! executor can hold them as `Arc<dyn ...>`.

use storefront_auth::AuthSession;

use crate::call::BoxFuture;

/// How a prompt obtained its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Login,
    Registration,
}

impl AuthMethod {
    pub fn label(self) -> &'static str {
        match self {
            AuthMethod::Login => "login",
            AuthMethod::Registration => "registration",
        }
    }
}

/// How an opened prompt was resolved.
#[derive(Debug)]
pub enum PromptOutcome {
    /// The auth or registration call succeeded and produced a session.
    Authenticated {
        session: AuthSession,
        method: AuthMethod,
    },
    /// Closed without signing in (close button, escape, end of input).
    Cancelled,
}

/// Interactive credential collection.
///
/// `open` resolves only once the user is done: after the remote login or
/// registration call has returned a token, or after the user gave up. Failed
/// attempts (wrong password, taken email) are the prompt's own business and
/// should be shown inside it while it stays open. There is no timeout.
pub trait Prompt: Send + Sync {
    fn open(&self) -> BoxFuture<'_, PromptOutcome>;

    /// Reset and hide the prompt. Called once per resolution.
    fn close(&self);
}

/// Receives "go to the login page" signals from force-reauth executors.
pub trait Navigator: Send + Sync {
    fn navigate_to_login(&self, login_path: &str);
}
