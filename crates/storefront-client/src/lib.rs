//! Storefront API client with retry-after-login
//!
//! Every call goes through a `RequestExecutor`, which attaches the store
//! credential and bearer token and sorts the response into success or one of
//! the `RequestError` kinds. What happens on 401/403 depends on the
//! executor's `UnauthorizedPolicy`:
//!
//! - `Challenge`: the error carries a `RetryableCall`. Handing it to the
//!   `AuthChallengeCoordinator` opens the login prompt; once a token is
//!   obtained the call is replayed exactly once and its result returned.
//! - `ForceReauth`: the token is cleared, the `Navigator` is told to show the
//!   login page, and the call fails with `SessionExpired`. Nothing is retried.
//!
//! Challenge lifecycle:
//! 1. Call fails with `AuthenticationRequired(call)`
//! 2. `coordinator.handle(call)`: Idle -> Prompting, prompt opens
//! 3. Concurrent failures overwrite the pending call (last challenge wins)
//! 4. Prompt resolves `Authenticated` -> token stored, pending call replayed
//! 5. Prompt resolves `Cancelled` -> pending call dropped unrun

pub mod admin;
pub mod call;
pub mod cart;
pub mod classify;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod prompt;

#[cfg(test)]
mod testing;

pub use admin::{AdminError, SellerAdmin, SellerProfile};
pub use call::{BoxFuture, Payload, RetryableCall};
pub use cart::{Cart, CartApi, CartItem};
pub use classify::{Classification, classify_response};
pub use coordinator::{
    AuthChallengeCoordinator, ChallengeAction, ChallengeEvent, ChallengeOutcome, ChallengeState,
    handle_event,
};
pub use error::{RequestError, Result};
pub use executor::{ExecutorOptions, RequestExecutor, UnauthorizedPolicy};
pub use prompt::{AuthMethod, Navigator, Prompt, PromptOutcome};
