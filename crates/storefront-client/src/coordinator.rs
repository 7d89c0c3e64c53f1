//! Authentication challenge coordinator
//!
//! Turns an `AuthenticationRequired` failure into a login prompt and, once
//! the user has signed in, into a single replay of the failed call.
//!
//! The state machine is a pure function (`handle_event`) over
//! `ChallengeState`; the coordinator performs the I/O each action implies.
//! There is one pending-retry slot. A challenge arriving while the prompt is
//! already open replaces the pending call and reuses the open prompt; the
//! replaced caller is told its call was abandoned.
//!
//! Every `handle` call gets its own outcome over a oneshot channel, so
//! whichever task happens to be driving the prompt, each caller learns what
//! became of its own request. If the driving task is dropped while the prompt
//! is open, the challenge is cancelled as if the user had closed the prompt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use storefront_auth::{CredentialStore, TokenSlot};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call::{Payload, RetryableCall};
use crate::error::{RequestError, Result};
use crate::metrics;
use crate::prompt::{Prompt, PromptOutcome};

/// Whether a login prompt is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengeState {
    #[default]
    Idle,
    Prompting,
}

/// Inputs to the challenge state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeEvent {
    /// A call failed with "authentication required"
    Challenged,
    /// The prompt obtained a token
    Authenticated,
    /// The prompt was closed without signing in
    Cancelled,
}

/// What the coordinator must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeAction {
    OpenPrompt,
    /// Prompt already open; only the pending call changes
    ReusePrompt,
    RunPendingRetry,
    DiscardPendingRetry,
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ChallengeState, event: ChallengeEvent) -> (ChallengeState, ChallengeAction) {
    match (state, event) {
        (ChallengeState::Idle, ChallengeEvent::Challenged) => {
            (ChallengeState::Prompting, ChallengeAction::OpenPrompt)
        }
        (ChallengeState::Prompting, ChallengeEvent::Challenged) => {
            (ChallengeState::Prompting, ChallengeAction::ReusePrompt)
        }
        (ChallengeState::Prompting, ChallengeEvent::Authenticated) => {
            (ChallengeState::Idle, ChallengeAction::RunPendingRetry)
        }
        (ChallengeState::Prompting, ChallengeEvent::Cancelled) => {
            (ChallengeState::Idle, ChallengeAction::DiscardPendingRetry)
        }
        // Stray resolutions with no prompt open
        (ChallengeState::Idle, ChallengeEvent::Authenticated | ChallengeEvent::Cancelled) => {
            (ChallengeState::Idle, ChallengeAction::None)
        }
    }
}

/// What became of a challenged call.
#[derive(Debug)]
pub enum ChallengeOutcome {
    /// The user signed in and the call was replayed once; this is its result.
    /// A replay that fails again is not challenged again.
    Retried(Result<Payload>),
    /// A newer challenge took the pending slot before the user signed in.
    Abandoned,
    /// The prompt was closed without signing in.
    Cancelled,
}

struct PendingRetry {
    id: Uuid,
    call: RetryableCall,
    reply: oneshot::Sender<ChallengeOutcome>,
}

#[derive(Default)]
struct CoordinatorInner {
    state: ChallengeState,
    pending: Option<PendingRetry>,
}

/// Drives the prompt and owns the pending-retry slot.
pub struct AuthChallengeCoordinator {
    store: Arc<CredentialStore>,
    prompt: Arc<dyn Prompt>,
    slot: TokenSlot,
    inner: Mutex<CoordinatorInner>,
}

impl AuthChallengeCoordinator {
    /// `slot` must match the slot of the executor whose calls are handed in,
    /// so the replay picks up the token stored here.
    pub fn new(store: Arc<CredentialStore>, prompt: Arc<dyn Prompt>, slot: TokenSlot) -> Self {
        Self {
            store,
            prompt,
            slot,
            inner: Mutex::new(CoordinatorInner::default()),
        }
    }

    pub async fn state(&self) -> ChallengeState {
        self.lock().state
    }

    /// Path of the call waiting for a login, if any.
    pub async fn pending_path(&self) -> Option<String> {
        self.lock()
            .pending
            .as_ref()
            .map(|p| p.call.path().to_string())
    }

    // Never held across an await.
    fn lock(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Challenge the user on behalf of `call` and wait for the outcome.
    ///
    /// The first challenge while Idle opens the prompt and drives it to
    /// resolution. Later challenges while Prompting only replace the pending
    /// call and wait.
    pub async fn handle(&self, call: RetryableCall) -> ChallengeOutcome {
        let (reply, outcome) = oneshot::channel();
        let id = Uuid::new_v4();

        let action = {
            let mut inner = self.lock();
            let (state, action) = handle_event(inner.state, ChallengeEvent::Challenged);
            inner.state = state;
            info!(
                challenge_id = %id,
                method = %call.method(),
                path = call.path(),
                "authentication required"
            );
            let previous = inner.pending.replace(PendingRetry { id, call, reply });
            if let Some(previous) = previous {
                debug!(
                    challenge_id = %previous.id,
                    replaced_by = %id,
                    path = previous.call.path(),
                    "pending retry abandoned for a newer challenge"
                );
                let _ = previous.reply.send(ChallengeOutcome::Abandoned);
            }
            action
        };

        match action {
            ChallengeAction::OpenPrompt => {
                metrics::record_challenge("opened");
                info!(challenge_id = %id, "opening login prompt");
                let guard = PromptGuard {
                    coordinator: self,
                    armed: true,
                };
                let resolution = self.prompt.open().await;
                self.resolve(resolution, guard).await;
            }
            ChallengeAction::ReusePrompt => {
                metrics::record_challenge("reused");
                debug!(challenge_id = %id, "login prompt already open");
            }
            _ => {}
        }

        outcome.await.unwrap_or(ChallengeOutcome::Abandoned)
    }

    /// Pass `result` through the challenge protocol.
    ///
    /// `Ok(Some(_))` is a payload (first try or replay), `Ok(None)` means the
    /// challenge was cancelled or superseded and the caller should show
    /// nothing. Errors other than `AuthenticationRequired` pass through.
    pub async fn settle(&self, result: Result<Payload>) -> Result<Option<Payload>> {
        match result {
            Err(RequestError::AuthenticationRequired(call)) => match self.handle(call).await {
                ChallengeOutcome::Retried(replayed) => replayed.map(Some),
                ChallengeOutcome::Abandoned | ChallengeOutcome::Cancelled => Ok(None),
            },
            other => other.map(Some),
        }
    }

    async fn resolve(&self, resolution: PromptOutcome, mut guard: PromptGuard<'_>) {
        let event = match &resolution {
            PromptOutcome::Authenticated { session, method } => {
                // set_token updates memory before disk, so a failed write still
                // leaves the token usable for this process
                if let Err(e) = self
                    .store
                    .set_token(self.slot, session.access_token.expose().to_string())
                    .await
                {
                    warn!(error = %e, "failed to persist token, continuing with in-memory session");
                }
                metrics::record_challenge("authenticated");
                info!(
                    via = method.label(),
                    name = session.name.as_deref().unwrap_or(""),
                    slot = self.slot.label(),
                    "signed in"
                );
                ChallengeEvent::Authenticated
            }
            PromptOutcome::Cancelled => {
                metrics::record_challenge("cancelled");
                info!("login prompt dismissed");
                ChallengeEvent::Cancelled
            }
        };

        // Transition and take the slot together so a challenge raised by the
        // replay itself starts a fresh prompt instead of joining a closed one.
        let (action, pending) = {
            let mut inner = self.lock();
            let (state, action) = handle_event(inner.state, event);
            inner.state = state;
            (action, inner.pending.take())
        };
        guard.armed = false;
        self.prompt.close();

        let Some(pending) = pending else {
            return;
        };
        match action {
            ChallengeAction::RunPendingRetry => {
                debug!(challenge_id = %pending.id, path = pending.call.path(), "replaying call");
                let result = pending.call.run().await;
                if let Err(e) = &result {
                    debug!(challenge_id = %pending.id, error = %e, "replay failed");
                }
                let _ = pending.reply.send(ChallengeOutcome::Retried(result));
            }
            _ => {
                debug!(challenge_id = %pending.id, "pending retry discarded");
                let _ = pending.reply.send(ChallengeOutcome::Cancelled);
            }
        }
    }
}

/// Cancels the open challenge if the driving future is dropped before the
/// prompt resolution has been applied.
struct PromptGuard<'a> {
    coordinator: &'a AuthChallengeCoordinator,
    armed: bool,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let pending = {
            let mut inner = self.coordinator.lock();
            let (state, _) = handle_event(inner.state, ChallengeEvent::Cancelled);
            inner.state = state;
            inner.pending.take()
        };
        self.coordinator.prompt.close();
        metrics::record_challenge("cancelled");
        warn!("login prompt driver dropped, challenge cancelled");
        if let Some(pending) = pending {
            let _ = pending.reply.send(ChallengeOutcome::Cancelled);
        }
    }
}
