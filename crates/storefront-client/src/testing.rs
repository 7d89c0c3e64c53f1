//! Mock commerce API and collaborator doubles shared by unit tests

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use storefront_auth::{AuthSession, CredentialStore, TokenSlot};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};

use crate::call::BoxFuture;
use crate::executor::{ExecutorOptions, RequestExecutor};
use crate::prompt::{AuthMethod, Navigator, Prompt, PromptOutcome};

pub const STORE_CREDENTIAL: &str = "store-cred-1";

/// One request as seen by the mock API.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub customer_auth: Option<String>,
    pub seller_auth: Option<String>,
    pub store_credential: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Default)]
pub struct MockState {
    requests: Mutex<Vec<Recorded>>,
    valid_tokens: Mutex<HashSet<String>>,
}

impl MockState {
    pub fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_server(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

/// Start the generic mock API.
///
/// - wrong or missing `Store-Credential` -> 403 "Store credential is invalid"
/// - `/public` -> 200 `{"ok":true}`
/// - `/empty` -> 204, `/text` -> 200 text/plain
/// - `/missing` -> 404 with detail, `/forbidden` -> 403 with an unrelated detail
/// - anything else is protected: a bearer token registered via
///   `accept_token` gets an echo of the request, otherwise 403 "Unauthorized"
pub async fn start_mock_api() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = axum::Router::new()
        .fallback(mock_handler)
        .with_state(state.clone());
    (spawn_server(app).await, state)
}

async fn mock_handler(State(state): State<Arc<MockState>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    let mut recorded = Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        customer_auth: header("customer-authorization"),
        seller_auth: header("seller-authorization"),
        store_credential: header("store-credential"),
        content_type: header("content-type"),
        body: None,
    };
    let bytes = axum::body::to_bytes(body, 1024 * 1024)
        .await
        .unwrap_or_default();
    recorded.body = serde_json::from_slice(&bytes).ok();
    state.requests.lock().unwrap().push(recorded.clone());

    if recorded.store_credential.as_deref() != Some(STORE_CREDENTIAL) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"detail": "Store credential is invalid"})),
        )
            .into_response();
    }

    match recorded.path.as_str() {
        "/public" => Json(serde_json::json!({"ok": true})).into_response(),
        "/empty" => StatusCode::NO_CONTENT.into_response(),
        "/text" => "plain text".into_response(),
        "/missing" => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"detail": "Product not found"})),
        )
            .into_response(),
        "/forbidden" => (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"detail": "Forbidden for this store"})),
        )
            .into_response(),
        _ => {
            let token = recorded
                .customer_auth
                .as_deref()
                .or(recorded.seller_auth.as_deref())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_owned);
            let accepted = token
                .as_deref()
                .is_some_and(|t| state.valid_tokens.lock().unwrap().contains(t));
            if accepted {
                Json(serde_json::json!({
                    "method": recorded.method,
                    "path": recorded.path,
                    "token": token,
                    "body": recorded.body,
                }))
                .into_response()
            } else {
                (
                    StatusCode::FORBIDDEN,
                    Json(serde_json::json!({"detail": "Unauthorized"})),
                )
                    .into_response()
            }
        }
    }
}

/// Fresh credential store in `dir`, with the mock's store credential set.
pub async fn test_store(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
    let path: PathBuf = dir.path().join("credentials.json");
    let store = CredentialStore::load(path).await.unwrap();
    store
        .set_store_credential(STORE_CREDENTIAL.into())
        .await
        .unwrap();
    Arc::new(store)
}

pub fn challenge_executor(base_url: &str, store: Arc<CredentialStore>) -> RequestExecutor {
    let mut options = ExecutorOptions::challenge(base_url);
    options.timeout = Duration::from_secs(5);
    RequestExecutor::new(reqwest::Client::new(), store, options)
}

pub fn session(token: &str) -> AuthSession {
    serde_json::from_value(serde_json::json!({"access_token": token, "name": "Ana"})).unwrap()
}

/// Records every navigation request.
#[derive(Default)]
pub struct RecordingNavigator {
    pub visits: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate_to_login(&self, login_path: &str) {
        self.visits.lock().unwrap().push(login_path.to_string());
    }
}

/// Prompt whose resolutions are fed in by the test.
pub struct ScriptedPrompt {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub opened: Notify,
    sender: mpsc::UnboundedSender<PromptOutcome>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<PromptOutcome>>,
}

impl ScriptedPrompt {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            opened: Notify::new(),
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        })
    }

    pub fn login_with(&self, token: &str) {
        self.sender
            .send(PromptOutcome::Authenticated {
                session: session(token),
                method: AuthMethod::Login,
            })
            .unwrap();
    }

    pub fn register_with(&self, token: &str) {
        self.sender
            .send(PromptOutcome::Authenticated {
                session: session(token),
                method: AuthMethod::Registration,
            })
            .unwrap();
    }

    pub fn cancel(&self) {
        self.sender.send(PromptOutcome::Cancelled).unwrap();
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Prompt for ScriptedPrompt {
    fn open(&self) -> BoxFuture<'_, PromptOutcome> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.opened.notify_one();
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await.unwrap_or(PromptOutcome::Cancelled)
        })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Token slot helper so tests read naturally.
pub const CUSTOMER: TokenSlot = TokenSlot::Customer;
