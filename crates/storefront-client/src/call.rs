//! Response payloads and deferred calls

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::Method;

use crate::error::Result;

/// Boxed, sendable future. Used wherever a future must be stored or returned
/// through a trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 2xx with a JSON content type
    Json(serde_json::Value),
    /// 2xx with an empty body or a non-JSON content type
    NoContent,
}

impl Payload {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::NoContent => None,
        }
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self, Payload::NoContent)
    }
}

type CallFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<Payload>> + Send + Sync>;

/// A request that can be issued again, exactly once.
///
/// Built by the executor when a call fails with "authentication required".
/// Running it re-executes the same method, path, and body, reading headers
/// afresh so a token stored in the meantime is attached. `run` consumes the
/// value, so a call can never be replayed twice.
pub struct RetryableCall {
    method: Method,
    path: String,
    call: CallFn,
}

impl RetryableCall {
    pub fn new<F>(method: Method, path: impl Into<String>, call: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<Payload>> + Send + Sync + 'static,
    {
        Self {
            method,
            path: path.into(),
            call: Box::new(call),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Issue the call.
    pub async fn run(self) -> Result<Payload> {
        (self.call)().await
    }
}

impl fmt::Debug for RetryableCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableCall")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
