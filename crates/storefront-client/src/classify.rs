//! Response classification
//!
//! Pure mapping from (status, content type, body) to an outcome. The executor
//! does the I/O and side effects; everything deciding *what* a response means
//! lives here so it can be tested without a server.

use serde::Deserialize;
use storefront_auth::{STORE_CREDENTIAL_INVALID, UNAUTHORIZED_DETAILS};

use crate::call::Payload;
use crate::executor::UnauthorizedPolicy;

/// What a response means to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success(Payload),
    /// 401/403 naming the store credential. Never opens a prompt.
    StoreCredentialInvalid,
    /// 401/403 for a missing or rejected end-user token (challenge policy)
    Unauthorized,
    /// Any 401/403 under the force-reauth policy
    SessionExpired,
    Failed { status: u16, message: String },
    /// 2xx with a JSON content type that did not parse
    Undecodable(String),
}

/// Error body shape: FastAPI puts the reason in `detail`, some handlers use
/// `message`. `detail` may also be a validation array, so it is kept raw.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl ErrorBody {
    fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    fn detail(&self) -> Option<&str> {
        self.detail.as_ref().and_then(|d| d.as_str())
    }

    fn message(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.as_str())
    }
}

/// Classify a response.
///
/// Order matters: store-credential rejection is checked before the
/// unauthorized discriminator, and both only apply to 401/403. A 401/403
/// with any other detail is an ordinary HTTP failure.
pub fn classify_response(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
    policy: UnauthorizedPolicy,
) -> Classification {
    if (200..300).contains(&status) {
        return classify_success(content_type, body);
    }

    let error_body = ErrorBody::parse(body);

    if status == 401 || status == 403 {
        match policy {
            UnauthorizedPolicy::ForceReauth => return Classification::SessionExpired,
            UnauthorizedPolicy::Challenge => match error_body.detail() {
                Some(STORE_CREDENTIAL_INVALID) => return Classification::StoreCredentialInvalid,
                Some(detail) if UNAUTHORIZED_DETAILS.contains(&detail) => {
                    return Classification::Unauthorized;
                }
                _ => {}
            },
        }
    }

    let message = error_body
        .detail()
        .or_else(|| error_body.message())
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Error {status}"));
    Classification::Failed { status, message }
}

fn classify_success(content_type: Option<&str>, body: &[u8]) -> Classification {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json || body.iter().all(u8::is_ascii_whitespace) {
        return Classification::Success(Payload::NoContent);
    }
    match serde_json::from_slice(body) {
        Ok(value) => Classification::Success(Payload::Json(value)),
        Err(e) => Classification::Undecodable(e.to_string()),
    }
}
