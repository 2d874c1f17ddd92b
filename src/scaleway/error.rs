//! Classification of Scaleway HTTP failures into provider error kinds.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::provider::{ProviderError, ProviderErrorKind};

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Maps a non-success HTTP status onto a provider error kind.
pub(super) fn kind_for_status(status: StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        404 => ProviderErrorKind::NotFound,
        409 | 412 => ProviderErrorKind::InUse,
        401 | 403 => ProviderErrorKind::Unauthorized,
        429 => ProviderErrorKind::RateLimited,
        408 | 500..=599 => ProviderErrorKind::Unavailable,
        _ => ProviderErrorKind::Rejected,
    }
}

/// Builds a provider error from an HTTP status and response body.
///
/// The API's JSON error message is preferred when present; otherwise the
/// raw body is used.
pub(super) fn from_status(status: StatusCode, body: &[u8]) -> ProviderError {
    let detail = serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| match (parsed.error_type, parsed.message) {
            (Some(kind), Some(message)) => Some(format!("{kind}: {message}")),
            (None, Some(message)) => Some(message),
            (Some(kind), None) => Some(kind),
            (None, None) => None,
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned());
    let message = if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    };
    ProviderError::new(kind_for_status(status), message)
}

/// Builds a provider error from a transport failure.
pub(super) fn from_transport(err: &reqwest::Error) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_decode() {
        ProviderErrorKind::Malformed
    } else {
        ProviderErrorKind::Unavailable
    };
    ProviderError::new(kind, err.to_string())
}

/// Builds a provider error for a response body that does not decode.
pub(super) fn malformed(err: &serde_json::Error) -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::Malformed,
        format!("unexpected response body: {err}"),
    )
}
