//! Error type for remote API calls.
//!
//! Every failure coming out of the Dropbox API (or out of the transport below
//! it) is classified into a [`RemoteError`] variant so callers can branch on
//! the kind of failure instead of parsing messages.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error type for remote storage operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The stored credential string could not be parsed
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The access token has expired and could not be refreshed
    #[error("access token expired")]
    AuthExpired,

    /// The service rejected the credential
    #[error("access token rejected: {0}")]
    AuthInvalid(String),

    /// No entry exists at the given path
    #[error("path not found: {0}")]
    NotFound(String),

    /// The request conflicts with the state of the remote tree
    #[error("conflict at {path}: {summary}")]
    Conflict {
        /// Path the request targeted
        path: String,
        /// Dropbox error summary
        summary: String,
    },

    /// Too many requests; the service asked the client to back off
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Value of the `Retry-After` header, when present
        retry_after: Option<Duration>,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {summary}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error summary or raw body
        summary: String,
    },

    /// Connection, TLS or protocol failure below the API layer
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Local I/O failure while streaming content
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether this error means the credential can no longer be used.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            RemoteError::AuthExpired
                | RemoteError::AuthInvalid(_)
                | RemoteError::MalformedCredential(_)
        )
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Decode(e.to_string())
    }
}

/// Error envelope returned by Dropbox for non-success responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_summary: Option<String>,
}

/// Classify a non-success API response.
///
/// `context` is the path the request targeted and ends up in `NotFound` and
/// `Conflict` errors.
pub(crate) fn classify_response(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
    context: &str,
) -> RemoteError {
    let summary = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error_summary)
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 if summary.starts_with("expired_access_token") => RemoteError::AuthExpired,
        401 => RemoteError::AuthInvalid(summary),
        409 if summary.contains("not_found") => RemoteError::NotFound(context.to_string()),
        409 => RemoteError::Conflict {
            path: context.to_string(),
            summary,
        },
        429 => RemoteError::RateLimited { retry_after },
        _ => RemoteError::Http { status, summary },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_token() {
        let body = r#"{"error_summary": "expired_access_token/..", "error": {".tag": "expired_access_token"}}"#;
        assert!(matches!(
            classify_response(401, body, None, "/a"),
            RemoteError::AuthExpired
        ));
    }

    #[test]
    fn test_invalid_token() {
        let body = r#"{"error_summary": "invalid_access_token/...", "error": {".tag": "invalid_access_token"}}"#;
        let err = classify_response(401, body, None, "/a");
        assert!(err.is_auth());
        assert!(matches!(err, RemoteError::AuthInvalid(s) if s.starts_with("invalid_access_token")));
    }

    #[test]
    fn test_path_not_found() {
        let body = r#"{"error_summary": "path/not_found/.", "error": {".tag": "path", "path": {".tag": "not_found"}}}"#;
        let err = classify_response(409, body, None, "/missing.txt");
        assert!(matches!(err, RemoteError::NotFound(_)));
        assert_eq!(err.to_string(), "path not found: /missing.txt");
    }

    #[test]
    fn test_other_conflict() {
        let body = r#"{"error_summary": "path/conflict/file/..", "error": {}}"#;
        match classify_response(409, body, None, "/dir") {
            RemoteError::Conflict { path, summary } => {
                assert_eq!(path, "/dir");
                assert!(summary.starts_with("path/conflict"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limited() {
        let err = classify_response(429, "", Some(Duration::from_secs(3)), "/");
        assert!(matches!(
            err,
            RemoteError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_plain_text_body() {
        match classify_response(400, "Error in call to API function \"files/x\"\n", None, "/") {
            RemoteError::Http { status, summary } => {
                assert_eq!(status, 400);
                assert_eq!(summary, "Error in call to API function \"files/x\"");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
