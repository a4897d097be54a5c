//! Serialized credential material.
//!
//! The credential is stored as one opaque string. We write JSON with the same
//! field names the Dropbox SDKs use, and also accept a bare access token for
//! stores written before refresh tokens existed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Token material authorizing API access.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// OAuth2 bearer token
    pub access_token: String,
    /// Expiry of the access token as unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Long-lived refresh token (offline access)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// App key the tokens were issued to; required for refreshing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
}

impl Credential {
    /// Create a credential from a bare access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
            refresh_token: None,
            app_key: None,
        }
    }

    /// Attach a refresh token and the app key it belongs to.
    #[must_use]
    pub fn with_refresh(
        mut self,
        refresh_token: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self.app_key = Some(app_key.into());
        self
    }

    /// Parse a serialized credential.
    ///
    /// Accepts the JSON form produced by [`Credential::serialize`] or a bare
    /// access token.
    pub fn parse(serialized: &str) -> Result<Self, RemoteError> {
        let trimmed = serialized.trim();
        if trimmed.is_empty() {
            return Err(RemoteError::MalformedCredential("empty credential".to_string()));
        }

        if trimmed.starts_with('{') {
            let credential: Credential = serde_json::from_str(trimmed)
                .map_err(|e| RemoteError::MalformedCredential(e.to_string()))?;
            if credential.access_token.is_empty() {
                return Err(RemoteError::MalformedCredential(
                    "missing access_token".to_string(),
                ));
            }
            return Ok(credential);
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(RemoteError::MalformedCredential(
                "token contains whitespace".to_string(),
            ));
        }
        Ok(Credential::new(trimmed))
    }

    /// Serialize to the string stored by the credential store.
    pub fn serialize(&self) -> Result<String, RemoteError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the credential carries what is needed to refresh the access token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.app_key.is_some()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("app_key", &self.app_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let json = r#"{"access_token":"sl.abc","expires_at":1700000000000,"refresh_token":"r1","app_key":"key"}"#;
        let credential = Credential::parse(json).unwrap();
        assert_eq!(credential.access_token, "sl.abc");
        assert_eq!(credential.expires_at, Some(1_700_000_000_000));
        assert!(credential.can_refresh());
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let json = r#"{"access_token":"t","app_secret":null}"#;
        let credential = Credential::parse(json).unwrap();
        assert_eq!(credential, Credential::new("t"));
        assert!(!credential.can_refresh());
    }

    #[test]
    fn test_parse_bare_token() {
        assert_eq!(Credential::parse(" legacy-token\n").unwrap(), Credential::new("legacy-token"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Credential::parse(""),
            Err(RemoteError::MalformedCredential(_))
        ));
        assert!(matches!(
            Credential::parse("{not json"),
            Err(RemoteError::MalformedCredential(_))
        ));
        assert!(matches!(
            Credential::parse(r#"{"access_token":""}"#),
            Err(RemoteError::MalformedCredential(_))
        ));
        assert!(matches!(
            Credential::parse("two words"),
            Err(RemoteError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_serialize_parses_back() {
        let credential = Credential::new("tok").with_refresh("refresh", "app");
        let serialized = credential.serialize().unwrap();
        assert!(!serialized.contains("expires_at"));
        assert_eq!(Credential::parse(&serialized).unwrap(), credential);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential::new("secret-token").with_refresh("secret-refresh", "app");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("app"));
    }
}
