//! OAuth2 authorization-code flow with PKCE.
//!
//! The code flow runs without a redirect URI: the user opens the authorize
//! URL in a browser, approves the app and pastes the displayed code back.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::credential::Credential;
use crate::dropbox::RequestConfig;
use crate::error::{RemoteError, classify_response};

const VERIFIER_LEN: usize = 64;
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// One PKCE attempt: the secret verifier and its public challenge.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    verifier: String,
    challenge: String,
}

impl PkceFlow {
    /// Generate a fresh verifier.
    pub fn new() -> Self {
        let mut rng = rand::rng();
        let verifier: String = (0..VERIFIER_LEN)
            .map(|_| VERIFIER_CHARSET[rng.random_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();
        Self::from_verifier(verifier)
    }

    /// Rebuild a flow from a verifier kept across processes.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }

    /// The secret half, sent with the code exchange.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The S256 challenge, sent with the authorize request.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the URL the user opens to approve the app.
pub fn authorize_url(
    config: &RequestConfig,
    app_key: &str,
    flow: &PkceFlow,
) -> Result<Url, RemoteError> {
    let mut url = Url::parse(&format!("{}/oauth2/authorize", config.authorize_base))
        .map_err(|e| RemoteError::Decode(format!("invalid authorize base: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", app_key)
        .append_pair("response_type", "code")
        .append_pair("token_access_type", "offline")
        .append_pair("code_challenge", flow.challenge())
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// New bearer token
    pub access_token: String,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token (only on the initial exchange)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Account the token belongs to
    #[serde(default)]
    pub account_id: Option<String>,
}

impl TokenResponse {
    /// Turn an initial exchange into a stored credential.
    pub fn into_credential(self, app_key: &str) -> Credential {
        let expires_at = self
            .expires_in
            .map(|secs| Utc::now().timestamp_millis() + secs * 1000);
        let mut credential = Credential::new(self.access_token);
        credential.expires_at = expires_at;
        if let Some(refresh) = self.refresh_token {
            credential = credential.with_refresh(refresh, app_key);
        }
        credential
    }
}

async fn token_request(
    http: &reqwest::Client,
    config: &RequestConfig,
    params: &[(&str, &str)],
) -> Result<TokenResponse, RemoteError> {
    let url = format!("{}/oauth2/token", config.api_base);
    let response = http.post(&url).form(params).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(match classify_response(status.as_u16(), &body, None, "oauth2/token") {
            // The token endpoint reports bad codes and revoked refresh tokens as 400.
            RemoteError::Http { status: 400, summary } => RemoteError::AuthInvalid(summary),
            other => other,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &RequestConfig,
    app_key: &str,
    code: &str,
    flow: &PkceFlow,
) -> Result<Credential, RemoteError> {
    let params = [
        ("code", code.trim()),
        ("grant_type", "authorization_code"),
        ("client_id", app_key),
        ("code_verifier", flow.verifier()),
    ];
    let response = token_request(http, config, &params).await?;
    debug!(account_id = ?response.account_id, "authorization code exchanged");
    Ok(response.into_credential(app_key))
}

/// Obtain a new access token from a refresh token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    config: &RequestConfig,
    refresh_token: &str,
    app_key: &str,
) -> Result<TokenResponse, RemoteError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", app_key),
    ];
    token_request(http, config, &params).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_shape() {
        let flow = PkceFlow::new();
        assert_eq!(flow.verifier().len(), VERIFIER_LEN);
        assert!(flow.verifier().bytes().all(|b| VERIFIER_CHARSET.contains(&b)));
        assert_ne!(flow.verifier(), PkceFlow::new().verifier());
    }

    #[test]
    fn test_challenge_matches_rfc7636_vector() {
        let flow = PkceFlow::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(flow.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_authorize_url() {
        let flow = PkceFlow::from_verifier("v");
        let url = authorize_url(&RequestConfig::default(), "app key", &flow).unwrap();
        assert_eq!(url.host_str(), Some("www.dropbox.com"));
        assert_eq!(url.path(), "/oauth2/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "app key".into())));
        assert!(pairs.contains(&("token_access_type".into(), "offline".into())));
        assert!(pairs.contains(&("code_challenge".into(), flow.challenge().into())));
    }

    #[test]
    fn test_token_response_into_credential() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"sl.x","token_type":"bearer","expires_in":14400,
                "refresh_token":"r","account_id":"dbid:1","uid":"1"}"#,
        )
        .unwrap();
        let before = Utc::now().timestamp_millis();
        let credential = response.into_credential("key");
        assert_eq!(credential.access_token, "sl.x");
        assert!(credential.can_refresh());
        assert!(credential.expires_at.unwrap() >= before + 14_400_000);
    }
}
