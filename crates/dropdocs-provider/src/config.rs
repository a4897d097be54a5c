//! Adapter configuration.
//!
//! Every field has a default, so an empty TOML table is a valid
//! configuration. Durations use humantime syntax (`"30s"`, `"250ms"`).
//!
//! ```toml
//! title = "Dropbox"
//! request_timeout = "60s"
//! traversal_budget = 500
//!
//! [upload_retry]
//! max_attempts = 5
//! initial_backoff = "250ms"
//! max_backoff = "8s"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use dropdocs_remote::RequestConfig;
use dropdocs_remote::dropbox::{
    DEFAULT_API_BASE, DEFAULT_AUTHORIZE_BASE, DEFAULT_CONTENT_BASE, DEFAULT_UPLOAD_CHUNK_SIZE,
};
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::DocumentProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Root under which each adapter creates its private spool directory
    pub spool_dir: PathBuf,

    /// Root title shown by the host
    pub title: String,

    /// Icon reference reported in root and document rows
    pub icon: String,

    /// Locale sent to the remote service
    pub locale: String,

    /// `User-Agent` sent to the remote service
    pub user_agent: String,

    /// Per-request timeout (transport default when unset)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Upload body size before switching to chunked upload sessions
    pub upload_chunk_size: usize,

    /// Follow listing continuation cursors
    pub follow_pagination: bool,

    /// Maximum folders listed by one recents or search walk
    pub traversal_budget: Option<usize>,

    /// Upload verification retry policy
    pub upload_retry: RetryPolicy,

    /// Service endpoints
    pub endpoints: Endpoints,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            spool_dir: std::env::temp_dir().join("dropdocs-spool"),
            title: "Dropbox".to_string(),
            icon: "ic_launcher".to_string(),
            locale: "en_US".to_string(),
            user_agent: concat!("dropdocs/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: None,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            follow_pagination: true,
            traversal_budget: None,
            upload_retry: RetryPolicy::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ProviderConfig {
    /// Request configuration for the remote gateway.
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            user_agent: self.user_agent.clone(),
            locale: self.locale.clone(),
            api_base: self.endpoints.api.clone(),
            content_base: self.endpoints.content.clone(),
            authorize_base: self.endpoints.oauth.clone(),
            timeout: self.request_timeout,
            upload_chunk_size: self.upload_chunk_size,
        }
    }
}

/// Bounded exponential backoff for upload verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Upload attempts before giving up (at least one is always made)
    pub max_attempts: u32,

    /// Delay after the first failed verification
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Remote service base URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// RPC endpoint base
    pub api: String,
    /// Content endpoint base
    pub content: String,
    /// OAuth authorize page base
    pub oauth: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: DEFAULT_API_BASE.to_string(),
            content: DEFAULT_CONTENT_BASE.to_string(),
            oauth: DEFAULT_AUTHORIZE_BASE.to_string(),
        }
    }
}
