//! Client factory.
//!
//! A [`Gateway`] turns a serialized credential into a ready-to-use client
//! handle. The HTTP transport and request configuration are built once and
//! shared; each handle only carries its own credential.

use std::sync::Arc;

use tracing::trace;
use url::Url;

use crate::client::RemoteClient;
use crate::credential::Credential;
use crate::dropbox::{DropboxClient, RequestConfig};
use crate::error::RemoteError;
use crate::oauth::{self, PkceFlow};

/// Produces client handles from a credential string.
pub trait Gateway: Send + Sync + 'static {
    /// Handle type returned by [`Gateway::client`].
    type Client: RemoteClient + 'static;

    /// Build a client bound to `credential`.
    ///
    /// Fails with [`RemoteError::MalformedCredential`] if the string cannot be
    /// parsed. No network traffic happens here.
    fn client(&self, credential: &str) -> Result<Self::Client, RemoteError>;
}

/// Gateway for the Dropbox v2 API.
#[derive(Clone)]
pub struct DropboxGateway {
    http: reqwest::Client,
    config: Arc<RequestConfig>,
}

impl DropboxGateway {
    /// Build the shared transport from `config`.
    pub fn new(config: RequestConfig) -> Result<Self, RemoteError> {
        let http = config.build_transport()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Request configuration in use.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// URL to send the user to for approving `app_key`.
    pub fn authorize_url(&self, app_key: &str, flow: &PkceFlow) -> Result<Url, RemoteError> {
        oauth::authorize_url(&self.config, app_key, flow)
    }

    /// Exchange the code the user pasted back for a credential.
    pub async fn exchange_code(
        &self,
        app_key: &str,
        code: &str,
        flow: &PkceFlow,
    ) -> Result<Credential, RemoteError> {
        oauth::exchange_code(&self.http, &self.config, app_key, code, flow).await
    }
}

impl Gateway for DropboxGateway {
    type Client = DropboxClient;

    fn client(&self, credential: &str) -> Result<DropboxClient, RemoteError> {
        let credential = Credential::parse(credential)?;
        trace!("building client for {:?}", credential);
        Ok(DropboxClient::new(
            self.http.clone(),
            Arc::clone(&self.config),
            credential,
        ))
    }
}
