//! Test harness wiring a [`DocumentProvider`] to the in-memory remote.

use std::sync::Arc;
use std::time::Duration;

use dropdocs_provider::{
    DocumentColumn, DocumentCursor, DocumentProvider, MemoryCredentialStore, ProviderConfig,
};
use tempfile::TempDir;

use super::mock::{MockGateway, MockRemote};

/// Adapter under test plus handles on its collaborators.
pub struct TestProvider {
    pub remote: Arc<MockRemote>,
    pub store: Arc<MemoryCredentialStore>,
    pub provider: DocumentProvider<MockGateway, MemoryCredentialStore>,
    /// Spool root the adapter creates its private directory in.
    pub spool: TempDir,
}

impl TestProvider {
    /// Logged-in adapter over an empty remote.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Logged-in adapter with a tweaked configuration.
    pub fn with_config(tweak: impl FnOnce(&mut ProviderConfig)) -> Self {
        Self::build(Some(r#"{"access_token":"mock-token"}"#), tweak)
    }

    /// Adapter with no stored credential.
    pub fn logged_out() -> Self {
        Self::build(None, |_| {})
    }

    fn build(credential: Option<&str>, tweak: impl FnOnce(&mut ProviderConfig)) -> Self {
        let spool = TempDir::new().expect("spool dir");
        let mut config = ProviderConfig {
            spool_dir: spool.path().to_path_buf(),
            ..ProviderConfig::default()
        };
        config.upload_retry.initial_backoff = Duration::from_millis(1);
        config.upload_retry.max_backoff = Duration::from_millis(4);
        tweak(&mut config);

        let store = Arc::new(match credential {
            Some(c) => MemoryCredentialStore::with_credential(c),
            None => MemoryCredentialStore::new(),
        });
        let remote = MockRemote::new();
        let provider = DocumentProvider::new(
            MockGateway::new(Arc::clone(&remote)),
            Arc::clone(&store),
            config,
        )
        .expect("provider");

        Self {
            remote,
            store,
            provider,
            spool,
        }
    }

    /// Another adapter over the same remote, store and spool root.
    pub fn sibling(&self) -> DocumentProvider<MockGateway, MemoryCredentialStore> {
        DocumentProvider::new(
            MockGateway::new(Arc::clone(&self.remote)),
            Arc::clone(&self.store),
            self.provider.config().clone(),
        )
        .expect("sibling provider")
    }

    /// Number of spool files held by the adapter.
    pub fn spool_files(&self) -> usize {
        std::fs::read_dir(self.provider.spool_dir())
            .expect("read spool dir")
            .filter(|e| {
                e.as_ref()
                    .is_ok_and(|e| e.file_name().to_string_lossy().starts_with("dropdocs-"))
            })
            .count()
    }
}

/// Document ids of every row, in order.
pub fn ids(cursor: &DocumentCursor) -> Vec<String> {
    (0..cursor.len())
        .map(|row| {
            cursor
                .text(row, DocumentColumn::DocumentId)
                .expect("document id")
                .to_string()
        })
        .collect()
}
