//! Document-provider adapter over a Dropbox account.
//!
//! [`DocumentProvider`] answers the host's document-provider queries (roots,
//! children, single documents, recents, search) with tabular cursors, and
//! opens documents as spool-file backed handles that upload on close.
//!
//! ```ignore
//! let store = Arc::new(FileCredentialStore::open(prefs_path)?);
//! let gateway = DropboxGateway::new(config.request_config())?;
//! let provider = DocumentProvider::new(gateway, store, config)?;
//!
//! let children = provider.query_child_documents("/", None)?;
//! ```

pub mod cache;
pub mod config;
pub mod cursor;
pub mod error;
pub mod item;
pub mod provider;
pub mod session;
pub mod spool;
pub mod store;
pub mod traversal;

pub use cache::{CacheStats, MetadataCache};
pub use config::{Endpoints, ProviderConfig, RetryPolicy};
pub use cursor::{Column, DocumentColumn, DocumentCursor, RootColumn, RootCursor, Value};
pub use error::ProviderError;
pub use item::{MIME_TYPE_DIR, ROOT_DOCUMENT_ID, ROOT_ID};
pub use provider::{DocumentProvider, OpenMode, OpenedDocument, WriteHandle};
pub use session::{NoopNotifier, RootsNotifier, Session};
pub use spool::{AssetHandle, ReadHandle, SpoolDir};
pub use store::{CREDENTIAL_KEY, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use traversal::{MAX_LAST_MODIFIED, MAX_SEARCH_RESULTS};
