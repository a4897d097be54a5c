//! Document-provider adapter.
//!
//! [`DocumentProvider`] maps the host's synchronous document-provider calls
//! onto the remote API. Remote work runs on a private tokio runtime and every
//! remote-touching path takes one adapter-wide lock, so at most one remote
//! call is in flight per adapter.

use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use dropdocs_remote::{
    Gateway, RemoteClient, RemoteEntry, RemoteError, ThumbnailFormat, ThumbnailSize, WriteMode,
};
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, trace, warn};

use crate::cache::{CacheStats, MetadataCache};
use crate::config::ProviderConfig;
use crate::cursor::{DocumentColumn, DocumentCursor, RootColumn, RootCursor};
use crate::error::ProviderError;
use crate::item::{
    FLAG_DIR_SUPPORTS_CREATE, MIME_TYPE_DIR, ROOT_DISPLAY_NAME, ROOT_DOCUMENT_ID, ROOT_FLAGS,
    ROOT_ID, ROOT_MIME_TYPES, child_document_id, document_flags, mime_type, remote_path,
};
use crate::spool::{AssetHandle, ReadHandle, SpoolDir};
use crate::store::CredentialStore;
use crate::traversal::{self, MAX_SEARCH_RESULTS, NameMatcher, RecentFiles, WalkOptions};

// ============================================================================
// Open modes
// ============================================================================

/// Access mode requested when opening a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `wt`
    WriteTruncate,
    /// `wa`
    WriteAppend,
    /// `rw`
    ReadWrite,
    /// `rwt`
    ReadWriteTruncate,
}

impl OpenMode {
    /// Whether the handle uploads on close.
    pub fn is_write(self) -> bool {
        self != OpenMode::Read
    }

    /// Whether the spool file starts with the current remote content.
    pub fn preloads_content(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite | OpenMode::WriteAppend)
    }
}

impl FromStr for OpenMode {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "wt" => Ok(OpenMode::WriteTruncate),
            "wa" => Ok(OpenMode::WriteAppend),
            "rw" => Ok(OpenMode::ReadWrite),
            "rwt" => Ok(OpenMode::ReadWriteTruncate),
            other => Err(ProviderError::InvalidArgument(format!("unsupported mode: {other:?}"))),
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// State shared with background lookups and write handles.
///
/// Never holds the runtime, so dropping it from a runtime thread is safe.
struct Shared<G: Gateway, S: CredentialStore> {
    gateway: G,
    store: Arc<S>,
    cache: MetadataCache,
    remote_lock: Mutex<()>,
    spool: SpoolDir,
    config: ProviderConfig,
}

impl<G: Gateway, S: CredentialStore> Shared<G, S> {
    /// Derive a fresh client from the stored credential.
    fn client(&self) -> Result<G::Client, ProviderError> {
        let credential = self
            .store
            .credential()
            .ok_or(ProviderError::AuthenticationRequired)?;
        Ok(self.gateway.client(&credential)?)
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            follow_pagination: self.config.follow_pagination,
            folder_budget: self.config.traversal_budget,
        }
    }

    /// Single metadata lookup under the remote lock.
    async fn lookup(&self, client: G::Client, path: String) -> Result<RemoteEntry, RemoteError> {
        let _guard = self.remote_lock.lock().await;
        client.get_metadata(&path).await
    }

    /// Upload the spool file and verify the remote size, retrying with backoff.
    async fn commit(
        &self,
        client: &G::Client,
        path: &str,
        spool: &NamedTempFile,
        expected: u64,
    ) -> Result<RemoteEntry, ProviderError> {
        let policy = &self.config.upload_retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut actual = 0;

        for attempt in 1..=max_attempts {
            let mut source = spool.as_file().try_clone()?;
            source.seek(SeekFrom::Start(0))?;
            let entry = {
                let _guard = self.remote_lock.lock().await;
                client.upload(path, WriteMode::Overwrite, &mut source).await?;
                client.get_metadata(path).await?
            };

            match &entry {
                RemoteEntry::Folder(_) => {
                    error!("upload of {} found a folder at the target path", path);
                    return Err(ProviderError::RemoteConflict(path.to_string()));
                }
                RemoteEntry::File(f) if f.size == expected => {
                    debug!(
                        "upload of {} verified at {} bytes (attempt {})",
                        path, expected, attempt
                    );
                    self.cache.upsert(&entry);
                    return Ok(entry);
                }
                RemoteEntry::File(f) => actual = f.size,
            }

            if attempt < max_attempts {
                let delay = policy.backoff(attempt);
                warn!(
                    "remote size of {} is {} after upload, expected {}; retrying in {:?}",
                    path, actual, expected, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(ProviderError::TransferIncomplete {
            path: path.to_string(),
            expected,
            actual,
            attempts: max_attempts,
        })
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// The document-provider adapter.
///
/// All methods are synchronous and block the calling thread; they must not be
/// called from inside an async runtime.
pub struct DocumentProvider<G: Gateway, S: CredentialStore> {
    runtime: Arc<Runtime>,
    shared: Arc<Shared<G, S>>,
}

impl<G: Gateway, S: CredentialStore> DocumentProvider<G, S> {
    /// Create an adapter with its own I/O runtime.
    ///
    /// Creates a private spool directory under `config.spool_dir`, removing
    /// ones abandoned by adapters that are no longer running.
    pub fn new(gateway: G, store: Arc<S>, config: ProviderConfig) -> Result<Self, ProviderError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("dropdocs-io")
            .enable_all()
            .build()?;
        Self::with_runtime(Arc::new(runtime), gateway, store, config)
    }

    /// Create an adapter on an existing runtime.
    pub fn with_runtime(
        runtime: Arc<Runtime>,
        gateway: G,
        store: Arc<S>,
        config: ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let spool = SpoolDir::prepare(&config.spool_dir)?;
        Ok(Self {
            runtime,
            shared: Arc::new(Shared {
                gateway,
                store,
                cache: MetadataCache::new(),
                remote_lock: Mutex::new(()),
                spool,
                config,
            }),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ProviderConfig {
        &self.shared.config
    }

    /// Credential store backing this adapter.
    pub fn store(&self) -> &Arc<S> {
        &self.shared.store
    }

    /// Private directory holding this adapter's spool files.
    pub fn spool_dir(&self) -> &Path {
        self.shared.spool.path()
    }

    /// Metadata cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats()
    }

    /// Run `f` with a fresh client while holding the remote lock.
    fn with_remote<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce(G::Client) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let client = self.shared.client()?;
        let result = self.runtime.block_on(async {
            let _guard = self.shared.remote_lock.lock().await;
            f(client).await
        });
        result.map_err(|e| {
            let e = ProviderError::from(e);
            warn!("{} failed ({}): {}", operation, e.error_domain(), e);
            e
        })
    }

    fn include_entry(&self, cursor: &mut DocumentCursor, entry: &RemoteEntry) {
        self.include_entry_as(cursor, entry.path(), entry);
    }

    /// Add a row for `entry` under the id the host knows it by.
    fn include_entry_as(
        &self,
        cursor: &mut DocumentCursor,
        document_id: &str,
        entry: &RemoteEntry,
    ) {
        let mime = mime_type(entry);
        let flags = document_flags(entry, &mime);
        cursor
            .new_row()
            .add(DocumentColumn::DocumentId, document_id)
            .add(DocumentColumn::DisplayName, entry.name())
            .add(DocumentColumn::Size, entry.size())
            .add(
                DocumentColumn::LastModified,
                entry.server_modified().map(|t| t.timestamp_millis()),
            )
            .add(DocumentColumn::Flags, flags)
            .add(DocumentColumn::Icon, self.shared.config.icon.as_str())
            .add(DocumentColumn::MimeType, mime);
    }

    fn include_root_folder(&self, cursor: &mut DocumentCursor) {
        cursor
            .new_row()
            .add(DocumentColumn::DocumentId, ROOT_DOCUMENT_ID)
            .add(DocumentColumn::DisplayName, ROOT_DISPLAY_NAME)
            .add(DocumentColumn::MimeType, MIME_TYPE_DIR)
            .add(DocumentColumn::Flags, FLAG_DIR_SUPPORTS_CREATE)
            .add(DocumentColumn::Icon, self.shared.config.icon.as_str());
    }

    fn check_root(root_id: &str) -> Result<(), ProviderError> {
        if root_id == ROOT_ID {
            Ok(())
        } else {
            Err(ProviderError::InvalidArgument(format!("unknown root: {root_id}")))
        }
    }

    /// List the roots: none when logged out, exactly one otherwise.
    pub fn query_roots(
        &self,
        projection: Option<&[RootColumn]>,
    ) -> Result<RootCursor, ProviderError> {
        debug!("query_roots");
        let mut cursor = RootCursor::new(projection);
        if !self.shared.store.has_credential() {
            debug!("query_roots: no credential, reporting no roots");
            return Ok(cursor);
        }

        let (account, usage) = self.with_remote("query_roots", |client| async move {
            let account = client.current_account().await?;
            let usage = client.space_usage().await?;
            Ok((account, usage))
        })?;

        let config = &self.shared.config;
        cursor
            .new_row()
            .add(RootColumn::RootId, ROOT_ID)
            .add(RootColumn::Summary, account.email)
            .add(RootColumn::Flags, ROOT_FLAGS)
            .add(RootColumn::Title, config.title.as_str())
            .add(RootColumn::DocumentId, ROOT_DOCUMENT_ID)
            .add(RootColumn::MimeTypes, ROOT_MIME_TYPES)
            .add(RootColumn::AvailableBytes, usage.available())
            .add(RootColumn::Icon, config.icon.as_str());
        Ok(cursor)
    }

    /// List the children of a folder and cache every entry.
    pub fn query_child_documents(
        &self,
        parent_id: &str,
        projection: Option<&[DocumentColumn]>,
    ) -> Result<DocumentCursor, ProviderError> {
        debug!("query_child_documents: {}", parent_id);
        let path = remote_path(parent_id).to_string();
        let follow = self.shared.config.follow_pagination;

        let entries = self.with_remote("query_child_documents", |client| async move {
            traversal::list_folder(&client, &path, follow).await
        })?;

        let mut cursor = DocumentCursor::new(projection);
        for entry in &entries {
            self.include_entry(&mut cursor, entry);
            self.shared.cache.upsert(entry);
        }
        Ok(cursor)
    }

    /// Describe a single document, from the cache when possible.
    ///
    /// The row carries `document_id` as given, whatever case the remote
    /// reports for the path.
    pub fn query_document(
        &self,
        document_id: &str,
        projection: Option<&[DocumentColumn]>,
    ) -> Result<DocumentCursor, ProviderError> {
        debug!("query_document: {}", document_id);
        let mut cursor = DocumentCursor::new(projection);

        if document_id == ROOT_DOCUMENT_ID {
            self.include_root_folder(&mut cursor);
            return Ok(cursor);
        }

        if let Some(entry) = self.shared.cache.get(document_id) {
            trace!("query_document: cache hit for {}", document_id);
            self.include_entry_as(&mut cursor, document_id, &entry);
            return Ok(cursor);
        }

        let entry = self.lookup_off_thread(document_id)?;
        self.shared.cache.upsert(&entry);
        self.include_entry_as(&mut cursor, document_id, &entry);
        Ok(cursor)
    }

    /// Run a metadata lookup as a runtime task and wait for it on a one-shot gate.
    fn lookup_off_thread(&self, path: &str) -> Result<RemoteEntry, ProviderError> {
        let client = self.shared.client()?;
        let shared = Arc::clone(&self.shared);
        let owned_path = path.to_string();
        let (tx, rx) = oneshot::channel();

        self.runtime.spawn(async move {
            let result = shared.lookup(client, owned_path).await;
            // The receiver only goes away if the caller panicked.
            let _ = tx.send(result);
        });

        let result = rx
            .blocking_recv()
            .map_err(|_| ProviderError::Remote(format!("lookup of {path} was cancelled")))?;
        result.map_err(|e| {
            let e = ProviderError::from(e);
            warn!("query_document failed ({}): {}", e.error_domain(), e);
            e
        })
    }

    /// Most recently modified files across the account, newest first.
    pub fn query_recent_documents(
        &self,
        root_id: &str,
        projection: Option<&[DocumentColumn]>,
    ) -> Result<DocumentCursor, ProviderError> {
        debug!("query_recent_documents: {}", root_id);
        Self::check_root(root_id)?;
        let options = self.shared.walk_options();
        let cache = &self.shared.cache;

        let recents = self.with_remote("query_recent_documents", |client| async move {
            let mut recents = RecentFiles::new();
            let listed = traversal::walk(&client, options, |entry| {
                if let RemoteEntry::File(file) = entry {
                    cache.upsert(entry);
                    recents.offer(file);
                }
                ControlFlow::Continue(())
            })
            .await?;
            trace!("recents walk listed {} folders", listed);
            Ok(recents.into_newest_first())
        })?;

        let mut cursor = DocumentCursor::new(projection);
        for file in recents {
            self.include_entry(&mut cursor, &RemoteEntry::File(file));
        }
        Ok(cursor)
    }

    /// Files whose name contains `query`, case-insensitively.
    pub fn query_search_documents(
        &self,
        root_id: &str,
        query: &str,
        projection: Option<&[DocumentColumn]>,
    ) -> Result<DocumentCursor, ProviderError> {
        debug!("query_search_documents: {} {:?}", root_id, query);
        Self::check_root(root_id)?;
        let options = self.shared.walk_options();
        let cache = &self.shared.cache;
        let matcher = NameMatcher::new(query);

        let matches = self.with_remote("query_search_documents", |client| async move {
            let mut matches = Vec::new();
            traversal::walk(&client, options, |entry| {
                if entry.is_folder() || !matcher.matches(entry.name()) {
                    return ControlFlow::Continue(());
                }
                cache.upsert(entry);
                matches.push(entry.clone());
                if matches.len() >= MAX_SEARCH_RESULTS {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await?;
            Ok(matches)
        })?;

        let mut cursor = DocumentCursor::new(projection);
        for entry in &matches {
            self.include_entry(&mut cursor, entry);
        }
        Ok(cursor)
    }

    /// Open a document for reading.
    ///
    /// The whole object is downloaded into a spool file before returning.
    pub fn open_for_read(&self, document_id: &str) -> Result<ReadHandle, ProviderError> {
        let mut spool = self.shared.spool.create()?;
        let len = self.download_into(document_id, spool.as_file_mut())?;
        Ok(ReadHandle::new(spool, len)?)
    }

    /// Open a document for writing; content is uploaded on [`WriteHandle::close`].
    pub fn open_for_write(
        &self,
        document_id: &str,
        mode: OpenMode,
    ) -> Result<WriteHandle<G, S>, ProviderError> {
        if !mode.is_write() {
            return Err(ProviderError::InvalidArgument(
                "read mode passed to open_for_write".to_string(),
            ));
        }
        if document_id == ROOT_DOCUMENT_ID {
            return Err(ProviderError::InvalidArgument("cannot write the root folder".to_string()));
        }

        let mut spool = self.shared.spool.create()?;
        if mode.preloads_content() {
            self.download_into(document_id, spool.as_file_mut())?;
            let position = if mode == OpenMode::WriteAppend {
                SeekFrom::End(0)
            } else {
                SeekFrom::Start(0)
            };
            spool.as_file_mut().seek(position)?;
        }

        Ok(WriteHandle {
            path: document_id.to_string(),
            spool: Some(spool),
            runtime: Arc::clone(&self.runtime),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Open a document with a host mode string (`r`, `w`, `wt`, `wa`, `rw`, `rwt`).
    pub fn open_document(
        &self,
        document_id: &str,
        mode: &str,
    ) -> Result<OpenedDocument<G, S>, ProviderError> {
        debug!("open_document: {} mode={}", document_id, mode);
        let mode: OpenMode = mode.parse()?;
        if mode.is_write() {
            self.open_for_write(document_id, mode).map(OpenedDocument::Write)
        } else {
            self.open_for_read(document_id).map(OpenedDocument::Read)
        }
    }

    fn download_into(&self, document_id: &str, sink: &mut File) -> Result<u64, ProviderError> {
        let path = document_id.to_string();
        self.with_remote("download", |client| async move {
            client.download(&path, sink).await
        })
    }

    /// Fetch a thumbnail rendition sized for `size_hint` (width, height).
    pub fn open_document_thumbnail(
        &self,
        document_id: &str,
        size_hint: (u32, u32),
    ) -> Result<AssetHandle, ProviderError> {
        debug!("open_document_thumbnail: {} hint={:?}", document_id, size_hint);
        let size = ThumbnailSize::for_hint(size_hint.0, size_hint.1);
        let path = document_id.to_string();
        let mut spool = self.shared.spool.create()?;
        let sink = spool.as_file_mut();

        let written = self.with_remote("open_document_thumbnail", |client| async move {
            client
                .get_thumbnail(&path, ThumbnailFormat::Jpeg, size, sink)
                .await
        })?;
        trace!("thumbnail for {} is {} bytes ({})", document_id, written, size.as_str());
        Ok(AssetHandle::new(spool)?)
    }

    /// Create an empty document (or a folder) and return its id.
    pub fn create_document(
        &self,
        parent_id: &str,
        mime_type: &str,
        display_name: &str,
    ) -> Result<String, ProviderError> {
        debug!("create_document: {} {:?} ({})", parent_id, display_name, mime_type);
        let document_id = child_document_id(parent_id, display_name)?;
        let path = document_id.clone();
        let is_dir = mime_type == MIME_TYPE_DIR;

        let entry = self.with_remote("create_document", |client| async move {
            if is_dir {
                client.create_folder(&path).await.map(RemoteEntry::from)
            } else {
                let mut empty = io::empty();
                client
                    .upload(&path, WriteMode::Overwrite, &mut empty)
                    .await
                    .map(RemoteEntry::from)
            }
        })?;

        self.shared.cache.upsert(&entry);
        Ok(document_id)
    }

    /// Delete a document and forget everything cached below it.
    pub fn delete_document(&self, document_id: &str) -> Result<(), ProviderError> {
        debug!("delete_document: {}", document_id);
        if document_id == ROOT_DOCUMENT_ID {
            return Err(ProviderError::InvalidArgument("cannot delete the root folder".to_string()));
        }

        let path = document_id.to_string();
        let result = self.with_remote("delete_document", |client| async move {
            client.delete(&path).await
        });
        let evicted = self.shared.cache.evict_tree(document_id);
        trace!("evicted {} cache entries under {}", evicted, document_id);
        result.map(|_| ())
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Result of [`DocumentProvider::open_document`].
pub enum OpenedDocument<G: Gateway, S: CredentialStore> {
    /// Read-only descriptor
    Read(ReadHandle),
    /// Writable descriptor uploading on close
    Write(WriteHandle<G, S>),
}

/// Writable descriptor over a spool file.
///
/// Nothing reaches the remote until [`WriteHandle::close`] is called.
/// Dropping the handle without closing it discards the written content.
pub struct WriteHandle<G: Gateway, S: CredentialStore> {
    path: String,
    spool: Option<NamedTempFile>,
    runtime: Arc<Runtime>,
    shared: Arc<Shared<G, S>>,
}

impl<G: Gateway, S: CredentialStore> WriteHandle<G, S> {
    /// Document id being written.
    pub fn document_id(&self) -> &str {
        &self.path
    }

    /// Location of the backing spool file.
    pub fn spool_path(&self) -> Option<&Path> {
        self.spool.as_ref().map(NamedTempFile::path)
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.spool
            .as_mut()
            .map(NamedTempFile::as_file_mut)
            .ok_or_else(|| io::Error::other("write handle already closed"))
    }

    /// Upload the content and wait until the remote size matches.
    ///
    /// Returns the verified remote metadata, which is also cached.
    pub fn close(mut self) -> Result<RemoteEntry, ProviderError> {
        let Some(mut spool) = self.spool.take() else {
            return Err(ProviderError::InvalidArgument("write handle already closed".to_string()));
        };
        spool.flush()?;
        let expected = spool.as_file().metadata()?.len();
        debug!("close: uploading {} bytes to {}", expected, self.path);

        let client = self.shared.client()?;
        let result = self
            .runtime
            .block_on(self.shared.commit(&client, &self.path, &spool, expected));
        if let Err(e) = &result {
            warn!("close of {} failed ({}): {}", self.path, e.error_domain(), e);
        }
        result
    }
}

impl<G: Gateway, S: CredentialStore> Read for WriteHandle<G, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl<G: Gateway, S: CredentialStore> Write for WriteHandle<G, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl<G: Gateway, S: CredentialStore> Seek for WriteHandle<G, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl<G: Gateway, S: CredentialStore> Drop for WriteHandle<G, S> {
    fn drop(&mut self) {
        if self.spool.is_some() {
            warn!("write handle for {} dropped without close; content discarded", self.path);
        }
    }
}
