//! In-memory remote used by the integration tests.
//!
//! `MockRemote` holds a tree of files and folders and implements
//! [`RemoteClient`] over it. Like Dropbox, paths match case-insensitively
//! and entries report the case they were created with. Every call is
//! counted, and calls overlap-check themselves so tests can assert
//! single-flight behaviour.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropdocs_remote::{
    Account, Credential, FileEntry, FolderEntry, Gateway, ListPage, RemoteClient, RemoteEntry,
    RemoteError, SpaceUsage, ThumbnailFormat, ThumbnailSize, WriteMode,
};

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        modified: DateTime<Utc>,
        read_only: bool,
    },
    Folder,
}

/// Node stored under a lowercased key, with the path as displayed.
#[derive(Debug, Clone)]
struct Stored {
    display: String,
    node: Node,
}

/// Shared state behind every mock client.
pub struct MockRemote {
    tree: Mutex<BTreeMap<String, Stored>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    clients_built: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stale_reports: AtomicUsize,
    page_size: AtomicUsize,
    call_delay: Mutex<Duration>,
    clock: AtomicUsize,
    email: String,
    used: u64,
    allocated: u64,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self {
            tree: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(HashMap::new()),
            clients_built: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            stale_reports: AtomicUsize::new(0),
            page_size: AtomicUsize::new(usize::MAX),
            call_delay: Mutex::new(Duration::ZERO),
            clock: AtomicUsize::new(1_600_000_000),
            email: "user@example.com".to_string(),
            used: 1_000,
            allocated: 10_000,
        }
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

fn key(path: &str) -> String {
    path.to_lowercase()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "",
        Some(i) => &path[..i],
    }
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn tick(&self) -> DateTime<Utc> {
        let secs = self.clock.fetch_add(60, Ordering::SeqCst);
        DateTime::from_timestamp(secs as i64, 0).unwrap()
    }

    /// Store `node` at `path`, keeping the displayed case of existing
    /// entries and parent folders the way the service does.
    fn insert(&self, path: &str, node: Node) {
        let mut tree = self.tree.lock().unwrap();
        let display = match tree.get(&key(path)) {
            Some(existing) => existing.display.clone(),
            None => match tree.get(&key(parent_of(path))) {
                Some(parent) => format!("{}/{}", parent.display, name_of(path)),
                None => path.to_string(),
            },
        };
        tree.insert(key(path), Stored { display, node });
    }

    fn node(&self, path: &str) -> Option<Stored> {
        self.tree.lock().unwrap().get(&key(path)).cloned()
    }

    /// Add a folder (parents are not created implicitly).
    pub fn add_folder(&self, path: &str) {
        self.insert(path, Node::Folder);
    }

    /// Add a file; each call gets a later modification time than the last.
    pub fn add_file(&self, path: &str, data: &[u8]) {
        let modified = self.tick();
        self.add_file_at(path, data, modified.timestamp());
    }

    /// Add a file with an explicit modification time (unix seconds).
    pub fn add_file_at(&self, path: &str, data: &[u8], modified: i64) {
        self.insert(
            path,
            Node::File {
                data: data.to_vec(),
                modified: DateTime::from_timestamp(modified, 0).unwrap(),
                read_only: false,
            },
        );
    }

    /// Add a file inside a read-only share.
    pub fn add_read_only_file(&self, path: &str, data: &[u8]) {
        let modified = self.tick();
        self.insert(
            path,
            Node::File {
                data: data.to_vec(),
                modified,
                read_only: true,
            },
        );
    }

    /// Current content of a file.
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        match self.node(path) {
            Some(Stored {
                node: Node::File { data, .. },
                ..
            }) => Some(data),
            _ => None,
        }
    }

    /// Whether anything exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.tree.lock().unwrap().contains_key(&key(path))
    }

    /// Whether `path` is a folder.
    pub fn is_folder(&self, path: &str) -> bool {
        matches!(self.node(path).map(|s| s.node), Some(Node::Folder))
    }

    /// The next `count` metadata reads of a file report a wrong size.
    pub fn report_stale_size(&self, count: usize) {
        self.stale_reports.store(count, Ordering::SeqCst);
    }

    /// Split listings into pages of `size` entries.
    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Make every call take at least `delay`.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = delay;
    }

    /// Calls made to one operation.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Calls made to all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Clients handed out by the gateway.
    pub fn clients_built(&self) -> usize {
        self.clients_built.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn available(&self) -> u64 {
        self.allocated - self.used
    }

    /// Displayed path of whatever is at `path`.
    pub fn display_path(&self, path: &str) -> Option<String> {
        self.node(path).map(|s| s.display)
    }

    fn entry(&self, stored: &Stored) -> RemoteEntry {
        let path = stored.display.as_str();
        match &stored.node {
            Node::File {
                data,
                modified,
                read_only,
            } => RemoteEntry::File(FileEntry {
                path: path.to_string(),
                name: name_of(path),
                size: data.len() as u64,
                server_modified: *modified,
                read_only: *read_only,
            }),
            Node::Folder => RemoteEntry::Folder(FolderEntry {
                path: path.to_string(),
                name: name_of(path),
                read_only: false,
            }),
        }
    }

    fn children(&self, folder: &str) -> Vec<RemoteEntry> {
        let folder = key(folder);
        let tree = self.tree.lock().unwrap();
        tree.iter()
            .filter(|(path, _)| parent_of(path) == folder)
            .map(|(_, stored)| self.entry(stored))
            .collect()
    }

    fn page(&self, folder: &str, offset: usize) -> ListPage {
        let children = self.children(folder);
        let size = self.page_size.load(Ordering::SeqCst);
        let end = offset.saturating_add(size).min(children.len());
        let has_more = end < children.len();
        ListPage {
            entries: children[offset.min(end)..end].to_vec(),
            cursor: Some(format!("{folder}\n{end}")),
            has_more,
        }
    }

    async fn enter(&self, op: &'static str) -> InFlight<'_> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.call_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        InFlight(self)
    }
}

struct InFlight<'a>(&'a MockRemote);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client handle over a [`MockRemote`].
pub struct MockClient {
    remote: Arc<MockRemote>,
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn get_metadata(&self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let _call = self.remote.enter("get_metadata").await;
        let mut entry = match self.remote.node(path) {
            Some(stored) => self.remote.entry(&stored),
            None => return Err(RemoteError::NotFound(path.to_string())),
        };
        if let RemoteEntry::File(f) = &mut entry {
            let stale = self
                .remote
                .stale_reports
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                f.size = f.size.wrapping_add(1);
            }
        }
        Ok(entry)
    }

    async fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError> {
        let _call = self.remote.enter("list_folder").await;
        if !path.is_empty() && !self.remote.is_folder(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        Ok(self.remote.page(path, 0))
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError> {
        let _call = self.remote.enter("list_folder_continue").await;
        let (folder, offset) = cursor
            .split_once('\n')
            .ok_or_else(|| RemoteError::Decode("bad cursor".into()))?;
        let offset = offset
            .parse()
            .map_err(|_| RemoteError::Decode("bad cursor offset".into()))?;
        Ok(self.remote.page(folder, offset))
    }

    async fn download(
        &self,
        path: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError> {
        let _call = self.remote.enter("download").await;
        let data = self
            .remote
            .content(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    async fn upload(
        &self,
        path: &str,
        _mode: WriteMode,
        source: &mut (dyn Read + Send),
    ) -> Result<FileEntry, RemoteError> {
        let _call = self.remote.enter("upload").await;
        if self.remote.is_folder(path) {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
                summary: "path/conflict/folder/".into(),
            });
        }
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let modified = self.remote.tick();
        self.remote.insert(
            path,
            Node::File {
                data,
                modified,
                read_only: false,
            },
        );
        let stored = self.remote.node(path).expect("just uploaded");
        match self.remote.entry(&stored) {
            RemoteEntry::File(f) => Ok(f),
            RemoteEntry::Folder(_) => unreachable!(),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<FolderEntry, RemoteError> {
        let _call = self.remote.enter("create_folder").await;
        if self.remote.exists(path) {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
                summary: "path/conflict/folder/".into(),
            });
        }
        self.remote.add_folder(path);
        let stored = self.remote.node(path).expect("just created");
        match self.remote.entry(&stored) {
            RemoteEntry::Folder(f) => Ok(f),
            RemoteEntry::File(_) => unreachable!(),
        }
    }

    async fn delete(&self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let _call = self.remote.enter("delete").await;
        let mut tree = self.remote.tree.lock().unwrap();
        let stored = tree
            .remove(&key(path))
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        let prefix = format!("{}/", key(path));
        tree.retain(|p, _| !p.starts_with(&prefix));
        Ok(self.remote.entry(&stored))
    }

    async fn get_thumbnail(
        &self,
        path: &str,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError> {
        let _call = self.remote.enter("get_thumbnail").await;
        if self.remote.content(path).is_none() {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        let body = format!("{}:{}", format.as_str(), size.as_str());
        sink.write_all(body.as_bytes())?;
        Ok(body.len() as u64)
    }

    async fn current_account(&self) -> Result<Account, RemoteError> {
        let _call = self.remote.enter("current_account").await;
        Ok(Account {
            account_id: "dbid:mock".into(),
            email: self.remote.email.clone(),
            display_name: "Mock User".into(),
        })
    }

    async fn space_usage(&self) -> Result<SpaceUsage, RemoteError> {
        let _call = self.remote.enter("space_usage").await;
        Ok(SpaceUsage {
            used: self.remote.used,
            allocated: self.remote.allocated,
        })
    }
}

/// Gateway handing out [`MockClient`]s.
pub struct MockGateway {
    remote: Arc<MockRemote>,
}

impl MockGateway {
    pub fn new(remote: Arc<MockRemote>) -> Self {
        Self { remote }
    }
}

impl Gateway for MockGateway {
    type Client = MockClient;

    fn client(&self, credential: &str) -> Result<MockClient, RemoteError> {
        let credential = Credential::parse(credential)?;
        if credential.access_token == "revoked" {
            return Err(RemoteError::AuthInvalid("invalid_access_token/".into()));
        }
        self.remote.clients_built.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient {
            remote: Arc::clone(&self.remote),
        })
    }
}
