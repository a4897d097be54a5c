//! Remote storage contract.
//!
//! [`RemoteClient`] lists the outbound calls the document provider makes.
//! [`crate::DropboxClient`] implements it over HTTP; tests implement it in
//! memory.

use std::io::{Read, Write};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RemoteError;

/// Metadata of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Display path, e.g. `/Documents/report.pdf`
    pub path: String,
    /// Last path component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time recorded by the server
    pub server_modified: DateTime<Utc>,
    /// Whether the file sits in a read-only shared folder
    pub read_only: bool,
}

/// Metadata of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    /// Display path
    pub path: String,
    /// Last path component
    pub name: String,
    /// Whether the folder is a read-only share
    pub read_only: bool,
}

/// A unit of remote metadata. The path identifies the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    /// Regular file
    File(FileEntry),
    /// Folder
    Folder(FolderEntry),
}

impl RemoteEntry {
    /// Display path of the entry.
    pub fn path(&self) -> &str {
        match self {
            RemoteEntry::File(f) => &f.path,
            RemoteEntry::Folder(d) => &d.path,
        }
    }

    /// Display name of the entry.
    pub fn name(&self) -> &str {
        match self {
            RemoteEntry::File(f) => &f.name,
            RemoteEntry::Folder(d) => &d.name,
        }
    }

    /// Whether the entry is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteEntry::Folder(_))
    }

    /// Size in bytes (files only).
    pub fn size(&self) -> Option<u64> {
        match self {
            RemoteEntry::File(f) => Some(f.size),
            RemoteEntry::Folder(_) => None,
        }
    }

    /// Server modification time (files only).
    pub fn server_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            RemoteEntry::File(f) => Some(f.server_modified),
            RemoteEntry::Folder(_) => None,
        }
    }

    /// Whether the entry is read-only for this account.
    pub fn read_only(&self) -> bool {
        match self {
            RemoteEntry::File(f) => f.read_only,
            RemoteEntry::Folder(d) => d.read_only,
        }
    }
}

impl From<FileEntry> for RemoteEntry {
    fn from(value: FileEntry) -> Self {
        RemoteEntry::File(value)
    }
}

impl From<FolderEntry> for RemoteEntry {
    fn from(value: FolderEntry) -> Self {
        RemoteEntry::Folder(value)
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Entries on this page
    pub entries: Vec<RemoteEntry>,
    /// Cursor for `list_folder_continue`
    pub cursor: Option<String>,
    /// Whether more pages follow
    pub has_more: bool,
}

/// Upload conflict behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace whatever is at the path
    Overwrite,
}

impl WriteMode {
    /// API tag for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
        }
    }
}

/// Account summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account id
    pub account_id: String,
    /// Primary email
    pub email: String,
    /// Human readable name
    pub display_name: String,
}

/// Quota usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceUsage {
    /// Bytes used by the account
    pub used: u64,
    /// Bytes allocated to the account (individual or team allocation)
    pub allocated: u64,
}

impl SpaceUsage {
    /// Free space, never negative.
    pub fn available(&self) -> u64 {
        self.allocated.saturating_sub(self.used)
    }
}

/// Thumbnail image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailFormat {
    /// JPEG
    #[default]
    Jpeg,
}

impl ThumbnailFormat {
    /// API tag for this format.
    pub fn as_str(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpeg",
        }
    }
}

/// Thumbnail size buckets offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ThumbnailSize {
    /// 32x32
    W32H32,
    /// 64x64
    #[default]
    W64H64,
    /// 128x128
    W128H128,
    /// 256x256
    W256H256,
    /// 480x320
    W480H320,
    /// 640x480
    W640H480,
    /// 960x640
    W960H640,
    /// 1024x768
    W1024H768,
    /// 2048x1536
    W2048H1536,
}

impl ThumbnailSize {
    const ALL: [ThumbnailSize; 9] = [
        ThumbnailSize::W32H32,
        ThumbnailSize::W64H64,
        ThumbnailSize::W128H128,
        ThumbnailSize::W256H256,
        ThumbnailSize::W480H320,
        ThumbnailSize::W640H480,
        ThumbnailSize::W960H640,
        ThumbnailSize::W1024H768,
        ThumbnailSize::W2048H1536,
    ];

    /// Pixel dimensions `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ThumbnailSize::W32H32 => (32, 32),
            ThumbnailSize::W64H64 => (64, 64),
            ThumbnailSize::W128H128 => (128, 128),
            ThumbnailSize::W256H256 => (256, 256),
            ThumbnailSize::W480H320 => (480, 320),
            ThumbnailSize::W640H480 => (640, 480),
            ThumbnailSize::W960H640 => (960, 640),
            ThumbnailSize::W1024H768 => (1024, 768),
            ThumbnailSize::W2048H1536 => (2048, 1536),
        }
    }

    /// API tag for this size.
    pub fn as_str(self) -> &'static str {
        match self {
            ThumbnailSize::W32H32 => "w32h32",
            ThumbnailSize::W64H64 => "w64h64",
            ThumbnailSize::W128H128 => "w128h128",
            ThumbnailSize::W256H256 => "w256h256",
            ThumbnailSize::W480H320 => "w480h320",
            ThumbnailSize::W640H480 => "w640h480",
            ThumbnailSize::W960H640 => "w960h640",
            ThumbnailSize::W1024H768 => "w1024h768",
            ThumbnailSize::W2048H1536 => "w2048h1536",
        }
    }

    /// Smallest bucket covering the requested size, or the largest bucket.
    pub fn for_hint(width: u32, height: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|size| {
                let (w, h) = size.dimensions();
                w >= width && h >= height
            })
            .unwrap_or(ThumbnailSize::W2048H1536)
    }
}

/// Outbound operations against the remote store.
///
/// Paths are display paths starting with `/`; the account root is the empty
/// string for [`RemoteClient::list_folder`].
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch metadata for one path.
    async fn get_metadata(&self, path: &str) -> Result<RemoteEntry, RemoteError>;

    /// List the first page of a folder.
    async fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError>;

    /// Continue a listing from a cursor.
    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError>;

    /// Stream the content of a file into `sink`. Returns the bytes written.
    async fn download(&self, path: &str, sink: &mut (dyn Write + Send)) -> Result<u64, RemoteError>;

    /// Upload everything readable from `source` to `path`.
    async fn upload(
        &self,
        path: &str,
        mode: WriteMode,
        source: &mut (dyn Read + Send),
    ) -> Result<FileEntry, RemoteError>;

    /// Create a folder.
    async fn create_folder(&self, path: &str) -> Result<FolderEntry, RemoteError>;

    /// Delete a file or folder (recursively).
    async fn delete(&self, path: &str) -> Result<RemoteEntry, RemoteError>;

    /// Stream a thumbnail rendition of an image into `sink`.
    async fn get_thumbnail(
        &self,
        path: &str,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError>;

    /// Fetch the account owning the credential.
    async fn current_account(&self) -> Result<Account, RemoteError>;

    /// Fetch quota usage.
    async fn space_usage(&self) -> Result<SpaceUsage, RemoteError>;
}
