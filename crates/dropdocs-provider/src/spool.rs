//! Spool files backing open documents.
//!
//! Every open descriptor is backed by a uniquely named temporary file in the
//! spool directory. The file is owned by its handle and removed when the
//! handle is dropped, on success and error paths alike.
//!
//! Each adapter spools into its own subdirectory of the configured root and
//! holds an exclusive lock on an owner file inside it for as long as it
//! lives. Preparing a new adapter removes sibling directories whose owner
//! lock is free, which only happens once their process is gone.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use fs2::FileExt;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, trace, warn};

const SPOOL_PREFIX: &str = "dropdocs-";
const OWNER_LOCK: &str = "owner.lock";
const ROOT_LOCK: &str = ".dropdocs-spool.lock";

/// Process-private directory for spool files.
///
/// The directory and everything left in it is removed on drop.
#[derive(Debug)]
pub struct SpoolDir {
    // Declared first so the lock is released before the directory goes.
    _owner: File,
    dir: TempDir,
}

impl SpoolDir {
    /// Create a private spool directory under `root`.
    ///
    /// Directories abandoned by adapters that no longer run are removed.
    pub fn prepare(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        // Held while creating our directory and sweeping, so a sweep never
        // sees another adapter's directory before its owner lock is taken.
        let root_lock = open_lock_file(&root.join(ROOT_LOCK))?;
        root_lock.lock_exclusive()?;

        let dir = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .tempdir_in(root)?;
        let owner = open_lock_file(&dir.path().join(OWNER_LOCK))?;
        owner.try_lock_exclusive()?;

        let removed = remove_abandoned(root, dir.path());
        drop(root_lock);

        debug!(
            "spool directory {} ready ({} abandoned directories removed)",
            dir.path().display(),
            removed
        );
        Ok(Self { _owner: owner, dir })
    }

    /// Directory holding the spool files.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a fresh, empty spool file.
    pub fn create(&self) -> io::Result<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .tempfile_in(self.dir.path())?;
        trace!("created spool file {}", file.path().display());
        Ok(file)
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
}

/// Remove sibling spool directories whose owner is gone.
fn remove_abandoned(root: &Path, own: &Path) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not scan spool root {}: {}", root.display(), e);
            return 0;
        }
    };

    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if path == own
            || !entry.file_name().to_string_lossy().starts_with(SPOOL_PREFIX)
            || !entry.file_type().is_ok_and(|t| t.is_dir())
        {
            continue;
        }
        if owner_is_alive(&path) {
            trace!("spool directory {} is in use", path.display());
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("could not remove abandoned spool directory {:?}: {}", path, e),
        }
    }
    removed
}

/// Whether another adapter still holds the owner lock of `dir`.
fn owner_is_alive(dir: &Path) -> bool {
    // Directories are created and locked under the root lock, so a missing
    // owner file means its creator died in between.
    let Ok(owner) = File::open(dir.join(OWNER_LOCK)) else {
        return false;
    };
    owner.try_lock_exclusive().is_err()
}

/// Read-only descriptor over a fully downloaded document.
#[derive(Debug)]
pub struct ReadHandle {
    file: NamedTempFile,
    len: u64,
}

impl ReadHandle {
    /// Wrap a spool file holding `len` bytes, rewound to the start.
    pub(crate) fn new(mut file: NamedTempFile, len: u64) -> io::Result<Self> {
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        Ok(Self { file, len })
    }

    /// Content length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the backing spool file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Underlying file descriptor.
    pub fn as_file(&self) -> &File {
        self.file.as_file()
    }
}

impl Read for ReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ReadHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Descriptor over a downloaded thumbnail; its declared length is unknown.
#[derive(Debug)]
pub struct AssetHandle {
    file: NamedTempFile,
}

impl AssetHandle {
    pub(crate) fn new(mut file: NamedTempFile) -> io::Result<Self> {
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        Ok(Self { file })
    }

    /// Declared length; thumbnails never declare one.
    pub fn declared_length(&self) -> Option<u64> {
        None
    }

    /// Location of the backing spool file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Read for AssetHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}
