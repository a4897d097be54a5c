//! Credential persistence.
//!
//! The adapter only needs a presence check and the raw serialized
//! credential; how and where it is kept is up to the [`CredentialStore`]
//! implementation. Writing the empty string clears the credential.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Preference key the credential is stored under.
pub const CREDENTIAL_KEY: &str = "dropbox_credential";

/// Storage for the single serialized credential.
pub trait CredentialStore: Send + Sync + 'static {
    /// The stored credential, if any.
    fn credential(&self) -> Option<String>;

    /// Whether a credential is stored.
    fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// Store `credential`; the empty string removes it.
    fn set_credential(&self, credential: &str) -> io::Result<()>;
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    value: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `credential`.
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential(&self) -> Option<String> {
        self.value.read().clone()
    }

    fn set_credential(&self, credential: &str) -> io::Result<()> {
        *self.value.write() = (!credential.is_empty()).then(|| credential.to_string());
        Ok(())
    }
}

/// Preferences file holding string values by key.
type Preferences = BTreeMap<String, String>;

/// JSON preferences file on disk.
///
/// The file is a flat JSON object; only [`CREDENTIAL_KEY`] is managed here
/// and other keys are preserved. Writes go through a temporary file in the
/// same directory and are renamed into place.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    prefs: RwLock<Preferences>,
}

impl FileCredentialStore {
    /// Open (or lazily create) the preferences file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Preferences::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Preferences::new(),
            Err(e) => return Err(e),
        };
        debug!("opened credential store at {}", path.display());
        Ok(Self {
            path,
            prefs: RwLock::new(prefs),
        })
    }

    /// Location of the preferences file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, prefs: &Preferences) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, prefs)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn credential(&self) -> Option<String> {
        self.prefs
            .read()
            .get(CREDENTIAL_KEY)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set_credential(&self, credential: &str) -> io::Result<()> {
        let mut prefs = self.prefs.write();
        let mut updated = prefs.clone();
        if credential.is_empty() {
            updated.remove(CREDENTIAL_KEY);
        } else {
            updated.insert(CREDENTIAL_KEY.to_string(), credential.to_string());
        }
        if let Err(e) = self.persist(&updated) {
            warn!("failed to write credential store {}: {}", self.path.display(), e);
            return Err(e);
        }
        *prefs = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_set_and_clear() {
        let store = MemoryCredentialStore::new();
        assert!(!store.has_credential());
        store.set_credential("token").unwrap();
        assert_eq!(store.credential().as_deref(), Some("token"));
        store.set_credential("").unwrap();
        assert!(!store.has_credential());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(!store.has_credential());
        store.set_credential(r#"{"access_token":"t"}"#).unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(
            reopened.credential().as_deref(),
            Some(r#"{"access_token":"t"}"#)
        );
    }

    #[test]
    fn test_file_store_clear_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"theme": "dark", "dropbox_credential": "abc"}"#).unwrap();

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(store.has_credential());
        store.set_credential("").unwrap();
        assert!(!store.has_credential());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("theme"));
        assert!(!content.contains(CREDENTIAL_KEY));
    }

    #[test]
    fn test_file_store_treats_empty_value_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"dropbox_credential": ""}"#).unwrap();
        assert!(!FileCredentialStore::open(&path).unwrap().has_credential());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();
        let err = FileCredentialStore::open(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        FileCredentialStore::open(&path)
            .unwrap()
            .set_credential("t")
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
