pub mod cat;
pub mod login;
pub mod logout;
pub mod ls;
pub mod mkdir;
pub mod put;
pub mod recent;
pub mod rm;
pub mod roots;
pub mod search;
pub mod stat;
pub mod status;
pub mod thumb;
pub mod touch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use dropdocs_provider::item::FLAG_SUPPORTS_WRITE;
use dropdocs_provider::{
    Column, DocumentColumn, DocumentCursor, DocumentProvider, FileCredentialStore, MIME_TYPE_DIR,
    Session,
};
use dropdocs_remote::DropboxGateway;
use serde::Serialize;

use crate::config::{self, Config};
use crate::output::{create_table, format_entry_type, format_millis, format_optional_size};

/// Adapter wired to the real service and the on-disk credential file.
pub type Provider = DocumentProvider<DropboxGateway, FileCredentialStore>;

/// Normalize a document path to ensure it starts with `/` and has no trailing `/`.
/// This makes paths like `notes/a.txt` work the same as `/notes/a.txt`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Split a normalized path into parent document id and display name.
pub fn split_parent(path: &str) -> Result<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((_, "")) | None => anyhow::bail!("Path has no file name: {path}"),
        Some(("", name)) => Ok(("/", name)),
        Some((parent, name)) => Ok((parent, name)),
    }
}

/// Everything a command needs: configuration and the credential store.
pub struct Context {
    pub config: Config,
    pub config_dir: PathBuf,
    pub store: Arc<FileCredentialStore>,
}

impl Context {
    /// Load configuration and open the credential file.
    pub fn load() -> Result<Self> {
        let config_dir = config::config_dir()?;
        let config = Config::load_from(&config_dir)?;
        let credential_path = config::credential_path()?;
        let store = FileCredentialStore::open(&credential_path).with_context(|| {
            format!("Failed to open credential file: {}", credential_path.display())
        })?;
        Ok(Self {
            config,
            config_dir,
            store: Arc::new(store),
        })
    }

    /// Gateway built from the configured endpoints.
    pub fn gateway(&self) -> Result<DropboxGateway> {
        DropboxGateway::new(self.config.provider.request_config())
            .context("Failed to set up HTTP transport")
    }

    /// Adapter over the stored credential.
    pub fn provider(&self) -> Result<Provider> {
        let provider = DocumentProvider::new(
            self.gateway()?,
            Arc::clone(&self.store),
            self.config.provider.clone(),
        )?;
        Ok(provider)
    }

    /// Login session whose roots-changed signal is logged.
    pub fn session(&self) -> Session<FileCredentialStore, fn()> {
        Session::new(Arc::clone(&self.store), log_roots_changed)
    }
}

fn log_roots_changed() {
    tracing::debug!("roots changed");
}

// ============================================================================
// Document listings
// ============================================================================

/// Columns requested by listing commands.
pub const LISTING_COLUMNS: &[DocumentColumn] = DocumentColumn::ALL;

/// JSON output format for one document row
#[derive(Debug, Serialize)]
pub struct DocumentRow {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    pub flags: i64,
}

impl DocumentRow {
    pub fn is_dir(&self) -> bool {
        self.mime_type == MIME_TYPE_DIR
    }

    pub fn is_writable(&self) -> bool {
        self.flags & FLAG_SUPPORTS_WRITE != 0
    }
}

/// Collect cursor rows into owned structs.
pub fn document_rows(cursor: &DocumentCursor) -> Vec<DocumentRow> {
    (0..cursor.len())
        .map(|row| DocumentRow {
            id: cursor
                .text(row, DocumentColumn::DocumentId)
                .unwrap_or_default()
                .to_string(),
            name: cursor
                .text(row, DocumentColumn::DisplayName)
                .unwrap_or_default()
                .to_string(),
            mime_type: cursor
                .text(row, DocumentColumn::MimeType)
                .unwrap_or_default()
                .to_string(),
            size: cursor.int(row, DocumentColumn::Size),
            last_modified: cursor.int(row, DocumentColumn::LastModified),
            flags: cursor.int(row, DocumentColumn::Flags).unwrap_or(0),
        })
        .collect()
}

/// Print document rows as JSON, a table, or one path per line.
pub fn print_documents(rows: &[DocumentRow], json: bool, long: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if long {
        let mut table = create_table();
        table.set_header(vec!["Type", "Size", "Modified", "Mode", "Path"]);
        for row in rows {
            table.add_row(vec![
                format_entry_type(row.is_dir()).to_string(),
                format_optional_size(row.size),
                format_millis(row.last_modified),
                if row.is_writable() { "rw" } else { "r-" }.to_string(),
                row.id.clone(),
            ]);
        }
        println!("{table}");
    } else {
        for row in rows {
            if row.is_dir() {
                println!("{}/", row.id);
            } else {
                println!("{}", row.id);
            }
        }
    }
    Ok(())
}
