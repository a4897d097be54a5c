//! Document identifiers, MIME types and capability flags.
//!
//! A document id is the display path of the remote entry. The root folder's
//! id is `"/"`, which the remote API spells as the empty string.

use dropdocs_remote::RemoteEntry;

use crate::error::ProviderError;

/// Identifier of the single root.
pub const ROOT_ID: &str = "root";

/// Document id of the root folder.
pub const ROOT_DOCUMENT_ID: &str = "/";

/// Display name reported for the root folder.
pub const ROOT_DISPLAY_NAME: &str = "root";

/// MIME type the host uses for folders.
pub const MIME_TYPE_DIR: &str = "vnd.android.document/directory";

/// Fallback MIME type for unknown extensions.
pub const MIME_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// MIME filter advertised by the root.
pub const ROOT_MIME_TYPES: &str = "*/*";

/// Document supports a thumbnail rendition.
pub const FLAG_SUPPORTS_THUMBNAIL: i64 = 1;
/// Document content can be overwritten.
pub const FLAG_SUPPORTS_WRITE: i64 = 1 << 1;
/// Document can be deleted.
pub const FLAG_SUPPORTS_DELETE: i64 = 1 << 2;
/// Folder accepts new children.
pub const FLAG_DIR_SUPPORTS_CREATE: i64 = 1 << 3;

/// Root has at least one folder that accepts new documents.
pub const ROOT_FLAG_SUPPORTS_CREATE: i64 = 1;
/// Root can list recent documents.
pub const ROOT_FLAG_SUPPORTS_RECENTS: i64 = 1 << 2;
/// Root can be searched.
pub const ROOT_FLAG_SUPPORTS_SEARCH: i64 = 1 << 3;

/// Flags reported for the root row.
pub const ROOT_FLAGS: i64 =
    ROOT_FLAG_SUPPORTS_CREATE | ROOT_FLAG_SUPPORTS_RECENTS | ROOT_FLAG_SUPPORTS_SEARCH;

/// Remote path for a document id (`"/"` becomes `""`).
pub fn remote_path(document_id: &str) -> &str {
    if document_id == ROOT_DOCUMENT_ID {
        ""
    } else {
        document_id
    }
}

/// Compose the id of a new child document.
pub fn child_document_id(parent_id: &str, display_name: &str) -> Result<String, ProviderError> {
    if display_name.is_empty() || display_name.contains('/') {
        return Err(ProviderError::InvalidArgument(format!(
            "invalid display name: {display_name:?}"
        )));
    }
    if parent_id == ROOT_DOCUMENT_ID {
        Ok(format!("/{display_name}"))
    } else {
        Ok(format!("{}/{display_name}", parent_id.trim_end_matches('/')))
    }
}

/// Guess the MIME type of a file from its name.
pub fn mime_type_for_name(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) => mime_guess::from_ext(&name[dot + 1..])
            .first_raw()
            .unwrap_or(MIME_TYPE_OCTET_STREAM)
            .to_string(),
        None => MIME_TYPE_OCTET_STREAM.to_string(),
    }
}

/// MIME type reported for an entry.
pub fn mime_type(entry: &RemoteEntry) -> String {
    match entry {
        RemoteEntry::Folder(_) => MIME_TYPE_DIR.to_string(),
        RemoteEntry::File(f) => mime_type_for_name(&f.name),
    }
}

/// Capability flags for an entry with the given MIME type.
pub fn document_flags(entry: &RemoteEntry, mime_type: &str) -> i64 {
    let mut flags = 0;
    match entry {
        RemoteEntry::Folder(d) if !d.read_only => flags |= FLAG_DIR_SUPPORTS_CREATE,
        RemoteEntry::File(f) if !f.read_only => {
            flags |= FLAG_SUPPORTS_WRITE | FLAG_SUPPORTS_DELETE;
        }
        _ => {}
    }
    if mime_type.starts_with("image/") {
        flags |= FLAG_SUPPORTS_THUMBNAIL;
    }
    flags
}
