//! Dropbox v2 HTTP implementation of [`RemoteClient`].
//!
//! RPC endpoints (`api.dropboxapi.com`) take JSON bodies. Content endpoints
//! (`content.dropboxapi.com`) carry their JSON argument in the
//! `Dropbox-API-Arg` header and the file bytes in the body.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Response;
use reqwest::header::{CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use crate::client::{
    Account, FileEntry, FolderEntry, ListPage, RemoteClient, RemoteEntry, SpaceUsage,
    ThumbnailFormat, ThumbnailSize, WriteMode,
};
use crate::credential::Credential;
use crate::error::{RemoteError, classify_response};
use crate::oauth;

/// Default RPC endpoint host.
pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";
/// Default content endpoint host.
pub const DEFAULT_CONTENT_BASE: &str = "https://content.dropboxapi.com";
/// Default OAuth authorize page host.
pub const DEFAULT_AUTHORIZE_BASE: &str = "https://www.dropbox.com";

/// Largest body sent in a single upload call (the API caps it at 150 MiB).
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const LOCALE_HEADER: &str = "Dropbox-API-User-Locale";
const OCTET_STREAM: &str = "application/octet-stream";

/// Fixed per-process request configuration shared by every client handle.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Identifying `User-Agent` value
    pub user_agent: String,
    /// Locale sent with every request
    pub locale: String,
    /// RPC base URL
    pub api_base: String,
    /// Content base URL
    pub content_base: String,
    /// Authorize page base URL
    pub authorize_base: String,
    /// Per-request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
    /// Bytes per upload call before switching to an upload session
    pub upload_chunk_size: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("dropdocs/", env!("CARGO_PKG_VERSION")).to_string(),
            locale: "en_US".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            content_base: DEFAULT_CONTENT_BASE.to_string(),
            authorize_base: DEFAULT_AUTHORIZE_BASE.to_string(),
            timeout: None,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

impl RequestConfig {
    /// Build the shared HTTP transport for this configuration.
    pub fn build_transport(&self) -> Result<reqwest::Client, RemoteError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let locale = HeaderValue::from_str(&self.locale)
            .map_err(|e| RemoteError::Decode(format!("invalid locale header: {e}")))?;
        headers.insert(LOCALE_HEADER, locale);

        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SharingInfoDto {
    #[serde(default)]
    read_only: bool,
}

#[derive(Debug, Deserialize)]
struct FileDto {
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
    size: u64,
    server_modified: DateTime<Utc>,
    sharing_info: Option<SharingInfoDto>,
}

#[derive(Debug, Deserialize)]
struct FolderDto {
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
    sharing_info: Option<SharingInfoDto>,
}

#[derive(Debug, Deserialize)]
struct DeletedDto {
    name: String,
    path_display: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
enum MetadataDto {
    File(FileDto),
    Folder(FolderDto),
    Deleted(DeletedDto),
}

fn display_path(display: Option<String>, lower: Option<String>, name: &str) -> String {
    display.or(lower).unwrap_or_else(|| format!("/{name}"))
}

impl From<FileDto> for FileEntry {
    fn from(dto: FileDto) -> Self {
        FileEntry {
            path: display_path(dto.path_display, dto.path_lower, &dto.name),
            read_only: dto.sharing_info.is_some_and(|s| s.read_only),
            name: dto.name,
            size: dto.size,
            server_modified: dto.server_modified,
        }
    }
}

impl From<FolderDto> for FolderEntry {
    fn from(dto: FolderDto) -> Self {
        FolderEntry {
            path: display_path(dto.path_display, dto.path_lower, &dto.name),
            read_only: dto.sharing_info.is_some_and(|s| s.read_only),
            name: dto.name,
        }
    }
}

impl MetadataDto {
    /// Convert to a live entry; deleted tombstones have no live counterpart.
    fn into_entry(self) -> Option<RemoteEntry> {
        match self {
            MetadataDto::File(f) => Some(RemoteEntry::File(f.into())),
            MetadataDto::Folder(d) => Some(RemoteEntry::Folder(d.into())),
            MetadataDto::Deleted(d) => {
                trace!("skipping deleted entry {:?}", d.path_display.unwrap_or(d.name));
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderDto {
    entries: Vec<MetadataDto>,
    cursor: String,
    has_more: bool,
}

impl From<ListFolderDto> for ListPage {
    fn from(dto: ListFolderDto) -> Self {
        ListPage {
            entries: dto
                .entries
                .into_iter()
                .filter_map(MetadataDto::into_entry)
                .collect(),
            cursor: Some(dto.cursor),
            has_more: dto.has_more,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResultDto {
    metadata: MetadataDto,
}

#[derive(Debug, Deserialize)]
struct FolderResultDto {
    metadata: FolderDto,
}

#[derive(Debug, Deserialize)]
struct UploadSessionStartDto {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct NameDto {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct AccountDto {
    account_id: String,
    email: String,
    name: NameDto,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
enum AllocationDto {
    Individual { allocated: u64 },
    Team { allocated: u64 },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SpaceUsageDto {
    used: u64,
    allocation: AllocationDto,
}

impl From<SpaceUsageDto> for SpaceUsage {
    fn from(dto: SpaceUsageDto) -> Self {
        let allocated = match dto.allocation {
            AllocationDto::Individual { allocated } | AllocationDto::Team { allocated } => {
                allocated
            }
            AllocationDto::Other => 0,
        };
        SpaceUsage {
            used: dto.used,
            allocated,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommitInfo<'a> {
    path: &'a str,
    mode: &'static str,
    autorename: bool,
    mute: bool,
}

impl<'a> CommitInfo<'a> {
    fn new(path: &'a str, mode: WriteMode) -> Self {
        Self {
            path,
            mode: mode.as_str(),
            autorename: false,
            mute: false,
        }
    }
}

/// Encode an API argument for the `Dropbox-API-Arg` header.
///
/// HTTP headers must be ASCII, so every non-ASCII character is written as a
/// JSON `\uXXXX` escape (surrogate pairs above the BMP).
pub(crate) fn api_arg_header<T: Serialize + ?Sized>(arg: &T) -> Result<String, RemoteError> {
    let json = serde_json::to_string(arg)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Turn a non-success response into a classified error.
async fn check_status(response: Response, context: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    let err = classify_response(status.as_u16(), &body, retry_after, context);
    debug!("request for {} failed with {}: {}", context, status, err);
    Err(err)
}

/// Fill `buf` from `source` until it is full or the source is exhausted.
fn read_chunk(
    source: &mut (dyn Read + Send),
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<()> {
    buf.clear();
    let mut taken = (&mut *source).take(limit as u64);
    taken.read_to_end(buf)?;
    Ok(())
}

// ============================================================================
// Client
// ============================================================================

/// Short-lived client handle bound to one credential.
pub struct DropboxClient {
    http: reqwest::Client,
    config: Arc<RequestConfig>,
    credential: Credential,
    /// Current access token; replaced in place after a refresh.
    access_token: Mutex<String>,
}

impl DropboxClient {
    /// Create a handle over a shared transport.
    pub fn new(http: reqwest::Client, config: Arc<RequestConfig>, credential: Credential) -> Self {
        let access_token = Mutex::new(credential.access_token.clone());
        Self {
            http,
            config,
            credential,
            access_token,
        }
    }

    fn token(&self) -> String {
        self.access_token.lock().clone()
    }

    /// Refresh the access token if the credential allows it.
    ///
    /// Returns `false` when the credential carries no refresh token.
    async fn try_refresh(&self) -> Result<bool, RemoteError> {
        let (Some(refresh_token), Some(app_key)) =
            (&self.credential.refresh_token, &self.credential.app_key)
        else {
            return Ok(false);
        };
        debug!("access token expired, refreshing");
        let refreshed =
            oauth::refresh_access_token(&self.http, &self.config, refresh_token, app_key).await?;
        *self.access_token.lock() = refreshed.access_token;
        Ok(true)
    }

    async fn rpc_once<A, R>(
        &self,
        endpoint: &str,
        arg: Option<&A>,
        context: &str,
    ) -> Result<R, RemoteError>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/2/{endpoint}", self.config.api_base);
        trace!("POST {}", url);
        let mut request = self.http.post(&url).bearer_auth(self.token());
        if let Some(arg) = arg {
            request = request.json(arg);
        }
        let response = check_status(request.send().await?, context).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// JSON-in, JSON-out RPC call with a single refresh-and-retry on expiry.
    async fn rpc<A, R>(
        &self,
        endpoint: &str,
        arg: Option<&A>,
        context: &str,
    ) -> Result<R, RemoteError>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        match self.rpc_once(endpoint, arg, context).await {
            Err(RemoteError::AuthExpired) if self.try_refresh().await? => {
                self.rpc_once(endpoint, arg, context).await
            }
            other => other,
        }
    }

    async fn content_send(
        &self,
        endpoint: &str,
        arg_header: &str,
        body: Option<Bytes>,
        context: &str,
    ) -> Result<Response, RemoteError> {
        let url = format!("{}/2/{endpoint}", self.config.content_base);
        trace!("POST {} ({})", url, arg_header);
        let mut request = self
            .http
            .post(&url)
            .bearer_auth(self.token())
            .header(API_ARG_HEADER, arg_header);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, OCTET_STREAM).body(body);
        }
        check_status(request.send().await?, context).await
    }

    /// Content-endpoint call with a single refresh-and-retry on expiry.
    async fn content<A: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        arg: &A,
        body: Option<Bytes>,
        context: &str,
    ) -> Result<Response, RemoteError> {
        let header = api_arg_header(arg)?;
        match self.content_send(endpoint, &header, body.clone(), context).await {
            Err(RemoteError::AuthExpired) if self.try_refresh().await? => {
                self.content_send(endpoint, &header, body, context).await
            }
            other => other,
        }
    }

    async fn content_json<A: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        arg: &A,
        body: Bytes,
        context: &str,
    ) -> Result<R, RemoteError> {
        let response = self.content(endpoint, arg, Some(body), context).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn stream_into(
        mut response: Response,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError> {
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            sink.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        sink.flush()?;
        Ok(written)
    }
}

#[async_trait]
impl RemoteClient for DropboxClient {
    async fn get_metadata(&self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let arg = json!({ "path": path });
        let dto: MetadataDto = self.rpc("files/get_metadata", Some(&arg), path).await?;
        dto.into_entry()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn list_folder(&self, path: &str) -> Result<ListPage, RemoteError> {
        let arg = json!({ "path": path, "recursive": false, "include_deleted": false });
        let dto: ListFolderDto = self.rpc("files/list_folder", Some(&arg), path).await?;
        Ok(dto.into())
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage, RemoteError> {
        let arg = json!({ "cursor": cursor });
        let dto: ListFolderDto = self
            .rpc("files/list_folder/continue", Some(&arg), "<cursor>")
            .await?;
        Ok(dto.into())
    }

    async fn download(
        &self,
        path: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError> {
        let arg = json!({ "path": path });
        let response = self.content("files/download", &arg, None, path).await?;
        let written = Self::stream_into(response, sink).await?;
        debug!("downloaded {} bytes from {}", written, path);
        Ok(written)
    }

    async fn upload(
        &self,
        path: &str,
        mode: WriteMode,
        source: &mut (dyn Read + Send),
    ) -> Result<FileEntry, RemoteError> {
        let chunk_size = self.config.upload_chunk_size.max(1);
        let mut buf = Vec::with_capacity(chunk_size.min(DEFAULT_UPLOAD_CHUNK_SIZE));
        read_chunk(source, &mut buf, chunk_size)?;

        if buf.len() < chunk_size {
            let dto: FileDto = self
                .content_json("files/upload", &CommitInfo::new(path, mode), Bytes::from(buf), path)
                .await?;
            return Ok(dto.into());
        }

        // Source is larger than one call allows: use an upload session.
        let mut offset = buf.len() as u64;
        let start: UploadSessionStartDto = self
            .content_json(
                "files/upload_session/start",
                &json!({ "close": false }),
                Bytes::from(std::mem::take(&mut buf)),
                path,
            )
            .await?;
        trace!("upload session {} started for {}", start.session_id, path);

        loop {
            read_chunk(source, &mut buf, chunk_size)?;
            let cursor = json!({ "session_id": start.session_id, "offset": offset });

            if buf.len() < chunk_size {
                let arg = json!({ "cursor": cursor, "commit": CommitInfo::new(path, mode) });
                let dto: FileDto = self
                    .content_json(
                        "files/upload_session/finish",
                        &arg,
                        Bytes::from(std::mem::take(&mut buf)),
                        path,
                    )
                    .await?;
                debug!("upload session for {} finished at {} bytes", path, dto.size);
                return Ok(dto.into());
            }

            offset += buf.len() as u64;
            let arg = json!({ "cursor": cursor, "close": false });
            self.content(
                "files/upload_session/append_v2",
                &arg,
                Some(Bytes::from(std::mem::take(&mut buf))),
                path,
            )
            .await?;
        }
    }

    async fn create_folder(&self, path: &str) -> Result<FolderEntry, RemoteError> {
        let arg = json!({ "path": path, "autorename": false });
        let dto: FolderResultDto = self.rpc("files/create_folder_v2", Some(&arg), path).await?;
        Ok(dto.metadata.into())
    }

    async fn delete(&self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let arg = json!({ "path": path });
        let dto: MetadataResultDto = self.rpc("files/delete_v2", Some(&arg), path).await?;
        dto.metadata
            .into_entry()
            .ok_or_else(|| RemoteError::Decode("delete returned a tombstone".to_string()))
    }

    async fn get_thumbnail(
        &self,
        path: &str,
        format: ThumbnailFormat,
        size: ThumbnailSize,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, RemoteError> {
        let arg = json!({ "path": path, "format": format.as_str(), "size": size.as_str() });
        let response = self.content("files/get_thumbnail", &arg, None, path).await?;
        Self::stream_into(response, sink).await
    }

    async fn current_account(&self) -> Result<Account, RemoteError> {
        let dto: AccountDto = self
            .rpc::<(), _>("users/get_current_account", None, "<account>")
            .await?;
        Ok(Account {
            account_id: dto.account_id,
            email: dto.email,
            display_name: dto.name.display_name,
        })
    }

    async fn space_usage(&self) -> Result<SpaceUsage, RemoteError> {
        let dto: SpaceUsageDto = self
            .rpc::<(), _>("users/get_space_usage", None, "<account>")
            .await?;
        Ok(dto.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_arg_header_escapes_non_ascii() {
        let header = api_arg_header(&json!({ "path": "/Fotos/café ☕.jpg" })).unwrap();
        assert!(header.is_ascii());
        assert_eq!(header, r#"{"path":"/Fotos/caf\u00e9 \u2615.jpg"}"#);
    }

    #[test]
    fn test_api_arg_header_surrogate_pairs() {
        let header = api_arg_header(&json!({ "path": "/😀" })).unwrap();
        assert_eq!(header, r#"{"path":"/\ud83d\ude00"}"#);
    }

    #[test]
    fn test_parse_file_metadata() {
        let body = r#"{
            ".tag": "file",
            "name": "Prime_Numbers.txt",
            "id": "id:a4ayc_80_OEAAAAAAAAAXw",
            "client_modified": "2015-05-12T15:50:38Z",
            "server_modified": "2015-05-12T15:50:38Z",
            "rev": "a1c10ce0dd78",
            "size": 7212,
            "path_lower": "/homework/math/prime_numbers.txt",
            "path_display": "/Homework/math/Prime_Numbers.txt",
            "sharing_info": {"read_only": true, "parent_shared_folder_id": "84528192421"}
        }"#;
        let dto: MetadataDto = serde_json::from_str(body).unwrap();
        match dto.into_entry().unwrap() {
            RemoteEntry::File(f) => {
                assert_eq!(f.path, "/Homework/math/Prime_Numbers.txt");
                assert_eq!(f.name, "Prime_Numbers.txt");
                assert_eq!(f.size, 7212);
                assert!(f.read_only);
                assert_eq!(f.server_modified.timestamp(), 1_431_445_838);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_listing_skips_deleted() {
        let body = r#"{
            "entries": [
                {".tag": "folder", "name": "math", "path_display": "/Homework/math", "id": "id:1"},
                {".tag": "deleted", "name": "old.txt", "path_display": "/Homework/old.txt"},
                {".tag": "file", "name": "a.txt", "path_lower": "/homework/a.txt", "id": "id:2",
                 "server_modified": "2020-01-01T00:00:00Z", "size": 1}
            ],
            "cursor": "ZtkX9_EHj3x7PMkVuFIhwKYXEpwpLwyxp9vMKomUhllil9q7eWiAu",
            "has_more": true
        }"#;
        let dto: ListFolderDto = serde_json::from_str(body).unwrap();
        let page = ListPage::from(dto);
        assert_eq!(page.entries.len(), 2);
        assert!(page.has_more);
        assert!(page.entries[0].is_folder());
        assert!(!page.entries[0].read_only());
        assert_eq!(page.entries[1].path(), "/homework/a.txt");
    }

    #[test]
    fn test_parse_space_usage() {
        let individual: SpaceUsageDto = serde_json::from_str(
            r#"{"used": 314159, "allocation": {".tag": "individual", "allocated": 10000000}}"#,
        )
        .unwrap();
        assert_eq!(SpaceUsage::from(individual).available(), 10_000_000 - 314_159);

        let team: SpaceUsageDto = serde_json::from_str(
            r#"{"used": 5, "allocation": {".tag": "team", "used": 100, "allocated": 50,
                "user_within_team_space_allocated": 0}}"#,
        )
        .unwrap();
        assert_eq!(SpaceUsage::from(team).allocated, 50);
    }

    #[test]
    fn test_read_chunk_limits() {
        let data = vec![7u8; 10];
        let mut source: &[u8] = &data;
        let mut buf = Vec::new();
        read_chunk(&mut source, &mut buf, 4).unwrap();
        assert_eq!(buf.len(), 4);
        read_chunk(&mut source, &mut buf, 4).unwrap();
        assert_eq!(buf.len(), 4);
        read_chunk(&mut source, &mut buf, 4).unwrap();
        assert_eq!(buf.len(), 2);
        read_chunk(&mut source, &mut buf, 4).unwrap();
        assert!(buf.is_empty());
    }
}
