//! Dropbox API client for dropdocs.
//!
//! This crate owns everything that talks to the network: the
//! [`RemoteClient`] contract, its Dropbox v2 implementation, the
//! [`Gateway`] that builds clients from stored credentials, and the OAuth2
//! PKCE flow used to obtain those credentials.

pub mod client;
pub mod credential;
pub mod dropbox;
pub mod error;
pub mod gateway;
pub mod oauth;

pub use client::{
    Account, FileEntry, FolderEntry, ListPage, RemoteClient, RemoteEntry, SpaceUsage,
    ThumbnailFormat, ThumbnailSize, WriteMode,
};
pub use credential::Credential;
pub use dropbox::{DropboxClient, RequestConfig};
pub use error::RemoteError;
pub use gateway::{DropboxGateway, Gateway};
pub use oauth::PkceFlow;
