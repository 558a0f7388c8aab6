//! # gdrive
//!
//! Blocking Google Drive v3 client with just the calls a folder-draining
//! backup tool needs:
//! - List the children of a folder (all pages)
//! - Read an object's metadata
//! - Download an inclusive byte range of an object
//! - Move an object to the trash
//!
//! Credentials follow Google's installed-app OAuth flow and are persisted
//! in a token file compatible with Google's own client libraries.
//!
//! ## Example
//!
//! ```no_run
//! use gdrive::auth::{ClientSecrets, FileCredentialStore, OAuthAuthorizer, TokenSource, DRIVE_SCOPE};
//! use gdrive::{ByteRange, Client};
//!
//! let secrets = ClientSecrets::load("auth.json").unwrap();
//! let tokens = TokenSource::new(
//!     Box::new(FileCredentialStore::new("token.json")),
//!     Box::new(OAuthAuthorizer::new(secrets, vec![DRIVE_SCOPE.to_string()])),
//! );
//! let client = Client::new(tokens);
//!
//! for entry in client.list_folder("folder-id", false).unwrap() {
//!     println!("{} {:?}", entry.name, entry.kind);
//! }
//!
//! let head = client.fetch_range("file-id", &ByteRange::new(0, 1023)).unwrap();
//! println!("{} bytes", head.len());
//! ```
//!
//! ## Testing
//!
//! [`MockBackend`] implements [`backend::Backend`] in memory:
//!
//! ```
//! use gdrive::{Client, MockBackend, RemoteEntry};
//!
//! let mock = MockBackend::new();
//! mock.add_file("root", RemoteEntry::file("f1", "a.bin", 3), b"abc".to_vec());
//!
//! let client = Client::with_backend(Box::new(mock.clone()));
//! assert_eq!(client.list_folder("root", false).unwrap().len(), 1);
//! assert!(client.trash("f1").unwrap().is_confirmed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod types;

pub use backend::MockBackend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ByteRange, EntryPage, FOLDER_MIME_TYPE, RemoteEntry, RemoteEntryKind, TrashReceipt,
};

use auth::TokenSource;
use backend::Backend;
use backend::rest::RestBackend;

/// High-level client for Drive operations.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client against the Drive REST API.
    #[must_use]
    pub fn new(tokens: TokenSource) -> Self {
        Self {
            backend: Box::new(RestBackend::new(tokens)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List every child of a folder, following page tokens.
    ///
    /// Trashed entries are dropped unless `include_trashed` is set.
    pub fn list_folder(&self, folder_id: &str, include_trashed: bool) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.backend.list_page(folder_id, page_token.as_deref())?;

            for entry in page.entries {
                if entry.trashed && !include_trashed {
                    continue;
                }
                log::debug!("Found file: {}, {}", entry.name, entry.id);
                entries.push(entry);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::info!("Listed {} entries in folder {}", entries.len(), folder_id);
        Ok(entries)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Fetch metadata for one object.
    pub fn metadata(&self, file_id: &str) -> Result<RemoteEntry> {
        self.backend.metadata(file_id)
    }

    /// Fetch an inclusive byte range of an object's content.
    pub fn fetch_range(&self, file_id: &str, range: &ByteRange) -> Result<Vec<u8>> {
        self.backend.fetch_range(file_id, range)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Move an object to the trash and check the echoed id.
    pub fn trash(&self, file_id: &str) -> Result<TrashReceipt> {
        let echoed = self.backend.set_trashed(file_id, true)?;
        if echoed == file_id {
            Ok(TrashReceipt::Confirmed)
        } else {
            Ok(TrashReceipt::Mismatch { echoed })
        }
    }
}
