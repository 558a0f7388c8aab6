//! Drive v3 REST backend.
//!
//! Every request asks the [`TokenSource`] for an access token first, so an
//! expired token is refreshed between parts of a long download.

use crate::auth::TokenSource;
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ByteRange, EntryPage, RemoteEntry, RemoteEntryKind};
use serde::{Deserialize, Serialize};

/// Default Drive v3 API base.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id, name, mimeType, trashed, size";

/// Slack on top of the requested range length when reading a part body.
const BODY_LIMIT_SLACK: u64 = 64 * 1024;

/// Drive v3 REST backend.
pub struct RestBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Drive API base URL.
    api_base: String,
    /// Access token provider.
    tokens: TokenSource,
}

impl RestBackend {
    /// Create a backend against the public Drive API.
    #[must_use]
    pub fn new(tokens: TokenSource) -> Self {
        Self::with_api_base(tokens, DEFAULT_API_BASE)
    }

    /// Create a backend with a custom API base (for testing).
    #[must_use]
    pub fn with_api_base(tokens: TokenSource, api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
            tokens,
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL of the file collection.
    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    /// URL of a single file resource.
    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(file_id))
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.tokens.access_token()?))
    }
}

/// Listing query for the direct children of a folder.
fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents", folder_id.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl Backend for RestBackend {
    fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<EntryPage> {
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut request = self
            .agent
            .get(&self.files_url())
            .header("Authorization", &self.bearer()?)
            .query("q", &children_query(folder_id))
            .query("fields", &fields);
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let response: FileList = request.call()?.body_mut().read_json()?;

        let entries = response
            .files
            .into_iter()
            .map(RemoteEntry::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntryPage {
            entries,
            next_page_token: response.next_page_token,
        })
    }

    fn metadata(&self, file_id: &str) -> Result<RemoteEntry> {
        let response: DriveFile = self
            .agent
            .get(&self.file_url(file_id))
            .header("Authorization", &self.bearer()?)
            .query("fields", FILE_FIELDS)
            .call()?
            .body_mut()
            .read_json()?;

        response.try_into()
    }

    fn fetch_range(&self, file_id: &str, range: &ByteRange) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(&self.file_url(file_id))
            .header("Authorization", &self.bearer()?)
            .header("Range", &range.header_value())
            .query("alt", "media")
            .call()?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(range.len() + BODY_LIMIT_SLACK)
            .read_to_vec()?;

        Ok(bytes)
    }

    fn set_trashed(&self, file_id: &str, trashed: bool) -> Result<String> {
        let response: DriveFile = self
            .agent
            .patch(&self.file_url(file_id))
            .header("Authorization", &self.bearer()?)
            .query("fields", "id")
            .send_json(&TrashUpdate { trashed })?
            .body_mut()
            .read_json()?;

        Ok(response.id)
    }
}

// =============================================================================
// Drive API wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    trashed: bool,
    /// Drive encodes int64 values as JSON strings.
    size: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrashUpdate {
    trashed: bool,
}

impl TryFrom<DriveFile> for RemoteEntry {
    type Error = Error;

    fn try_from(file: DriveFile) -> Result<Self> {
        let size = file
            .size
            .as_deref()
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    Error::InvalidResponse(format!("size {:?} for {} is not a number", s, file.id))
                })
            })
            .transpose()?;

        let kind = RemoteEntryKind::classify(&file.mime_type, size).ok_or_else(|| {
            Error::InvalidResponse(format!(
                "{} ({}) has no size",
                file.id, file.mime_type
            ))
        })?;

        Ok(Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            trashed: file.trashed,
            kind,
        })
    }
}
