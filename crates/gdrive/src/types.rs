use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by Drive-native document types (Docs, Sheets, folders...).
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps.";

/// What kind of object a remote entry is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteEntryKind {
    /// A binary file with its declared size in bytes.
    File(u64),
    /// A folder. Never downloaded, never trashed.
    Folder,
    /// A Drive-native document (Docs, Sheets, ...) with no binary content.
    Native(String),
}

impl RemoteEntryKind {
    /// Classify a MIME type, using `size` for binary files.
    ///
    /// Returns `None` for a binary file without a declared size.
    pub fn classify(mime_type: &str, size: Option<u64>) -> Option<Self> {
        if mime_type == FOLDER_MIME_TYPE {
            Some(Self::Folder)
        } else if mime_type.starts_with(NATIVE_MIME_PREFIX) {
            Some(Self::Native(mime_type.to_string()))
        } else {
            size.map(Self::File)
        }
    }

    /// Returns true for entries with downloadable content.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Declared size for binary files.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::File(size) => Some(*size),
            _ => None,
        }
    }
}

/// A single object in a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Drive file id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Raw MIME type as reported by Drive.
    pub mime_type: String,
    /// Soft-delete marker.
    pub trashed: bool,
    /// Tagged kind derived from the MIME type.
    pub kind: RemoteEntryKind,
}

impl RemoteEntry {
    /// Create a binary file entry.
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: "application/octet-stream".to_string(),
            trashed: false,
            kind: RemoteEntryKind::File(size),
        }
    }

    /// Create a folder entry.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            trashed: false,
            kind: RemoteEntryKind::Folder,
        }
    }

    /// Mark as trashed
    pub fn trashed(mut self) -> Self {
        self.trashed = true;
        self
    }

    /// Returns true if this entry is a folder
    pub fn is_folder(&self) -> bool {
        self.kind == RemoteEntryKind::Folder
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    /// Entries on this page, in listing order.
    pub entries: Vec<RemoteEntry>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// An inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    /// Create a range. `start` must not exceed `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "byte range start {start} > end {end}");
        Self { start, end }
    }

    /// Number of bytes covered.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// Result of asking the remote to trash an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashReceipt {
    /// The remote echoed back the requested id.
    Confirmed,
    /// The remote answered with a different id.
    Mismatch {
        /// Id the remote returned.
        echoed: String,
    },
}

impl TrashReceipt {
    /// Returns true if the remote confirmed the trash request.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_folder() {
        assert_eq!(
            RemoteEntryKind::classify(FOLDER_MIME_TYPE, None),
            Some(RemoteEntryKind::Folder)
        );
    }

    #[test]
    fn test_classify_native_document() {
        let kind = RemoteEntryKind::classify("application/vnd.google-apps.document", None);
        assert!(matches!(kind, Some(RemoteEntryKind::Native(_))));
    }

    #[test]
    fn test_classify_binary() {
        assert_eq!(
            RemoteEntryKind::classify("video/mp4", Some(42)),
            Some(RemoteEntryKind::File(42))
        );
        assert_eq!(RemoteEntryKind::classify("video/mp4", None), None);
    }

    #[test]
    fn test_byte_range() {
        let range = ByteRange::new(100, 199);
        assert_eq!(range.len(), 100);
        assert_eq!(range.header_value(), "bytes=100-199");
        assert_eq!(range.to_string(), "[100,199]");
    }

    #[test]
    fn test_single_byte_range() {
        assert_eq!(ByteRange::new(7, 7).len(), 1);
    }

    #[test]
    fn test_entry_constructors() {
        let file = RemoteEntry::file("a", "a.bin", 10);
        assert!(file.kind.is_file());
        assert_eq!(file.kind.size(), Some(10));
        assert!(!file.is_folder());

        let folder = RemoteEntry::folder("b", "dir").trashed();
        assert!(folder.is_folder());
        assert!(folder.trashed);
        assert_eq!(folder.kind.size(), None);
    }
}
