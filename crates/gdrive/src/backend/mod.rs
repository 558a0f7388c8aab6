//! Backend trait and implementations for talking to Drive.
//!
//! [`rest::RestBackend`] calls the Drive v3 REST API. [`MockBackend`] keeps
//! everything in memory and records the calls made against it:
//!
//! ```
//! use gdrive::backend::{Backend, MockBackend};
//! use gdrive::{ByteRange, RemoteEntry};
//!
//! let mock = MockBackend::new();
//! mock.add_file("folder", RemoteEntry::file("f1", "a.bin", 4), b"abcd".to_vec());
//!
//! let page = mock.list_page("folder", None).unwrap();
//! assert_eq!(page.entries.len(), 1);
//! assert_eq!(mock.fetch_range("f1", &ByteRange::new(1, 2)).unwrap(), b"bc");
//! ```

pub mod rest;

use crate::error::{Error, Result};
use crate::types::{ByteRange, EntryPage, RemoteEntry};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Remote operations the sync engine depends on.
pub trait Backend: Send + Sync {
    /// Fetch one page of the children of `folder_id`, including trashed ones.
    fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<EntryPage>;

    /// Fetch metadata (name, MIME type, size) for one object.
    fn metadata(&self, file_id: &str) -> Result<RemoteEntry>;

    /// Fetch the raw bytes of an inclusive byte range.
    fn fetch_range(&self, file_id: &str, range: &ByteRange) -> Result<Vec<u8>>;

    /// Set the trashed flag. Returns the id echoed back by the remote.
    fn set_trashed(&self, file_id: &str, trashed: bool) -> Result<String>;
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `list_page(folder, token)`
    ListPage(String, Option<String>),
    /// `metadata(id)`
    Metadata(String),
    /// `fetch_range(id, range)`
    FetchRange(String, ByteRange),
    /// `set_trashed(id, trashed)`
    SetTrashed(String, bool),
}

#[derive(Debug, Default)]
struct MockState {
    children: HashMap<String, Vec<String>>,
    entries: HashMap<String, RemoteEntry>,
    contents: HashMap<String, Vec<u8>>,
    page_size: Option<usize>,
    failing_metadata: HashSet<String>,
    failing_ranges: HashSet<(String, u64)>,
    failing_trash: HashSet<String>,
    trash_echo: HashMap<String, String>,
    calls: Vec<MockCall>,
}

/// In-memory backend for tests.
///
/// Cloning shares state, so a test can keep a handle while the engine owns
/// another one.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Add an entry under a folder with the given content.
    pub fn add_file(&self, folder_id: &str, entry: RemoteEntry, content: Vec<u8>) {
        let mut state = self.state();
        state
            .children
            .entry(folder_id.to_string())
            .or_default()
            .push(entry.id.clone());
        state.contents.insert(entry.id.clone(), content);
        state.entries.insert(entry.id.clone(), entry);
    }

    /// Add a content-less entry (folder or native document) under a folder.
    pub fn add_entry(&self, folder_id: &str, entry: RemoteEntry) {
        self.add_file(folder_id, entry, Vec::new());
    }

    /// Split listings into pages of `size` entries.
    pub fn set_page_size(&self, size: usize) {
        self.state().page_size = Some(size.max(1));
    }

    /// Make `metadata(id)` fail.
    pub fn fail_metadata(&self, file_id: &str) {
        self.state().failing_metadata.insert(file_id.to_string());
    }

    /// Make `fetch_range` fail for the range starting at `start`.
    pub fn fail_range(&self, file_id: &str, start: u64) {
        self.state()
            .failing_ranges
            .insert((file_id.to_string(), start));
    }

    /// Make `set_trashed(id, _)` fail.
    pub fn fail_trash(&self, file_id: &str) {
        self.state().failing_trash.insert(file_id.to_string());
    }

    /// Make `set_trashed(id, _)` echo a different id.
    pub fn echo_on_trash(&self, file_id: &str, echoed: &str) {
        self.state()
            .trash_echo
            .insert(file_id.to_string(), echoed.to_string());
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Ids that were successfully marked trashed.
    pub fn trashed_ids(&self) -> Vec<String> {
        let state = self.state();
        let mut ids: Vec<_> = state
            .entries
            .values()
            .filter(|e| e.trashed)
            .map(|e| e.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids that `metadata` or `fetch_range` was called for, in first-touch order.
    pub fn touched_ids(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for call in self.state().calls.iter() {
            let id = match call {
                MockCall::Metadata(id) | MockCall::FetchRange(id, _) => id,
                _ => continue,
            };
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }
}

fn not_found(file_id: &str) -> Error {
    Error::http(format!("File not found: {}", file_id), Some(404))
}

impl Backend for MockBackend {
    fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<EntryPage> {
        let mut state = self.state();
        state.calls.push(MockCall::ListPage(
            folder_id.to_string(),
            page_token.map(str::to_string),
        ));

        let ids = state.children.get(folder_id).cloned().unwrap_or_default();
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::http(format!("bad page token: {}", token), Some(400)))?,
            None => 0,
        };
        let size = state.page_size.unwrap_or(ids.len().max(1));
        let end = (offset + size).min(ids.len());

        let entries = ids[offset.min(end)..end]
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect();
        let next_page_token = (end < ids.len()).then(|| end.to_string());

        Ok(EntryPage {
            entries,
            next_page_token,
        })
    }

    fn metadata(&self, file_id: &str) -> Result<RemoteEntry> {
        let mut state = self.state();
        state.calls.push(MockCall::Metadata(file_id.to_string()));

        if state.failing_metadata.contains(file_id) {
            return Err(Error::http("backend error", Some(500)));
        }
        state
            .entries
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found(file_id))
    }

    fn fetch_range(&self, file_id: &str, range: &ByteRange) -> Result<Vec<u8>> {
        let mut state = self.state();
        state
            .calls
            .push(MockCall::FetchRange(file_id.to_string(), *range));

        if state
            .failing_ranges
            .contains(&(file_id.to_string(), range.start))
        {
            return Err(Error::http("connection reset", None));
        }

        let content = state.contents.get(file_id).ok_or_else(|| not_found(file_id))?;
        let len = content.len() as u64;
        if range.start >= len {
            return Err(Error::http("range not satisfiable", Some(416)));
        }
        let end = range.end.min(len - 1);
        Ok(content[range.start as usize..=end as usize].to_vec())
    }

    fn set_trashed(&self, file_id: &str, trashed: bool) -> Result<String> {
        let mut state = self.state();
        state
            .calls
            .push(MockCall::SetTrashed(file_id.to_string(), trashed));

        if state.failing_trash.contains(file_id) {
            return Err(Error::http("backend error", Some(500)));
        }

        let echoed = state
            .trash_echo
            .get(file_id)
            .cloned()
            .unwrap_or_else(|| file_id.to_string());

        let entry = state
            .entries
            .get_mut(file_id)
            .ok_or_else(|| not_found(file_id))?;
        entry.trashed = trashed;

        Ok(echoed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MockBackend {
        let mock = MockBackend::new();
        mock.add_file("root", RemoteEntry::file("a", "a.bin", 3), b"abc".to_vec());
        mock.add_entry("root", RemoteEntry::folder("d", "dir"));
        mock.add_file("root", RemoteEntry::file("b", "b.bin", 2), b"xy".to_vec());
        mock
    }

    #[test]
    fn test_mock_backend_new() {
        let mock = MockBackend::new();
        let page = mock.list_page("root", None).unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_mock_single_page() {
        let page = sample().list_page("root", None).unwrap();
        let ids: Vec<_> = page.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "b"]);
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_mock_pagination() {
        let mock = sample();
        mock.set_page_size(2);

        let first = mock.list_page("root", None).unwrap();
        assert_eq!(first.entries.len(), 2);
        let token = first.next_page_token.unwrap();

        let second = mock.list_page("root", Some(&token)).unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].id, "b");
        assert!(second.next_page_token.is_none());
    }

    #[test]
    fn test_mock_fetch_range() {
        let mock = sample();
        assert_eq!(mock.fetch_range("a", &ByteRange::new(0, 1)).unwrap(), b"ab");
        assert_eq!(mock.fetch_range("a", &ByteRange::new(2, 9)).unwrap(), b"c");
        assert!(mock.fetch_range("a", &ByteRange::new(3, 4)).is_err());
        assert!(mock.fetch_range("missing", &ByteRange::new(0, 0)).is_err());
    }

    #[test]
    fn test_mock_failures() {
        let mock = sample();
        mock.fail_metadata("a");
        mock.fail_range("b", 0);
        mock.fail_trash("b");

        assert!(mock.metadata("a").is_err());
        assert!(mock.fetch_range("b", &ByteRange::new(0, 1)).is_err());
        assert!(mock.set_trashed("b", true).is_err());
        assert!(mock.trashed_ids().is_empty());
    }

    #[test]
    fn test_mock_trash_echo() {
        let mock = sample();
        assert_eq!(mock.set_trashed("a", true).unwrap(), "a");
        assert_eq!(mock.trashed_ids(), vec!["a".to_string()]);

        mock.echo_on_trash("b", "other");
        assert_eq!(mock.set_trashed("b", true).unwrap(), "other");
    }

    #[test]
    fn test_mock_records_calls() {
        let mock = sample();
        let _ = mock.metadata("a");
        let _ = mock.fetch_range("a", &ByteRange::new(0, 0));
        let _ = mock.set_trashed("a", true);

        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Metadata("a".to_string()),
                MockCall::FetchRange("a".to_string(), ByteRange::new(0, 0)),
                MockCall::SetTrashed("a".to_string(), true),
            ]
        );
        assert_eq!(mock.touched_ids(), vec!["a".to_string()]);
    }
}
