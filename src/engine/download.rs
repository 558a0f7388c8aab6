//! Chunked download of one remote file
//!
//! A file is fetched as a sequence of bounded ranged requests and appended
//! to a local file in index order. A failed fetch aborts the download; a
//! failed local write only leaves a gap and the remaining parts continue.

use anyhow::{Context, Result};
use gdrive::{Client, RemoteEntry, RemoteEntryKind};
use std::fs::File;
use std::io::{self, Write};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use super::range::partition;
use crate::{progress, ui};

/// What happened to one download request
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Folder or native document; nothing was fetched or created
    Skipped(RemoteEntry),
    Downloaded(TransferReport),
}

/// Accounting for a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub path: PathBuf,
    pub declared_size: u64,
    pub bytes_written: u64,
    pub parts: usize,
    /// Zero-based indices of parts whose local write failed
    pub gaps: Vec<usize>,
    /// A local file with the same name was truncated
    pub replaced_existing: bool,
}

impl TransferReport {
    /// Every part written and the byte count matches the declared size
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty() && self.bytes_written == self.declared_size
    }
}

/// Destination file for one transfer
struct TransferTarget<W: Write> {
    path: PathBuf,
    writer: W,
}

impl<W: Write> TransferTarget<W> {
    fn write_part(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }
}

/// Downloads remote files into a destination directory in bounded parts.
pub struct ChunkedDownloader<'a> {
    client: &'a Client,
    destination: PathBuf,
    part_size: NonZeroU64,
    show_progress: bool,
}

impl<'a> ChunkedDownloader<'a> {
    pub fn new(client: &'a Client, destination: impl Into<PathBuf>, part_size: NonZeroU64) -> Self {
        Self {
            client,
            destination: destination.into(),
            part_size,
            show_progress: false,
        }
    }

    /// Show a byte progress bar per file
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Download `file_id` into `<destination>/<name>`, truncating any existing file.
    pub fn download(&self, file_id: &str) -> Result<DownloadOutcome> {
        self.download_with(file_id, |path| File::create(path))
    }

    /// Download using `open` to create the local file.
    pub fn download_with<W, F>(&self, file_id: &str, open: F) -> Result<DownloadOutcome>
    where
        W: Write,
        F: FnOnce(&Path) -> io::Result<W>,
    {
        let entry = self
            .client
            .metadata(file_id)
            .with_context(|| format!("Failed to fetch metadata for {}", file_id))?;

        let declared_size = match entry.kind {
            RemoteEntryKind::File(size) => size,
            RemoteEntryKind::Folder | RemoteEntryKind::Native(_) => {
                log::info!("Skipping {}: no binary content", entry);
                return Ok(DownloadOutcome::Skipped(entry));
            }
        };
        log::debug!("{} declares {} bytes", entry, declared_size);

        let ranges = partition(declared_size, self.part_size);
        let path = self.destination.join(sanitize_file_name(&entry.name));
        let replaced_existing = path.exists();
        if replaced_existing {
            log::warn!(
                "{} already exists and will be overwritten by {}",
                path.display(),
                entry
            );
        }
        let writer = open(&path).with_context(|| format!("Could not create {}", path.display()))?;
        let mut target = TransferTarget { path, writer };

        let pb = progress::transfer_bar(declared_size, &entry.name, self.show_progress);
        let mut report = TransferReport {
            path: target.path.clone(),
            declared_size,
            bytes_written: 0,
            parts: ranges.len(),
            gaps: Vec::new(),
            replaced_existing,
        };

        for (index, range) in ranges.iter().enumerate() {
            let bytes = match self.client.fetch_range(file_id, range) {
                Ok(bytes) => bytes,
                Err(e) => {
                    progress::finish_error(&pb, &format!("{}: download failed", entry.name));
                    return Err(anyhow::Error::new(e).context(format!(
                        "Failed to fetch part {}/{} {} of {}",
                        index + 1,
                        ranges.len(),
                        range,
                        entry.name
                    )));
                }
            };
            log::info!("Download part {}/{}", index + 1, ranges.len());
            pb.inc(range.len());

            match target.write_part(&bytes) {
                Ok(()) => report.bytes_written += bytes.len() as u64,
                Err(e) => {
                    log::error!(
                        "Write failed for part {}/{} of {}: {}",
                        index + 1,
                        ranges.len(),
                        target.path.display(),
                        e
                    );
                    report.gaps.push(index);
                }
            }
        }

        let summary = format!(
            "{} ({})",
            target.path.display(),
            ui::format_size(report.bytes_written)
        );
        if report.is_complete() {
            progress::finish_success(&pb, &summary);
        } else {
            progress::finish_warn(&pb, &summary);
        }

        Ok(DownloadOutcome::Downloaded(report))
    }
}

/// Make a remote name safe to use as a single local path component
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "unnamed".to_string(),
        _ => cleaned,
    }
}
