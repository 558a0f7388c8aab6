//! Sequential download-then-trash loop
//!
//! Each entry moves through [`EntryState`]:
//!
//! ```text
//! Pending -> DiskCheckFailed                      (run halts)
//! Pending -> Done                                 (folder / native, untouched)
//! Pending -> Downloading -> DownloadFailed        (remote kept)
//! Pending -> Downloading -> Downloaded -> Deleting -> Done
//! ```

use anyhow::Result;
use gdrive::{Client, RemoteEntry, TrashReceipt};

use super::disk::{DiskGuard, GuardStatus};
use super::download::{ChunkedDownloader, DownloadOutcome, TransferReport};
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    DiskCheckFailed,
    Downloading,
    DownloadFailed,
    Downloaded,
    Deleting,
    Done,
}

/// What happened when trashing the remote copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashOutcome {
    NotAttempted,
    /// `keep_remote` was set
    Kept,
    Confirmed,
    /// Remote answered with another id
    Mismatch(String),
    Failed(String),
}

/// Final record for one entry
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub entry: RemoteEntry,
    pub state: EntryState,
    pub transfer: Option<TransferReport>,
    pub trash: TrashOutcome,
    pub error: Option<String>,
}

impl EntryOutcome {
    fn new(entry: &RemoteEntry) -> Self {
        Self {
            entry: entry.clone(),
            state: EntryState::Pending,
            transfer: None,
            trash: TrashOutcome::NotAttempted,
            error: None,
        }
    }

    fn advance(&mut self, next: EntryState) {
        log::trace!("{}: {:?} -> {:?}", self.entry.id, self.state, next);
        self.state = next;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Check disk space and report, without downloading or trashing
    pub dry_run: bool,
    /// Download but leave the remote copy in place
    pub keep_remote: bool,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcomes: Vec<EntryOutcome>,
    /// Guard status that stopped the run, if any
    pub halted: Option<GuardStatus>,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.transfer.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.count_state(EntryState::DownloadFailed)
    }

    pub fn trashed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.trash == TrashOutcome::Confirmed)
            .count()
    }

    /// Entries downloaded with gaps or a short byte count
    pub fn incomplete(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.transfer.as_ref())
            .filter(|t| !t.is_complete())
            .count()
    }

    /// Trash requests that errored or echoed another id
    pub fn trash_problems(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.trash, TrashOutcome::Mismatch(_) | TrashOutcome::Failed(_)))
            .count()
    }

    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.transfer.as_ref())
            .map(|t| t.bytes_written)
            .sum()
    }

    fn count_state(&self, state: EntryState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Drives entries one at a time through disk check, download and trash.
pub struct SyncLoop<'a> {
    client: &'a Client,
    guard: &'a DiskGuard,
    downloader: ChunkedDownloader<'a>,
    options: SyncOptions,
}

impl<'a> SyncLoop<'a> {
    pub fn new(
        client: &'a Client,
        guard: &'a DiskGuard,
        downloader: ChunkedDownloader<'a>,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            guard,
            downloader,
            options,
        }
    }

    /// Process `entries` in order.
    ///
    /// Only a disk probe error fails the run. Low free space stops it and is
    /// reported through [`SyncReport::halted`].
    pub fn run(&self, entries: &[RemoteEntry]) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for entry in entries {
            let mut outcome = EntryOutcome::new(entry);

            let status = self.guard.check()?;
            if !status.ok {
                outcome.advance(EntryState::DiskCheckFailed);
                log::warn!(
                    "Stopping before {}: free space {:.2}% is not above {}%",
                    entry,
                    status.free_percent,
                    self.guard.threshold()
                );
                report.outcomes.push(outcome);
                report.halted = Some(status);
                break;
            }

            self.process(entry, &mut outcome);
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    fn process(&self, entry: &RemoteEntry, outcome: &mut EntryOutcome) {
        if !entry.kind.is_file() {
            log::info!("Skipping {}: not a regular file, leaving it in place", entry);
            outcome.advance(EntryState::Done);
            return;
        }

        if self.options.dry_run {
            ui::dim(&format!("Would download {}", entry));
            return;
        }

        ui::info(&format!("Downloading {}", entry));
        outcome.advance(EntryState::Downloading);

        let transfer = match self.downloader.download(&entry.id) {
            Ok(DownloadOutcome::Downloaded(transfer)) => transfer,
            Ok(DownloadOutcome::Skipped(current)) => {
                log::info!("Skipping {}: remote reports {:?}", entry, current.kind);
                outcome.advance(EntryState::Done);
                return;
            }
            Err(e) => {
                ui::error(&format!("{}: {:#}", entry.name, e));
                outcome.error = Some(format!("{:#}", e));
                outcome.advance(EntryState::DownloadFailed);
                return;
            }
        };

        if transfer.replaced_existing {
            ui::warn(&format!(
                "{} replaced an existing local file",
                transfer.path.display()
            ));
        }
        if !transfer.is_complete() {
            log::warn!(
                "{}: wrote {} of {} declared bytes ({} of {} parts failed)",
                transfer.path.display(),
                transfer.bytes_written,
                transfer.declared_size,
                transfer.gaps.len(),
                transfer.parts
            );
        }
        outcome.transfer = Some(transfer);
        outcome.advance(EntryState::Downloaded);

        if self.options.keep_remote {
            outcome.trash = TrashOutcome::Kept;
            outcome.advance(EntryState::Done);
            return;
        }

        outcome.advance(EntryState::Deleting);
        outcome.trash = match self.client.trash(&entry.id) {
            Ok(TrashReceipt::Confirmed) => {
                ui::success(&format!("Trashed {}", entry));
                TrashOutcome::Confirmed
            }
            Ok(TrashReceipt::Mismatch { echoed }) => {
                log::error!("Trash of {} echoed id {}, local copy kept", entry, echoed);
                TrashOutcome::Mismatch(echoed)
            }
            Err(e) => {
                log::error!("Trash of {} failed: {}", entry, e);
                TrashOutcome::Failed(e.to_string())
            }
        };
        outcome.advance(EntryState::Done);
    }
}
