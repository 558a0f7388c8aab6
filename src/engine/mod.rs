//! Sync engine for drivesweep
//!
//! The engine drains a remote folder:
//! 1. Range - Split each file into bounded byte ranges
//! 2. Disk - Gate every entry on free space at the destination
//! 3. Download - Fetch ranges in order into a local file
//! 4. Sync - Download, then trash the remote copy

pub mod disk;
pub mod download;
pub mod range;
pub mod sync;

pub use disk::DiskGuard;
pub use download::ChunkedDownloader;
pub use sync::{EntryOutcome, SyncLoop, SyncOptions, SyncReport, TrashOutcome};
