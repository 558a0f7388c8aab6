//! Drain the remote folder into the destination directory

use anyhow::{Context as _, Result};
use std::fs;

use super::{auth, remote_failure};
use crate::Context;
use crate::cli::SyncArgs;
use crate::config::SweepConfig;
use crate::engine::{
    ChunkedDownloader, DiskGuard, EntryOutcome, SyncLoop, SyncOptions, SyncReport, TrashOutcome,
};
use crate::ui;

pub fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let config = SweepConfig::load()?.with_overrides(args.folder, args.dest);
    config.validate()?;
    let folder = config.require_folder()?;
    let destination = config.destination_path();
    let options = SyncOptions {
        dry_run: args.dry_run,
        keep_remote: args.keep_remote,
    };

    if !destination.exists() {
        if options.dry_run {
            ui::warn(&format!("{} does not exist yet", destination.display()));
        } else {
            fs::create_dir_all(&destination)
                .with_context(|| format!("Could not create {}", destination.display()))?;
            log::info!("Created {}", destination.display());
        }
    }

    let client = auth::connect(&config)?;

    ui::header(if options.dry_run { "Sync (dry run)" } else { "Sync" });
    ui::kv("Folder", folder);
    ui::kv("Destination", &destination.display().to_string());
    if options.keep_remote {
        ui::kv("Remote copies", "kept");
    }
    println!();

    let entries = client
        .list_folder(folder, false)
        .map_err(|e| remote_failure("Could not list remote folder", e))?;
    if entries.is_empty() {
        ui::info("Folder is empty, nothing to do");
        return Ok(());
    }
    ui::info(&format!("{} entries to process", entries.len()));

    let guard = DiskGuard::new(&destination, config.min_free_percent);
    let downloader = ChunkedDownloader::new(&client, &destination, config.part_size()?)
        .show_progress(!ctx.quiet);
    let report = SyncLoop::new(&client, &guard, downloader, options).run(&entries)?;

    print_summary(&report, entries.len());

    if let Some(message) = halt_message(&report, entries.len(), config.min_free_percent) {
        anyhow::bail!("{}", message);
    }
    Ok(())
}

/// Failure message for a run stopped on low disk space
fn halt_message(report: &SyncReport, total: usize, min_free_percent: f64) -> Option<String> {
    let status = report.halted?;
    // The halted entry is recorded but was not processed.
    let processed = report.outcomes.len().saturating_sub(1);
    Some(format!(
        "Stopped with {} of {} entries left: free space {:.2}% is not above {}%",
        total.saturating_sub(processed),
        total,
        status.free_percent,
        min_free_percent
    ))
}

fn print_summary(report: &SyncReport, total: usize) {
    ui::header("Summary");
    ui::kv("Processed", &format!("{}/{}", report.outcomes.len(), total));
    ui::kv("Downloaded", &report.downloaded().to_string());
    ui::kv("Written", &ui::format_size(report.bytes_written()));
    ui::kv("Trashed", &report.trashed().to_string());

    if report.failed() > 0 {
        ui::warn(&format!("{} downloads failed; remote copies kept", report.failed()));
    }
    if report.incomplete() > 0 {
        ui::warn(&format!("{} files were written with gaps", report.incomplete()));
    }
    if report.trash_problems() > 0 {
        ui::warn(&format!(
            "{} remote files could not be trashed",
            report.trash_problems()
        ));
    }

    for outcome in &report.outcomes {
        if let Some(problem) = describe_problem(outcome) {
            ui::dim(&format!("{}: {}", outcome.entry, problem));
        }
    }
}

fn describe_problem(outcome: &EntryOutcome) -> Option<String> {
    if let Some(error) = &outcome.error {
        return Some(error.clone());
    }
    match &outcome.trash {
        TrashOutcome::Mismatch(echoed) => Some(format!("trash echoed id {}", echoed)),
        TrashOutcome::Failed(error) => Some(format!("trash failed: {}", error)),
        _ => None,
    }
}
