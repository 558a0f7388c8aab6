use anyhow::Result;
use colored::Colorize;
use gdrive::{RemoteEntry, RemoteEntryKind};

use super::{auth, remote_failure};
use crate::Context;
use crate::cli::ListArgs;
use crate::config::SweepConfig;
use crate::ui;

pub fn run(_ctx: &Context, args: ListArgs) -> Result<()> {
    let config = SweepConfig::load()?.with_overrides(args.folder, None);
    let folder = config.require_folder()?;
    let client = auth::connect(&config)?;

    let entries = client
        .list_folder(folder, args.trashed)
        .map_err(|e| remote_failure("Could not list remote folder", e))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    ui::header(&format!("Folder {}", folder));
    if entries.is_empty() {
        ui::dim("(empty)");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }

    let total: u64 = entries.iter().filter_map(|e| e.kind.size()).sum();
    println!();
    ui::kv("Entries", &entries.len().to_string());
    ui::kv("Total size", &ui::format_size(total));
    Ok(())
}

fn print_entry(entry: &RemoteEntry) {
    let kind = match &entry.kind {
        RemoteEntryKind::File(size) => ui::format_size(*size),
        RemoteEntryKind::Folder => "folder".to_string(),
        RemoteEntryKind::Native(_) => "document".to_string(),
    };
    let name = if entry.trashed {
        format!("{} (trashed)", entry.name).dimmed().to_string()
    } else {
        entry.name.clone()
    };
    println!("  {:>10}  {}  {}", kind, name, entry.id.dimmed());
}
