use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::SweepConfig;
use crate::paths;
use crate::ui;

pub fn run(_ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(),
        ConfigCommand::Init { folder, force } => init(folder, force),
    }
}

fn show() -> Result<()> {
    let path = SweepConfig::path()?;
    let config = SweepConfig::load()?;

    ui::header("Configuration");
    ui::kv("Config file", &path.display().to_string());
    if !path.exists() {
        ui::dim("Not found, using defaults. Run 'drivesweep config init' to create it.");
    }
    ui::kv("State directory", &paths::state_dir()?.display().to_string());
    println!();

    ui::kv("folder_id", config.folder_id.as_deref().unwrap_or("(not set)"));
    ui::kv("destination", &config.destination_path().display().to_string());
    ui::kv(
        "part_size",
        &format!("{} ({})", config.part_size, ui::format_size(config.part_size)),
    );
    ui::kv("min_free_percent", &config.min_free_percent.to_string());
    ui::kv(
        "client_secrets",
        &config.client_secrets_path()?.display().to_string(),
    );
    ui::kv("token_file", &config.token_path()?.display().to_string());
    ui::kv("scopes", &config.scopes.join(" "));
    Ok(())
}

fn init(folder: Option<String>, force: bool) -> Result<()> {
    let path = SweepConfig::path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = SweepConfig {
        folder_id: folder,
        ..Default::default()
    };
    config.save_to(&path)?;

    ui::success(&format!("Wrote {}", path.display()));
    if config.folder_id.is_none() {
        ui::dim("Set folder_id before running 'drivesweep sync'");
    }
    ui::dim(&format!(
        "Place your OAuth client secrets at {}",
        config.client_secrets_path()?.display()
    ));
    Ok(())
}
