use anyhow::Result;

use crate::Context;
use crate::cli::DiskArgs;
use crate::config::SweepConfig;
use crate::engine::DiskGuard;
use crate::ui;

pub fn run(_ctx: &Context, args: DiskArgs) -> Result<()> {
    let config = SweepConfig::load()?.with_overrides(None, args.dest);
    let destination = config.destination_path();

    ui::header("Destination volume");
    ui::kv("Path", &destination.display().to_string());

    let guard = DiskGuard::new(&destination, config.min_free_percent);
    let status = guard.check()?;

    ui::kv("Total", &ui::format_size(status.stat.total));
    ui::kv("Available", &ui::format_size(status.stat.available));
    ui::kv("Threshold", &format!("{}%", guard.threshold()));

    if status.ok {
        ui::success("Enough free space to sync");
        Ok(())
    } else {
        anyhow::bail!(
            "Free space {:.2}% is not above {}%",
            status.free_percent,
            guard.threshold()
        )
    }
}
