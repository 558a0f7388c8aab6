//! Progress indicators for drivesweep.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress bar for one download; hidden when `visible` is false.
pub fn transfer_bar(total_bytes: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(label.to_string());
    pb
}

/// Finish a bar with a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    if !pb.is_hidden() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Finish a bar with a warning line
pub fn finish_warn(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    if !pb.is_hidden() {
        println!("{} {}", "⚠".yellow(), msg);
    }
}

/// Finish a bar with an error line
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.abandon();
    if !pb.is_hidden() {
        eprintln!("{} {}", "✗".red(), msg);
    }
}
