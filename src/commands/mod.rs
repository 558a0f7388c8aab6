// Remote folder commands
pub mod list;
pub mod sync;

// Local volume
pub mod disk;

// Credential and configuration management
pub mod auth;
pub mod config;

use crate::ui;

/// Wrap a Drive error with its category and print the matching advice
pub(crate) fn remote_failure(action: &str, err: gdrive::Error) -> anyhow::Error {
    let category = err.category();
    ui::dim(category.advice());
    if category.needs_reauth() {
        log::debug!("{} failed with an authorization error", action);
    }
    anyhow::Error::new(err).context(format!("{}: {}", action, category.description()))
}
