use anyhow::Result;
use chrono::{Local, Utc};
use gdrive::Client;
use gdrive::auth::{self, CredentialStore, FileCredentialStore, OAuthAuthorizer, TokenSource};

use super::remote_failure;
use crate::Context;
use crate::cli::AuthCommand;
use crate::config::SweepConfig;
use crate::ui;

pub fn run(_ctx: &Context, cmd: AuthCommand) -> Result<()> {
    let config = SweepConfig::load()?;
    match cmd {
        AuthCommand::Login => login(&config),
        AuthCommand::Status => status(&config),
        AuthCommand::Logout => logout(&config),
    }
}

fn store(config: &SweepConfig) -> Result<FileCredentialStore> {
    Ok(FileCredentialStore::new(config.token_path()?))
}

fn authorizer(config: &SweepConfig) -> Result<OAuthAuthorizer> {
    Ok(OAuthAuthorizer::from_file(
        config.client_secrets_path()?,
        config.scopes.clone(),
    ))
}

/// Build a Drive client, validating the credential before any remote call
pub fn connect(config: &SweepConfig) -> Result<Client> {
    let tokens = TokenSource::new(Box::new(store(config)?), Box::new(authorizer(config)?));
    tokens
        .credential()
        .map_err(|e| remote_failure("Authorization failed", e))?;
    Ok(Client::new(tokens))
}

fn login(config: &SweepConfig) -> Result<()> {
    let store = store(config)?;
    ui::header("Authorize Google Drive");
    ui::kv("Client secrets", &config.client_secrets_path()?.display().to_string());

    let credential = auth::reauthorize(&store, &authorizer(config)?)
        .map_err(|e| remote_failure("Authorization failed", e))?;

    ui::success(&format!("Credential saved to {}", store.path().display()));
    if !credential.can_refresh() {
        ui::warn("No refresh token was granted; you will need to log in again when it expires");
    }
    Ok(())
}

fn status(config: &SweepConfig) -> Result<()> {
    let store = store(config)?;
    ui::header("Credential");
    ui::kv("Token file", &store.path().display().to_string());

    let credential = match store.load() {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            ui::warn("Not logged in. Run 'drivesweep auth login'");
            return Ok(());
        }
        Err(e) => return Err(remote_failure("Could not read token file", e)),
    };

    ui::kv("Client id", &credential.client_id);
    ui::kv("Scopes", &credential.scopes.join(" "));
    match credential.expiry {
        Some(expiry) => ui::kv(
            "Expires",
            &expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        None => ui::kv("Expires", "unknown"),
    }

    if credential.is_valid(Utc::now()) {
        ui::success("Access token is valid");
    } else if credential.can_refresh() {
        ui::info("Access token expired; it will be refreshed on next use");
    } else {
        ui::warn("Credential expired and cannot be refreshed. Run 'drivesweep auth login'");
    }
    Ok(())
}

fn logout(config: &SweepConfig) -> Result<()> {
    let store = store(config)?;
    let removed = store
        .clear()
        .map_err(|e| remote_failure("Could not remove token file", e))?;

    if removed {
        ui::success(&format!("Removed {}", store.path().display()));
    } else {
        ui::dim("No stored credential");
    }
    Ok(())
}
