use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "drivesweep")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Drain a Google Drive folder onto a local backup volume", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every file in the folder, then move it to the trash
    Sync(SyncArgs),

    /// List the contents of the remote folder
    List(ListArgs),

    /// Show free space on the destination volume
    Disk(DiskArgs),

    /// Manage the stored Google credential
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Show or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Parser)]
pub struct SyncArgs {
    /// Remote folder id (overrides config)
    #[arg(short, long, env = "DRIVESWEEP_FOLDER_ID")]
    pub folder: Option<String>,

    /// Local destination directory (overrides config)
    #[arg(short, long, env = "DRIVESWEEP_DEST")]
    pub dest: Option<String>,

    /// Check free space and show what would be downloaded
    #[arg(long)]
    pub dry_run: bool,

    /// Download without trashing the remote copy
    #[arg(long)]
    pub keep_remote: bool,
}

// ============================================================================
// List / Disk
// ============================================================================

#[derive(Parser)]
pub struct ListArgs {
    /// Remote folder id (overrides config)
    #[arg(short, long, env = "DRIVESWEEP_FOLDER_ID")]
    pub folder: Option<String>,

    /// Include trashed entries
    #[arg(long)]
    pub trashed: bool,

    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DiskArgs {
    /// Local destination directory (overrides config)
    #[arg(short, long, env = "DRIVESWEEP_DEST")]
    pub dest: Option<String>,
}

// ============================================================================
// Auth / Config
// ============================================================================

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Run the browser authorization flow and store the credential
    Login,

    /// Show the stored credential and whether it is still valid
    Status,

    /// Delete the stored credential
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration and file locations
    Show,

    /// Write a config file with defaults
    Init {
        /// Remote folder id to store
        #[arg(short, long)]
        folder: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from([
            "drivesweep",
            "-vv",
            "sync",
            "--folder",
            "abc",
            "--dest",
            "/mnt/backup",
            "--keep-remote",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.folder.as_deref(), Some("abc"));
        assert_eq!(args.dest.as_deref(), Some("/mnt/backup"));
        assert!(args.keep_remote);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_auth_subcommand() {
        let cli = Cli::try_parse_from(["drivesweep", "-q", "auth", "logout"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Auth(AuthCommand::Logout)));
    }
}
