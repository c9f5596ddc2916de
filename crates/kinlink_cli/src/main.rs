//! `kinlink` command-line host.
//!
//! # Responsibility
//! - Wire `kinlink_core` services to a directory of markdown contact notes.
//! - Print every report as JSON on stdout; diagnostics go to the log file.

use clap::{Parser, Subcommand};
use kinlink_core::{
    init_logging_from_config, ConfigError, ContactHandle, EngineConfig, FsVault, LoggingError,
    ReciprocalService, SyncError, SyncService, UidMapping, UidService, VaultError,
    CONFIG_FILE_NAME,
};
use log::info;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "kinlink", version, about = "Keeps contact relationships in sync")]
struct Cli {
    /// Vault root directory.
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Two-way sync of one contact, or every contact with --all.
    Sync {
        file: Option<String>,
        #[arg(long, conflicts_with = "file")]
        all: bool,
    },
    /// Report mismatches between the keyed fields and the body-list.
    Check { file: String },
    /// Add missing reciprocal entries on the other party's note.
    Reciprocal {
        file: Option<String>,
        #[arg(long, conflicts_with = "file")]
        all: bool,
    },
    /// List UIDs claimed by more than one contact.
    Conflicts,
    /// Upgrade `name:` references to UIDs where the target resolves.
    Upgrade { file: String },
    /// Rewrite references to OLD as NEW across the vault.
    RewriteUid { old: String, new: String },
    /// Give a contact a UID if it has none.
    EnsureUid { file: String },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Runtime(std::io::Error),
    Vault(VaultError),
    Sync(SyncError),
    Usage(&'static str),
    Output(serde_json::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "config error: {err}"),
            Self::Logging(err) => write!(f, "logging error: {err}"),
            Self::Runtime(err) => write!(f, "runtime error: {err}"),
            Self::Vault(err) => write!(f, "vault error: {err}"),
            Self::Sync(err) => write!(f, "{err}"),
            Self::Usage(message) => write!(f, "{message}"),
            Self::Output(err) => write!(f, "failed to encode report: {err}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<VaultError> for CliError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

impl From<SyncError> for CliError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("kinlink: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = EngineConfig::load_or_default(&cli.vault.join(CONFIG_FILE_NAME))?;
    init_logging_from_config(&config, &cli.vault)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(execute(cli, config))
}

async fn execute(cli: Cli, config: EngineConfig) -> Result<(), CliError> {
    let vault = FsVault::new(&cli.vault, config.contacts_folder.clone());
    info!(
        "event=cli_command module=cli status=start vault={}",
        vault.root().display()
    );

    match cli.command {
        Command::Sync { file, all } => {
            let service = SyncService::new(&vault, config);
            if all {
                print_json(&service.sync_all().await?)
            } else {
                let handle = handle_arg(file)?;
                print_json(&service.perform_full_sync(&handle).await)
            }
        }
        Command::Check { file } => {
            let service = SyncService::new(&vault, config);
            let report = service
                .validate_relationship_consistency(&to_handle(&file))
                .await?;
            print_json(&report)
        }
        Command::Reciprocal { file, all } => {
            let service = ReciprocalService::new(&vault, config);
            if all {
                print_json(&service.process_all_reciprocal_relationships().await?)
            } else {
                let handle = handle_arg(file)?;
                print_json(&service.process_reciprocal_relationships(&handle).await?)
            }
        }
        Command::Conflicts => {
            let service = UidService::new(&vault);
            print_json(&service.detect_uid_conflicts().await?)
        }
        Command::Upgrade { file } => {
            let service = UidService::new(&vault);
            let report = service
                .upgrade_name_references_to_uid(&to_handle(&file))
                .await?;
            print_json(&report)
        }
        Command::RewriteUid { old, new } => {
            let service = UidService::new(&vault);
            let mapping = UidMapping::Uids(vec![(old, new)]);
            print_json(&service.bulk_rewrite_uid_in_vault(&mapping).await?)
        }
        Command::EnsureUid { file } => {
            let service = UidService::new(&vault);
            print_json(&service.ensure_uid(&to_handle(&file)).await?)
        }
    }
}

fn handle_arg(file: Option<String>) -> Result<ContactHandle, CliError> {
    file.map(|file| to_handle(&file))
        .ok_or(CliError::Usage("pass a contact file or --all"))
}

/// Vault-relative handle from a command-line path.
fn to_handle(file: &str) -> ContactHandle {
    let normalized = file.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    ContactHandle::new(trimmed)
}

fn print_json<T: Serialize>(report: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{to_handle, Cli, Command};
    use clap::Parser;

    #[test]
    fn handles_are_vault_relative() {
        assert_eq!(to_handle("./people/Jane Doe.md").as_str(), "people/Jane Doe.md");
        assert_eq!(to_handle("people\\Bob.md").as_str(), "people/Bob.md");
    }

    #[test]
    fn sync_all_conflicts_with_file() {
        assert!(Cli::try_parse_from(["kinlink", "sync", "Jane.md", "--all"]).is_err());
        let cli = Cli::try_parse_from(["kinlink", "--vault", "/tmp/v", "sync", "--all"])
            .expect("sync --all parses");
        assert!(matches!(cli.command, Command::Sync { all: true, file: None }));
    }
}
