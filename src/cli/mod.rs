use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{AddArgs, EditArgs, IdArgs, ListArgs, NotificationsArgs, RemindArgs};

const LOG_FILE: &str = "offline-notes.log";

#[derive(Parser, Debug)]
#[command(
    name = "notes",
    version,
    about = "Offline-first notes with completion tracking and reminders"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over OFFLINE_NOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over OFFLINE_NOTES_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Add a note; reads stdin when no text is given
    Add(AddArgs),
    /// Print notes, newest first
    List(ListArgs),
    /// Replace the text of a note
    Edit(EditArgs),
    /// Flip a note between active and completed
    Toggle(IdArgs),
    /// Delete a note
    Delete(IdArgs),
    /// Turn new-note and reminder notifications on or off
    Notifications(NotificationsArgs),
    /// Send the unfinished-notes reminder now, or keep sending it
    Remind(RemindArgs),
    /// Show counts, connectivity, notification and install state
    Status,
    /// Create the application directories and default config
    Install,
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    let command = cli.command.unwrap_or(Commands::Tui);
    let target = match command {
        Commands::Tui => LogTarget::File(loader.paths().log_dir.join(LOG_FILE)),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = Arc::new(loader.load_or_default()?);
    let storage =
        storage::init(loader.paths(), &config.storage).context("opening note storage")?;

    match command {
        Commands::Tui => commands::run_tui(loader, config, storage),
        Commands::Add(args) => commands::add_note(&config, &storage, args),
        Commands::List(args) => commands::list_notes(&config, &storage, args),
        Commands::Edit(args) => commands::edit_note(&storage, args),
        Commands::Toggle(args) => commands::toggle_note(&storage, args),
        Commands::Delete(args) => commands::delete_note(&storage, args),
        Commands::Notifications(args) => commands::notifications(&storage, args),
        Commands::Remind(args) => commands::remind(&config, storage, args),
        Commands::Status => commands::status(&loader, &config, &storage),
        Commands::Install => commands::install(&loader),
    }
}

fn init_tracing(level: &str, target: LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating log directory {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
