use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use parking_lot::Mutex;

use crate::app::{ActionDispatcher, App, Intent, Outcome};
use crate::config::{AppConfig, ConfigLoader};
use crate::notify::{
    self, EnableOutcome, NoteAlerts, NotificationPreference, NotificationPrefs, Notifier,
    Permission, TerminalNotifier,
};
use crate::platform::{self, ConsolePrompt, DeferredPrompt, InstallFlow, InstallOutcome};
use crate::reminder::{ReminderJob, ReminderTimer};
use crate::storage::{KeyValueStore, StorageHandle};
use crate::store::{FilterMode, Note, NoteCounts, NoteId, NoteStore};

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Note text; words are joined with single spaces
    #[arg()]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Which notes to show (all, active, completed); defaults to the config value
    #[arg(long, short)]
    pub filter: Option<FilterMode>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub note_id: NoteId,
    /// Replacement text
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Note identifier
    pub note_id: NoteId,
}

#[derive(Subcommand, Debug, Clone)]
pub enum NotificationsCommand {
    /// Ask for permission and turn notifications on
    Enable,
    /// Turn notifications off
    Disable,
    /// Print the stored preference and current permission
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct NotificationsArgs {
    #[command(subcommand)]
    pub command: NotificationsCommand,
}

#[derive(Args, Debug, Clone)]
pub struct RemindArgs {
    /// Keep running and remind on the configured interval
    #[arg(long)]
    pub watch: bool,
}

pub fn run_tui(loader: ConfigLoader, config: Arc<AppConfig>, storage: StorageHandle) -> Result<()> {
    let (notifier, notices) = TerminalNotifier::queued();
    let alerts = NoteAlerts::new(
        NotificationPrefs::new(storage.clone()),
        Arc::new(notifier),
        config.notifications.clone(),
    );
    let store = NoteStore::load(storage);
    let mut app = App::new(config, store, alerts).with_notices(notices);
    if !loader.is_installed() {
        app = app.with_install_offer(loader);
    }
    app.start_background()?;
    app.run()
}

pub fn add_note(config: &AppConfig, storage: &StorageHandle, args: AddArgs) -> Result<()> {
    let text = if args.text.is_empty() {
        read_stdin()?.unwrap_or_default()
    } else {
        args.text.join(" ")
    };
    let alerts = stderr_alerts(config, storage);
    let mut store = NoteStore::load(storage);
    let events = store.subscribe();
    match apply(&mut store, Intent::Add(text))? {
        Some(line) => println!("{line}"),
        None => tracing::debug!("ignored empty note"),
    }
    alerts.pump(&events);
    Ok(())
}

pub fn list_notes(config: &AppConfig, storage: &StorageHandle, args: ListArgs) -> Result<()> {
    let store = NoteStore::load(storage);
    let mode = args.filter.unwrap_or(config.default_filter);
    print!(
        "{}",
        format_note_list(&store.filtered(mode), mode, store.counts())
    );
    Ok(())
}

pub fn edit_note(storage: &StorageHandle, args: EditArgs) -> Result<()> {
    let mut store = NoteStore::load(storage);
    let intent = Intent::Update {
        note_id: args.note_id,
        text: args.text.join(" "),
    };
    if let Some(line) = apply(&mut store, intent)? {
        println!("{line}");
    }
    Ok(())
}

pub fn toggle_note(storage: &StorageHandle, args: IdArgs) -> Result<()> {
    let mut store = NoteStore::load(storage);
    if let Some(line) = apply(&mut store, Intent::ToggleCompleted(args.note_id))? {
        println!("{line}");
    }
    Ok(())
}

pub fn delete_note(storage: &StorageHandle, args: IdArgs) -> Result<()> {
    let mut store = NoteStore::load(storage);
    if let Some(line) = apply(&mut store, Intent::Delete(args.note_id))? {
        println!("{line}");
    }
    Ok(())
}

pub fn notifications(storage: &StorageHandle, args: NotificationsArgs) -> Result<()> {
    let prefs = NotificationPrefs::new(storage);
    let notifier = TerminalNotifier::stderr();
    match args.command {
        NotificationsCommand::Enable => match notify::enable(&prefs, &notifier) {
            EnableOutcome::Enabled => println!("Notifications enabled"),
            EnableOutcome::Blocked(alert) => bail!("{}", alert.message),
        },
        NotificationsCommand::Disable => {
            notify::disable(&prefs);
            println!("Notifications disabled");
        }
        NotificationsCommand::Status => println!(
            "Notifications: {} (permission: {})",
            prefs.get(),
            permission_label(notifier.permission())
        ),
    }
    Ok(())
}

pub fn remind(config: &AppConfig, storage: StorageHandle, args: RemindArgs) -> Result<()> {
    let alerts = Arc::new(stderr_alerts(config, storage.clone()));
    if !alerts.prefs().is_enabled() {
        println!("Notifications are disabled; run `notes notifications enable` first");
        return Ok(());
    }
    if !alerts.can_notify() {
        bail!("notifications are blocked: stderr is not a terminal");
    }
    let store = Arc::new(Mutex::new(NoteStore::load(storage)));
    let job = ReminderJob::new(store, alerts);
    if !args.watch {
        if job.run_once().is_none() {
            println!("Nothing to remind about");
        }
        return Ok(());
    }
    if !config.reminder.enabled {
        bail!("reminders are disabled in the config file");
    }
    println!(
        "Reminding every {} (Ctrl-C to stop)",
        format_interval(config.reminder.interval)
    );
    ReminderTimer::spawn(config.reminder.interval, job.reloading())?.join();
    Ok(())
}

pub fn status(loader: &ConfigLoader, config: &AppConfig, storage: &StorageHandle) -> Result<()> {
    let store = NoteStore::load(storage);
    let notifier = TerminalNotifier::stderr();
    let report = StatusReport {
        counts: store.counts(),
        online: platform::probe(&config.network.probe_addr, config.network.timeout()),
        notifications: NotificationPrefs::new(storage).get(),
        permission: notifier.permission(),
        config_file: loader
            .is_installed()
            .then(|| loader.paths().config_file.clone()),
        database: storage.database_path().to_path_buf(),
    };
    print!("{}", format_status(&report));
    Ok(())
}

pub fn install(loader: &ConfigLoader) -> Result<()> {
    let prompt = ConsolePrompt::new("Install Offline Notes on this device?");
    print!("{}", run_install(loader, Box::new(prompt))?);
    Ok(())
}

fn run_install(loader: &ConfigLoader, prompt: Box<dyn DeferredPrompt>) -> Result<String> {
    let config_file = loader.paths().config_file.display();
    if loader.is_installed() {
        return Ok(format!("Already installed ({config_file})\n"));
    }
    let mut flow = InstallFlow::new();
    flow.capture(prompt);
    match flow.click_and_wait() {
        Some(InstallOutcome::Accepted) => {
            loader.install().context("installing")?;
            Ok(format!("Installed; config written to {config_file}\n"))
        }
        Some(InstallOutcome::Dismissed) | None => Ok("Install dismissed\n".to_string()),
    }
}

fn apply<S: KeyValueStore>(store: &mut NoteStore<S>, intent: Intent) -> Result<Option<String>> {
    let line = match ActionDispatcher::new(store).dispatch(intent) {
        Outcome::Added(id) => format!("Added note #{id}"),
        Outcome::Rejected => return Ok(None),
        Outcome::Updated(id) => format!("Updated note #{id}"),
        Outcome::Unchanged(id) => format!("No changes to note #{id}"),
        Outcome::Completed(id) => format!("Completed note #{id}"),
        Outcome::Reopened(id) => format!("Reopened note #{id}"),
        Outcome::Deleted(id) => format!("Deleted note #{id}"),
        Outcome::Missing(id) => bail!("note #{id} not found"),
    };
    Ok(Some(line))
}

fn stderr_alerts<S: KeyValueStore>(config: &AppConfig, storage: S) -> NoteAlerts<S> {
    NoteAlerts::new(
        NotificationPrefs::new(storage),
        Arc::new(TerminalNotifier::stderr()),
        config.notifications.clone(),
    )
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading note text from stdin")?;
    Ok(Some(buf))
}

fn format_note_list(notes: &[&Note], mode: FilterMode, counts: NoteCounts) -> String {
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "{}: {} of {} note{}",
        mode.label(),
        notes.len(),
        counts.all,
        plural(counts.all)
    );
    if notes.is_empty() {
        let empty = if counts.all == 0 {
            "No notes yet."
        } else {
            "No notes match this filter."
        };
        let _ = writeln!(&mut out, "{empty}");
        return out;
    }
    for note in notes {
        let mark = if note.completed { 'x' } else { ' ' };
        let _ = writeln!(&mut out, "[{mark}] #{}  {}", note.id, note.text);
        let _ = writeln!(&mut out, "    added {}", note.date);
    }
    out
}

struct StatusReport {
    counts: NoteCounts,
    online: bool,
    notifications: NotificationPreference,
    permission: Permission,
    /// Present once installed.
    config_file: Option<PathBuf>,
    database: PathBuf,
}

fn format_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let counts = report.counts;
    let _ = writeln!(
        &mut out,
        "Notes:         {} total, {} active, {} completed",
        counts.all, counts.active, counts.completed
    );
    let network = if report.online {
        "online"
    } else {
        "offline (working from local storage)"
    };
    let _ = writeln!(&mut out, "Network:       {network}");
    let _ = writeln!(
        &mut out,
        "Notifications: {} (permission: {})",
        report.notifications,
        permission_label(report.permission)
    );
    match &report.config_file {
        Some(path) => {
            let _ = writeln!(&mut out, "Installed:     yes ({})", path.display());
        }
        None => {
            let _ = writeln!(&mut out, "Installed:     no (run `notes install`)");
        }
    }
    let _ = writeln!(&mut out, "Database:      {}", report.database.display());
    out
}

fn permission_label(permission: Permission) -> &'static str {
    match permission {
        Permission::Default => "not asked",
        Permission::Granted => "granted",
        Permission::Denied => "denied",
    }
}

fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
