use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use parking_lot::Mutex;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::{AppConfig, ConfigLoader};
use crate::notify::{self, EnableOutcome, NoteAlerts, Notification};
use crate::platform::{
    InstallFlow, InstallOutcome, InstallResponder, NetworkMonitor, NetworkStatus, PendingInstall,
    QueuedPrompt,
};
use crate::reminder::{ReminderJob, ReminderTimer};
use crate::storage::KeyValueStore;
use crate::store::{FilterMode, NoteStore, StoreEvent};
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::{ActionDispatcher, Intent, Outcome};
pub use state::{Overlay, TextInput, ViewState};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    Reload,
    NewNote,
    EditNote,
    ToggleCompleted,
    DeleteNote,
    CycleFilter,
    SetFilter(FilterMode),
    ToggleNotifications,
    Install,
}

pub struct App<S> {
    config: Arc<AppConfig>,
    store: Arc<Mutex<NoteStore<S>>>,
    events: Receiver<StoreEvent>,
    alerts: Arc<NoteAlerts<S>>,
    notices: Option<Receiver<Notification>>,
    network: NetworkStatus,
    monitor: Option<NetworkMonitor>,
    reminder: Option<ReminderTimer>,
    install: InstallFlow,
    install_requests: Option<Receiver<InstallResponder>>,
    install_responder: Option<InstallResponder>,
    pending_install: Option<PendingInstall>,
    installer: Option<ConfigLoader>,
    state: ViewState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl<S> App<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(config: Arc<AppConfig>, mut store: NoteStore<S>, alerts: NoteAlerts<S>) -> Self {
        let events = store.subscribe();
        let mut state = ViewState::new(config.default_filter);
        state.refresh(&store);
        state.notifications_enabled = alerts.prefs().is_enabled();
        Self {
            config,
            store: Arc::new(Mutex::new(store)),
            events,
            alerts: Arc::new(alerts),
            notices: None,
            network: NetworkStatus::new(true),
            monitor: None,
            reminder: None,
            install: InstallFlow::new(),
            install_requests: None,
            install_responder: None,
            pending_install: None,
            installer: None,
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        }
    }

    pub fn with_notices(mut self, notices: Receiver<Notification>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn with_install_offer(mut self, installer: ConfigLoader) -> Self {
        let (prompt, requests) = QueuedPrompt::new();
        self.install.capture(Box::new(prompt));
        self.install_requests = Some(requests);
        self.installer = Some(installer);
        self.state.install_available = true;
        self
    }

    pub fn start_background(&mut self) -> Result<()> {
        if self.config.reminder.enabled {
            let job = ReminderJob::new(self.store.clone(), self.alerts.clone());
            self.reminder = Some(ReminderTimer::spawn(self.config.reminder.interval, job)?);
        }
        self.monitor = Some(NetworkMonitor::spawn(
            self.network.clone(),
            &self.config.network,
        )?);
        Ok(())
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        self.shutdown();
        result
    }

    fn shutdown(&mut self) {
        if let Some(mut reminder) = self.reminder.take() {
            reminder.stop();
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            self.on_tick();
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Reload)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('a') if plain => Some(Action::NewNote),
            KeyCode::Char('e') | KeyCode::Enter if plain => Some(Action::EditNote),
            KeyCode::Char(' ') | KeyCode::Char('x') if plain => Some(Action::ToggleCompleted),
            KeyCode::Char('d') | KeyCode::Delete if plain => Some(Action::DeleteNote),
            KeyCode::Char('f') | KeyCode::Tab if plain => Some(Action::CycleFilter),
            KeyCode::Char('1') => Some(Action::SetFilter(FilterMode::All)),
            KeyCode::Char('2') => Some(Action::SetFilter(FilterMode::Active)),
            KeyCode::Char('3') => Some(Action::SetFilter(FilterMode::Completed)),
            KeyCode::Char('n') if plain => Some(Action::ToggleNotifications),
            KeyCode::Char('i') if plain => Some(Action::Install),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
            self.on_tick();
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::Reload => {
                let mut store = self.store.lock();
                store.reload();
                self.state.refresh(&*store);
                self.state.set_status_message(Some("Reloaded from storage"));
            }
            Action::NewNote => {
                self.state.open_overlay(Overlay::AddNote(TextInput::default()));
            }
            Action::EditNote => {
                if let Some(note) = self.state.selected() {
                    let overlay = Overlay::EditNote {
                        note_id: note.id,
                        input: TextInput::new(&note.text),
                    };
                    self.state.open_overlay(overlay);
                }
            }
            Action::ToggleCompleted => {
                if let Some(note_id) = self.state.selected().map(|note| note.id) {
                    self.dispatch(Intent::ToggleCompleted(note_id));
                }
            }
            Action::DeleteNote => {
                if let Some(note) = self.state.selected() {
                    let overlay = Overlay::ConfirmDelete {
                        note_id: note.id,
                        text: note.text.clone(),
                    };
                    self.state.open_overlay(overlay);
                }
            }
            Action::CycleFilter => {
                let store = self.store.lock();
                self.state.cycle_filter(&*store);
            }
            Action::SetFilter(mode) => {
                let store = self.store.lock();
                self.state.set_filter(mode, &*store);
            }
            Action::ToggleNotifications => self.handle_toggle_notifications(),
            Action::Install => self.handle_install(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let Some(overlay) = self.state.overlay() else {
            return false;
        };
        match overlay {
            Overlay::AddNote(_) | Overlay::EditNote { .. } => self.handle_input_key(key),
            Overlay::ConfirmDelete { note_id, .. } => {
                let note_id = *note_id;
                match key.code {
                    KeyCode::Enter | KeyCode::Char('y') => {
                        self.state.close_overlay();
                        self.dispatch(Intent::Delete(note_id));
                    }
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    _ => {}
                }
            }
            Overlay::ConfirmInstall => match key.code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.answer_install(InstallOutcome::Accepted)
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.answer_install(InstallOutcome::Dismissed)
                }
                _ => {}
            },
            Overlay::Alert(_) => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    self.state.close_overlay();
                }
            }
        }
        true
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
            }
            KeyCode::Enter => self.submit_input(),
            KeyCode::Backspace => {
                if let Some(input) = self.state.input_mut() {
                    input.backspace();
                }
            }
            KeyCode::Delete => {
                if let Some(input) = self.state.input_mut() {
                    input.delete();
                }
            }
            KeyCode::Left => {
                if let Some(input) = self.state.input_mut() {
                    input.move_left();
                }
            }
            KeyCode::Right => {
                if let Some(input) = self.state.input_mut() {
                    input.move_right();
                }
            }
            KeyCode::Home => {
                if let Some(input) = self.state.input_mut() {
                    input.move_home();
                }
            }
            KeyCode::End => {
                if let Some(input) = self.state.input_mut() {
                    input.move_end();
                }
            }
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                if let Some(input) = self.state.input_mut() {
                    input.insert_char(ch);
                }
            }
            _ => {}
        }
    }

    fn submit_input(&mut self) {
        let intent = match self.state.overlay() {
            Some(Overlay::AddNote(input)) => {
                if input.value().trim().is_empty() {
                    return;
                }
                Intent::Add(input.value().to_string())
            }
            Some(Overlay::EditNote { note_id, input }) => Intent::Update {
                note_id: *note_id,
                text: input.value().to_string(),
            },
            _ => return,
        };
        self.state.close_overlay();
        self.dispatch(intent);
    }

    fn dispatch(&mut self, intent: Intent) {
        let mut store = self.store.lock();
        let outcome = ActionDispatcher::new(&mut *store).dispatch(intent);
        self.state.refresh(&*store);
        drop(store);
        match outcome {
            Outcome::Added(note_id) | Outcome::Updated(note_id) => {
                self.state.select_note_by_id(note_id);
            }
            _ => {}
        }
        if let Some(message) = outcome.message() {
            self.state.set_status_message(Some(message));
        }
    }

    fn handle_toggle_notifications(&mut self) {
        if self.alerts.prefs().is_enabled() {
            notify::disable(self.alerts.prefs());
            self.state.notifications_enabled = false;
            self.state.set_status_message(Some("Notifications off"));
            return;
        }
        match notify::enable(self.alerts.prefs(), self.alerts.notifier()) {
            EnableOutcome::Enabled => {
                self.state.notifications_enabled = true;
                self.state.set_status_message(Some("Notifications on"));
            }
            EnableOutcome::Blocked(alert) => {
                self.state.open_overlay(Overlay::Alert(alert.message));
            }
        }
    }

    fn handle_install(&mut self) {
        if self.pending_install.is_some() {
            return;
        }
        let Some(pending) = self.install.click() else {
            self.state.set_status_message(Some("Already installed"));
            return;
        };
        self.pending_install = Some(pending);
        if let Some(responder) = self
            .install_requests
            .as_ref()
            .and_then(|requests| requests.try_recv().ok())
        {
            self.install_responder = Some(responder);
            self.state.open_overlay(Overlay::ConfirmInstall);
        }
    }

    fn answer_install(&mut self, outcome: InstallOutcome) {
        self.state.close_overlay();
        if let Some(responder) = self.install_responder.take() {
            responder.resolve(outcome);
        }
    }

    fn poll_install(&mut self) {
        let Some(outcome) = self
            .pending_install
            .as_ref()
            .and_then(PendingInstall::try_outcome)
        else {
            return;
        };
        self.pending_install = None;
        self.install.complete(outcome);
        self.state.install_available = self.install.can_install();
        if outcome == InstallOutcome::Dismissed {
            self.state.set_status_message(Some("Install dismissed"));
            return;
        }
        let Some(installer) = self.installer.as_ref() else {
            return;
        };
        match installer.install() {
            Ok(_) => {
                let message = format!(
                    "Installed; config written to {}",
                    installer.paths().config_file.display()
                );
                self.state.set_status_message(Some(message));
            }
            Err(err) => {
                tracing::error!(?err, "install failed");
                self.state.set_status_message(Some("Install failed"));
            }
        }
    }

    fn on_tick(&mut self) {
        self.alerts.pump(&self.events);
        if let Some(notices) = &self.notices {
            if let Some(last) = notices.try_iter().last() {
                self.state
                    .set_status_message(Some(format!("🔔 {}", last.options.body)));
            }
        }
        if let Some(monitor) = &self.monitor {
            for event in monitor.events().try_iter() {
                tracing::debug!(?event, "connectivity event");
            }
        }
        self.state.online = self.network.is_online();
        self.poll_install();
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, NotificationConfig};
    use crate::notify::{
        MemoryNotifier, NotificationPreference, NotificationPrefs, Permission, PermissionOutcome,
    };
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    fn build(notifier: MemoryNotifier) -> (App<MemoryStore>, MemoryStore, Arc<MemoryNotifier>) {
        let storage = MemoryStore::new();
        let notifier = Arc::new(notifier);
        let alerts = NoteAlerts::new(
            NotificationPrefs::new(storage.clone()),
            notifier.clone(),
            NotificationConfig::default(),
        );
        let store = NoteStore::load(storage.clone());
        let app = App::new(Arc::new(AppConfig::default()), store, alerts);
        (app, storage, notifier)
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App<MemoryStore>, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn add_toggle_filter_delete_through_keys() {
        let (mut app, storage, _) = build(MemoryNotifier::granted());

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Buy milk");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().len(), 1);
        assert_eq!(app.state().status_message(), Some("Note added"));

        press(&mut app, KeyCode::Char(' '));
        assert!(app.state().rows()[0].completed);

        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.state().filter, FilterMode::Completed);
        assert_eq!(app.state().len(), 1);
        press(&mut app, KeyCode::Char('2'));
        assert!(app.state().is_empty());
        press(&mut app, KeyCode::Char('1'));

        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.state().overlay(), Some(Overlay::ConfirmDelete { .. })));
        press(&mut app, KeyCode::Enter);
        assert!(app.state().is_empty());
        assert!(NoteStore::load(storage).is_empty());
    }

    #[test]
    fn blank_add_keeps_form_open_and_edit_updates_text() {
        let (mut app, _, _) = build(MemoryNotifier::granted());

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.state().overlay(), Some(Overlay::AddNote(_))));
        press(&mut app, KeyCode::Esc);
        assert!(app.state().is_empty());

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "draft");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "ted");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().rows()[0].text, "drafted");
    }

    #[test]
    fn denied_notifications_show_blocking_alert() {
        let (mut app, storage, _) = build(MemoryNotifier::new(
            Permission::Default,
            PermissionOutcome::Denied,
        ));

        press(&mut app, KeyCode::Char('n'));
        assert!(matches!(app.state().overlay(), Some(Overlay::Alert(_))));

        // Other keys are swallowed until the alert is dismissed.
        press(&mut app, KeyCode::Char('a'));
        assert!(matches!(app.state().overlay(), Some(Overlay::Alert(_))));
        press(&mut app, KeyCode::Enter);
        assert!(app.state().overlay().is_none());
        assert!(!NotificationPrefs::new(storage).is_enabled());
    }

    #[test]
    fn enabled_notifications_announce_new_notes() {
        let (mut app, storage, notifier) = build(MemoryNotifier::granted());

        press(&mut app, KeyCode::Char('n'));
        assert!(app.state().notifications_enabled);
        assert_eq!(
            NotificationPrefs::new(storage).get(),
            NotificationPreference::Enabled
        );

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "tea");
        press(&mut app, KeyCode::Enter);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].options.body, "New note: tea");
    }

    #[test]
    fn accepting_install_writes_config_and_hides_offer() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::from_paths(ConfigPaths::under(temp.path()));
        let config_file = loader.paths().config_file.clone();
        let (app, _, _) = build(MemoryNotifier::granted());
        let mut app = app.with_install_offer(loader);
        assert!(app.state().install_available);

        press(&mut app, KeyCode::Char('i'));
        assert!(matches!(app.state().overlay(), Some(Overlay::ConfirmInstall)));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.state().install_available);
        assert!(!config_file.exists());

        press(&mut app, KeyCode::Char('i'));
        press(&mut app, KeyCode::Char('y'));
        assert!(!app.state().install_available);
        assert!(config_file.exists());
        Ok(())
    }
}
