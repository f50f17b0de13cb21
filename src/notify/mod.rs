use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use strum::{Display, EnumString};

use crate::config::NotificationConfig;
use crate::storage::{KeyValueStore, NOTIFICATIONS_KEY};
use crate::store::StoreEvent;

mod terminal;

pub use terminal::TerminalNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

pub struct PermissionRequest {
    rx: Receiver<PermissionOutcome>,
}

pub struct PermissionResponder {
    tx: Sender<PermissionOutcome>,
}

impl PermissionRequest {
    pub fn pending() -> (PermissionResponder, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (PermissionResponder { tx }, Self { rx })
    }

    pub fn resolved(outcome: PermissionOutcome) -> Self {
        let (responder, request) = Self::pending();
        responder.resolve(outcome);
        request
    }

    /// Blocks until decided. A responder dropped without deciding counts as
    /// a denial.
    pub fn wait(self) -> PermissionOutcome {
        self.rx.recv().unwrap_or(PermissionOutcome::Denied)
    }

    pub fn try_outcome(&self) -> Option<PermissionOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(PermissionOutcome::Denied),
        }
    }
}

impl PermissionResponder {
    pub fn resolve(self, outcome: PermissionOutcome) {
        let _ = self.tx.send(outcome);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

pub trait Notifier: Send + Sync {
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> PermissionRequest;
    fn notify(&self, title: &str, options: &NotificationOptions);
}

pub struct MemoryNotifier {
    permission: Mutex<Permission>,
    answer: PermissionOutcome,
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new(permission: Permission, answer: PermissionOutcome) -> Self {
        Self {
            permission: Mutex::new(permission),
            answer,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted, PermissionOutcome::Granted)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    fn request_permission(&self) -> PermissionRequest {
        *self.permission.lock() = match self.answer {
            PermissionOutcome::Granted => Permission::Granted,
            PermissionOutcome::Denied => Permission::Denied,
        };
        PermissionRequest::resolved(self.answer)
    }

    fn notify(&self, title: &str, options: &NotificationOptions) {
        self.sent.lock().push(Notification {
            title: title.to_string(),
            options: options.clone(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationPreference {
    Enabled,
    Disabled,
}

#[derive(Clone)]
pub struct NotificationPrefs<S> {
    storage: S,
}

impl<S: KeyValueStore> NotificationPrefs<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn get(&self) -> NotificationPreference {
        match self.storage.get(NOTIFICATIONS_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unrecognised notification preference");
                NotificationPreference::Disabled
            }),
            Ok(None) => NotificationPreference::Disabled,
            Err(err) => {
                tracing::error!(?err, "failed to read notification preference");
                NotificationPreference::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.get() == NotificationPreference::Enabled
    }

    pub fn set(&self, preference: NotificationPreference) {
        if let Err(err) = self
            .storage
            .set(NOTIFICATIONS_KEY, &preference.to_string())
        {
            tracing::error!(?err, %preference, "failed to persist notification preference");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
}

impl Alert {
    fn permission_denied() -> Self {
        Self {
            message: "Notifications are blocked. Allow them for this terminal to get reminders."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    Enabled,
    Blocked(Alert),
}

pub fn enable<S: KeyValueStore>(
    prefs: &NotificationPrefs<S>,
    notifier: &dyn Notifier,
) -> EnableOutcome {
    let outcome = match notifier.permission() {
        Permission::Granted => PermissionOutcome::Granted,
        Permission::Denied => PermissionOutcome::Denied,
        Permission::Default => notifier.request_permission().wait(),
    };
    match outcome {
        PermissionOutcome::Granted => {
            prefs.set(NotificationPreference::Enabled);
            tracing::info!("notifications enabled");
            EnableOutcome::Enabled
        }
        PermissionOutcome::Denied => {
            tracing::info!("notification permission denied");
            EnableOutcome::Blocked(Alert::permission_denied())
        }
    }
}

pub fn disable<S: KeyValueStore>(prefs: &NotificationPrefs<S>) {
    prefs.set(NotificationPreference::Disabled);
}

pub struct NoteAlerts<S> {
    prefs: NotificationPrefs<S>,
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl<S: KeyValueStore> NoteAlerts<S> {
    pub fn new(
        prefs: NotificationPrefs<S>,
        notifier: Arc<dyn Notifier>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            prefs,
            notifier,
            config,
        }
    }

    pub fn prefs(&self) -> &NotificationPrefs<S> {
        &self.prefs
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn can_notify(&self) -> bool {
        self.notifier.permission() == Permission::Granted && self.prefs.is_enabled()
    }

    pub fn handle(&self, event: &StoreEvent) -> bool {
        let StoreEvent::Added(note) = event else {
            return false;
        };
        if !self.can_notify() {
            return false;
        }
        self.emit(format!("New note: {}", note.text));
        true
    }

    pub fn pump(&self, events: &Receiver<StoreEvent>) -> usize {
        events
            .try_iter()
            .filter(|event| self.handle(event))
            .count()
    }

    pub fn remind(&self, unfinished: usize) -> bool {
        if unfinished == 0 || !self.can_notify() {
            return false;
        }
        let plural = if unfinished == 1 { "" } else { "s" };
        self.emit(format!("You have {unfinished} unfinished note{plural}"));
        true
    }

    fn emit(&self, body: String) {
        let options = NotificationOptions {
            body,
            icon: self.config.icon.clone(),
        };
        self.notifier.notify(&self.config.title, &options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::store::NoteStore;
    use assert_matches::assert_matches;

    fn alerts(
        notifier: Arc<MemoryNotifier>,
        storage: MemoryStore,
    ) -> NoteAlerts<MemoryStore> {
        NoteAlerts::new(
            NotificationPrefs::new(storage),
            notifier,
            NotificationConfig::default(),
        )
    }

    #[test]
    fn preference_defaults_to_disabled_and_round_trips() -> anyhow::Result<()> {
        let storage = MemoryStore::new();
        let prefs = NotificationPrefs::new(storage.clone());
        assert_eq!(prefs.get(), NotificationPreference::Disabled);

        prefs.set(NotificationPreference::Enabled);
        assert_eq!(storage.get(NOTIFICATIONS_KEY)?.as_deref(), Some("enabled"));
        assert!(prefs.is_enabled());

        storage.set(NOTIFICATIONS_KEY, "maybe")?;
        assert_eq!(prefs.get(), NotificationPreference::Disabled);
        Ok(())
    }

    #[test]
    fn enable_requests_permission_and_persists_on_grant() {
        let prefs = NotificationPrefs::new(MemoryStore::new());
        let notifier = MemoryNotifier::new(Permission::Default, PermissionOutcome::Granted);

        assert_eq!(enable(&prefs, &notifier), EnableOutcome::Enabled);
        assert_eq!(notifier.permission(), Permission::Granted);
        assert!(prefs.is_enabled());

        disable(&prefs);
        assert!(!prefs.is_enabled());
    }

    #[test]
    fn enable_denied_returns_alert_and_stays_off() {
        let prefs = NotificationPrefs::new(MemoryStore::new());
        let notifier = MemoryNotifier::new(Permission::Default, PermissionOutcome::Denied);

        assert_matches!(enable(&prefs, &notifier), EnableOutcome::Blocked(alert) if alert.message.contains("blocked"));
        assert!(!prefs.is_enabled());

        // Already denied: no second prompt, same answer.
        assert_matches!(enable(&prefs, &notifier), EnableOutcome::Blocked(_));
    }

    #[test]
    fn pending_request_resolves_once_answered() {
        let (responder, request) = PermissionRequest::pending();
        assert_eq!(request.try_outcome(), None);
        responder.resolve(PermissionOutcome::Granted);
        assert_eq!(request.wait(), PermissionOutcome::Granted);

        let (responder, request) = PermissionRequest::pending();
        drop(responder);
        assert_eq!(request.try_outcome(), Some(PermissionOutcome::Denied));
    }

    #[test]
    fn new_note_notifies_only_when_enabled_and_permitted() {
        let storage = MemoryStore::new();
        let notifier = Arc::new(MemoryNotifier::granted());
        let alerts = alerts(notifier.clone(), storage.clone());
        let mut store = NoteStore::load(storage);
        let events = store.subscribe();

        store.add("quiet");
        assert_eq!(alerts.pump(&events), 0);

        alerts.prefs().set(NotificationPreference::Enabled);
        let id = store.add("Buy milk").unwrap();
        store.toggle_completed(id);
        assert_eq!(alerts.pump(&events), 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Offline Notes");
        assert_eq!(sent[0].options.body, "New note: Buy milk");
        assert_eq!(sent[0].options.icon, "icons/note-192.png");
    }

    #[test]
    fn denied_permission_suppresses_notifications() {
        let storage = MemoryStore::new();
        let notifier = Arc::new(MemoryNotifier::new(
            Permission::Denied,
            PermissionOutcome::Denied,
        ));
        let alerts = alerts(notifier.clone(), storage);
        alerts.prefs().set(NotificationPreference::Enabled);

        assert!(!alerts.remind(3));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn reminder_skips_zero_and_pluralises() {
        let storage = MemoryStore::new();
        let notifier = Arc::new(MemoryNotifier::granted());
        let alerts = alerts(notifier.clone(), storage);
        alerts.prefs().set(NotificationPreference::Enabled);

        assert!(!alerts.remind(0));
        assert!(alerts.remind(1));
        assert!(alerts.remind(2));

        let bodies: Vec<_> = notifier.sent().into_iter().map(|n| n.options.body).collect();
        assert_eq!(
            bodies,
            vec!["You have 1 unfinished note", "You have 2 unfinished notes"]
        );
    }
}
