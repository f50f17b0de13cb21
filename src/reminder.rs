use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;

use crate::notify::NoteAlerts;
use crate::storage::KeyValueStore;
use crate::store::NoteStore;

pub struct ReminderJob<S> {
    store: Arc<Mutex<NoteStore<S>>>,
    alerts: Arc<NoteAlerts<S>>,
    reload: bool,
}

impl<S: KeyValueStore> ReminderJob<S> {
    pub fn new(store: Arc<Mutex<NoteStore<S>>>, alerts: Arc<NoteAlerts<S>>) -> Self {
        Self {
            store,
            alerts,
            reload: false,
        }
    }

    pub fn reloading(mut self) -> Self {
        self.reload = true;
        self
    }

    pub fn run_once(&self) -> Option<usize> {
        if !self.alerts.can_notify() {
            return None;
        }
        let unfinished = {
            let mut store = self.store.lock();
            if self.reload {
                store.reload();
            }
            store.active_count()
        };
        self.alerts.remind(unfinished).then_some(unfinished)
    }
}

pub struct ReminderTimer {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReminderTimer {
    pub fn spawn<S>(interval: Duration, job: ReminderJob<S>) -> Result<Self>
    where
        S: KeyValueStore + Send + Sync + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let ticker = crossbeam_channel::tick(interval);
        let handle = thread::Builder::new()
            .name("reminder".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Some(count) = job.run_once() {
                            tracing::debug!(count, "reminder sent");
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })
            .context("spawning reminder thread")?;
        tracing::debug!(interval_secs = interval.as_secs(), "reminder timer started");
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("reminder thread panicked");
            }
        }
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("reminder thread panicked");
            }
        }
    }
}

impl Drop for ReminderTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use crate::notify::{MemoryNotifier, NotificationPreference, NotificationPrefs};
    use crate::storage::MemoryStore;

    fn setup(
        enabled: bool,
    ) -> (
        Arc<Mutex<NoteStore<MemoryStore>>>,
        Arc<MemoryNotifier>,
        ReminderJob<MemoryStore>,
    ) {
        let storage = MemoryStore::new();
        let prefs = NotificationPrefs::new(storage.clone());
        if enabled {
            prefs.set(NotificationPreference::Enabled);
        }
        let notifier = Arc::new(MemoryNotifier::granted());
        let alerts = Arc::new(NoteAlerts::new(
            prefs,
            notifier.clone(),
            NotificationConfig::default(),
        ));
        let store = Arc::new(Mutex::new(NoteStore::load(storage)));
        let job = ReminderJob::new(store.clone(), alerts);
        (store, notifier, job)
    }

    #[test]
    fn reminds_only_about_unfinished_notes() {
        let (store, notifier, job) = setup(true);
        assert_eq!(job.run_once(), None);

        let done = {
            let mut store = store.lock();
            store.add("open one");
            store.add("open two");
            store.add("finished").unwrap()
        };
        store.lock().toggle_completed(done);

        assert_eq!(job.run_once(), Some(2));
        assert_eq!(notifier.sent()[0].options.body, "You have 2 unfinished notes");
    }

    #[test]
    fn stays_quiet_when_disabled() {
        let (store, notifier, job) = setup(false);
        store.lock().add("pending");
        assert_eq!(job.run_once(), None);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn reloading_job_sees_writes_from_elsewhere() {
        let (store, notifier, job) = setup(true);
        let job = job.reloading();
        let storage = store.lock().storage().clone();

        let mut other = NoteStore::load(storage);
        other.add("written by another process");
        assert_eq!(store.lock().len(), 0);

        assert_eq!(job.run_once(), Some(1));
        assert_eq!(notifier.sent()[0].options.body, "You have 1 unfinished note");
    }

    #[test]
    fn timer_fires_until_stopped() {
        let (store, notifier, job) = setup(true);
        store.lock().add("pending");

        let mut timer = ReminderTimer::spawn(Duration::from_millis(10), job).expect("timer");
        thread::sleep(Duration::from_millis(120));
        timer.stop();

        let fired = notifier.sent().len();
        assert!(fired >= 1, "expected at least one reminder, got {fired}");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(notifier.sent().len(), fired);
    }
}
