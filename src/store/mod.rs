use std::collections::HashSet;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

use crate::storage::{KeyValueStore, NOTES_KEY};

mod filter;

pub use filter::{filter, FilterMode, NoteCounts};

pub type NoteId = i64;

pub type Clock = fn() -> OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub text: String,
    pub date: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(Note),
    Updated(Note),
    Toggled(Note),
    Deleted(NoteId),
}

pub struct NoteStore<S> {
    storage: S,
    notes: Vec<Note>,
    clock: Clock,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl<S: KeyValueStore> NoteStore<S> {
    pub fn load(storage: S) -> Self {
        Self::load_with_clock(storage, local_now)
    }

    pub fn load_with_clock(storage: S, clock: Clock) -> Self {
        let notes = read_persisted(&storage);
        tracing::debug!(count = notes.len(), "loaded notes");
        Self {
            storage,
            notes,
            clock,
            subscribers: Vec::new(),
        }
    }

    pub fn reload(&mut self) {
        self.notes = read_persisted(&self.storage);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.notes.iter().filter(|note| !note.completed).count()
    }

    pub fn counts(&self) -> NoteCounts {
        NoteCounts::of(&self.notes)
    }

    pub fn filtered(&self, mode: FilterMode) -> Vec<&Note> {
        filter(&self.notes, mode)
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Prepends a new note. Returns `None` without touching anything when the
    /// trimmed text is empty.
    pub fn add(&mut self, text: &str) -> Option<NoteId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let now = (self.clock)();
        let Some(id) = self.next_id(now) else {
            tracing::error!("note id space exhausted, note not added");
            return None;
        };
        let note = Note {
            id,
            text: text.to_string(),
            date: format_date(now),
            completed: false,
        };
        self.notes.insert(0, note.clone());
        self.persist();
        self.publish(StoreEvent::Added(note));
        Some(id)
    }

    pub fn delete(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        if self.notes.len() == before {
            return false;
        }
        self.persist();
        self.publish(StoreEvent::Deleted(id));
        true
    }

    pub fn update(&mut self, id: NoteId, new_text: &str) -> bool {
        let text = new_text.trim();
        if text.is_empty() {
            return false;
        }
        let Some(note) = self.notes.iter_mut().find(|note| note.id == id) else {
            return false;
        };
        if note.text == text {
            return false;
        }
        note.text = text.to_string();
        let updated = note.clone();
        self.persist();
        self.publish(StoreEvent::Updated(updated));
        true
    }

    pub fn toggle_completed(&mut self, id: NoteId) -> Option<bool> {
        let note = self.notes.iter_mut().find(|note| note.id == id)?;
        note.completed = !note.completed;
        let toggled = note.clone();
        self.persist();
        self.publish(StoreEvent::Toggled(toggled.clone()));
        Some(toggled.completed)
    }

    /// `None` once no id greater than every existing one fits in a `NoteId`.
    fn next_id(&self, now: OffsetDateTime) -> Option<NoteId> {
        let millis = NoteId::try_from(now.unix_timestamp_nanos() / 1_000_000).ok();
        match (millis, self.notes.iter().map(|note| note.id).max()) {
            (Some(millis), Some(max)) if millis > max => Some(millis),
            (_, Some(max)) => max.checked_add(1),
            (millis, None) => millis,
        }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.notes) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, "failed to serialize notes");
                return;
            }
        };
        if let Err(err) = self.storage.set(NOTES_KEY, &json) {
            tracing::error!(?err, "failed to persist notes");
        }
    }

    fn publish(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn read_persisted<S: KeyValueStore>(storage: &S) -> Vec<Note> {
    let raw = match storage.get(NOTES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            tracing::error!(?err, "failed to read notes");
            return Vec::new();
        }
    };
    let notes: Vec<Note> = match serde_json::from_str(&raw) {
        Ok(notes) => notes,
        Err(err) => {
            tracing::error!(?err, "failed to parse stored notes, starting empty");
            return Vec::new();
        }
    };
    let mut seen = HashSet::with_capacity(notes.len());
    let before = notes.len();
    let notes: Vec<Note> = notes
        .into_iter()
        .filter(|note| seen.insert(note.id))
        .collect();
    if notes.len() != before {
        tracing::warn!(
            dropped = before - notes.len(),
            "stored notes contained duplicate ids"
        );
    }
    notes
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn format_date(dt: OffsetDateTime) -> String {
    dt.format(&format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}
