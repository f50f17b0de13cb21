use crate::storage::KeyValueStore;
use crate::store::{NoteId, NoteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add(String),
    Update { note_id: NoteId, text: String },
    ToggleCompleted(NoteId),
    Delete(NoteId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Added(NoteId),
    Rejected,
    Updated(NoteId),
    Unchanged(NoteId),
    Completed(NoteId),
    Reopened(NoteId),
    Deleted(NoteId),
    Missing(NoteId),
}

impl Outcome {
    pub fn message(&self) -> Option<String> {
        let message = match self {
            Outcome::Added(_) => "Note added".to_string(),
            Outcome::Rejected => return None,
            Outcome::Updated(_) => "Note updated".to_string(),
            Outcome::Unchanged(_) => "No changes".to_string(),
            Outcome::Completed(_) => "Marked as completed".to_string(),
            Outcome::Reopened(_) => "Marked as active".to_string(),
            Outcome::Deleted(_) => "Note deleted".to_string(),
            Outcome::Missing(id) => format!("Note #{id} not found"),
        };
        Some(message)
    }
}

pub struct ActionDispatcher<'a, S> {
    store: &'a mut NoteStore<S>,
}

impl<'a, S: KeyValueStore> ActionDispatcher<'a, S> {
    pub fn new(store: &'a mut NoteStore<S>) -> Self {
        Self { store }
    }

    pub fn dispatch(&mut self, intent: Intent) -> Outcome {
        match intent {
            Intent::Add(text) => self
                .store
                .add(&text)
                .map(Outcome::Added)
                .unwrap_or(Outcome::Rejected),
            Intent::Update { note_id, text } => {
                if self.store.get(note_id).is_none() {
                    Outcome::Missing(note_id)
                } else if self.store.update(note_id, &text) {
                    Outcome::Updated(note_id)
                } else {
                    Outcome::Unchanged(note_id)
                }
            }
            Intent::ToggleCompleted(note_id) => match self.store.toggle_completed(note_id) {
                Some(true) => Outcome::Completed(note_id),
                Some(false) => Outcome::Reopened(note_id),
                None => Outcome::Missing(note_id),
            },
            Intent::Delete(note_id) => {
                if self.store.delete(note_id) {
                    Outcome::Deleted(note_id)
                } else {
                    Outcome::Missing(note_id)
                }
            }
        }
    }
}
