use unicode_segmentation::UnicodeSegmentation;

use crate::storage::KeyValueStore;
use crate::store::{FilterMode, Note, NoteCounts, NoteId, NoteStore};

const MAX_INPUT_CHARS: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    buffer: String,
    cursor: usize,
}

impl TextInput {
    pub fn new(initial: &str) -> Self {
        Self {
            buffer: initial.to_string(),
            cursor: initial.len(),
        }
    }

    pub fn value(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn before_cursor(&self) -> &str {
        &self.buffer[..self.cursor]
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.buffer.chars().count() >= MAX_INPUT_CHARS {
            return false;
        }
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(self.cursor..next);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        self.cursor = next_grapheme_boundary(&self.buffer, self.cursor);
        true
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|g| cursor + g.len())
        .unwrap_or(text.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    AddNote(TextInput),
    EditNote { note_id: NoteId, input: TextInput },
    ConfirmDelete { note_id: NoteId, text: String },
    ConfirmInstall,
    Alert(String),
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub filter: FilterMode,
    pub selected: usize,
    pub online: bool,
    pub install_available: bool,
    pub notifications_enabled: bool,
    rows: Vec<Note>,
    counts: NoteCounts,
    overlay: Option<Overlay>,
    status: Option<String>,
}

impl ViewState {
    pub fn new(filter: FilterMode) -> Self {
        Self {
            filter,
            selected: 0,
            online: true,
            install_available: false,
            notifications_enabled: false,
            rows: Vec::new(),
            counts: NoteCounts::default(),
            overlay: None,
            status: None,
        }
    }

    pub fn refresh<S: KeyValueStore>(&mut self, store: &NoteStore<S>) {
        self.rows = store.filtered(self.filter).into_iter().cloned().collect();
        self.counts = store.counts();
        self.clamp_selection();
    }

    pub fn rows(&self) -> &[Note] {
        &self.rows
    }

    pub fn counts(&self) -> NoteCounts {
        self.counts
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn selected(&self) -> Option<&Note> {
        self.rows.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.rows.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    pub fn select_note_by_id(&mut self, note_id: NoteId) {
        if let Some(idx) = self.rows.iter().position(|note| note.id == note_id) {
            self.selected = idx;
        }
    }

    pub fn set_filter<S: KeyValueStore>(&mut self, filter: FilterMode, store: &NoteStore<S>) {
        let keep = self.selected().map(|note| note.id);
        self.filter = filter;
        self.selected = 0;
        self.refresh(store);
        if let Some(id) = keep {
            self.select_note_by_id(id);
        }
    }

    pub fn cycle_filter<S: KeyValueStore>(&mut self, store: &NoteStore<S>) {
        let next = match self.filter {
            FilterMode::All => FilterMode::Active,
            FilterMode::Active => FilterMode::Completed,
            FilterMode::Completed => FilterMode::All,
        };
        self.set_filter(next, store);
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn open_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    pub fn close_overlay(&mut self) -> Option<Overlay> {
        self.overlay.take()
    }

    pub fn input_mut(&mut self) -> Option<&mut TextInput> {
        match self.overlay.as_mut()? {
            Overlay::AddNote(input) | Overlay::EditNote { input, .. } => Some(input),
            _ => None,
        }
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status_message<T: Into<String>>(&mut self, message: Option<T>) {
        self.status = message.map(Into::into);
    }

    fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}
