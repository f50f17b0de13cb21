use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::Note;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    pub fn label(self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::Active => "Active",
            FilterMode::Completed => "Completed",
        }
    }

    pub fn matches(self, note: &Note) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !note.completed,
            FilterMode::Completed => note.completed,
        }
    }
}

pub fn filter(notes: &[Note], mode: FilterMode) -> Vec<&Note> {
    notes.iter().filter(|note| mode.matches(note)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

impl NoteCounts {
    pub fn of(notes: &[Note]) -> Self {
        let completed = notes.iter().filter(|note| note.completed).count();
        Self {
            all: notes.len(),
            active: notes.len() - completed,
            completed,
        }
    }

    pub fn for_mode(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::All => self.all,
            FilterMode::Active => self.active,
            FilterMode::Completed => self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn note(id: i64, completed: bool) -> Note {
        Note {
            id,
            text: format!("note {id}"),
            date: "2026-01-01 09:00:00".into(),
            completed,
        }
    }

    #[test]
    fn active_and_completed_partition_the_list() {
        let notes = vec![note(5, false), note(4, true), note(3, true), note(2, false)];

        let active = filter(&notes, FilterMode::Active);
        let completed = filter(&notes, FilterMode::Completed);

        assert_eq!(active.len() + completed.len(), notes.len());
        for n in &notes {
            let in_active = active.iter().any(|a| a.id == n.id);
            let in_completed = completed.iter().any(|c| c.id == n.id);
            assert!(in_active ^ in_completed, "note {} must be in exactly one", n.id);
        }
    }

    #[test]
    fn all_passes_through_in_order() {
        let notes = vec![note(3, true), note(2, false), note(1, true)];
        let ids: Vec<_> = filter(&notes, FilterMode::All).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(FilterMode::from_str("Active").ok(), Some(FilterMode::Active));
        assert_eq!(FilterMode::from_str("COMPLETED").ok(), Some(FilterMode::Completed));
        assert!(FilterMode::from_str("done").is_err());
        let names: Vec<_> = FilterMode::iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["all", "active", "completed"]);
    }

    #[test]
    fn counts_track_each_mode() {
        let notes = vec![note(3, true), note(2, false), note(1, false)];
        let counts = NoteCounts::of(&notes);
        assert_eq!(counts.for_mode(FilterMode::All), 3);
        assert_eq!(counts.for_mode(FilterMode::Active), 2);
        assert_eq!(counts.for_mode(FilterMode::Completed), 1);
    }
}
