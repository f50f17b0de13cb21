pub mod app;
pub mod cli;
pub mod config;
pub mod notify;
pub mod platform;
pub mod reminder;
pub mod storage;
pub mod store;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use store::{FilterMode, Note, NoteId, NoteStore};
