//! Application state: the document store, loaded config, and compiled parser settings.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use regex::Regex;
use tracing::{info, instrument};

use crate::config::{load_config_from_env, AppConfig};
use crate::seeds::seed_books;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub config: AppConfig,
    /// Compiled `structure.heading_patterns`.
    pub headings: Vec<Regex>,
    code_seq: AtomicU64,
}

impl AppState {
    /// Build state from env: load config, then seed the library.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_config_from_env())
    }

    pub fn from_config(config: AppConfig) -> Self {
        // Built-in books first so config entries with the same id win.
        let mut books = seed_books();
        books.retain(|b| !config.books.iter().any(|c| c.book_id == b.book_id));
        books.extend(config.books.iter().cloned());
        info!(target: "quizbank", books = books.len(), "Library loaded");

        let headings = config.structure.compile();
        info!(target: "quizbank", patterns = headings.len(), "Structure heading patterns compiled");

        Self {
            store: Store::with_books(books),
            headings,
            config,
            code_seq: AtomicU64::new(0),
        }
    }

    /// Next generated question code, `QB-<millis>-<seq>`.
    pub fn next_question_code(&self) -> String {
        let seq = self.code_seq.fetch_add(1, Ordering::Relaxed);
        format!("QB-{}-{}", Utc::now().timestamp_millis(), seq)
    }
}
