//! Read-only view of the published book templates.

use serde::Serialize;

use crate::domain::BookTemplate;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
  pub book_id: String,
  pub title: String,
  pub grade: Option<u32>,
  pub subject: Option<String>,
  pub units: usize,
}

impl From<&BookTemplate> for BookSummary {
  fn from(b: &BookTemplate) -> Self {
    Self { book_id: b.book_id.clone(), title: b.title.clone(), grade: b.grade, subject: b.subject.clone(), units: b.units.len() }
  }
}

pub async fn list_books(state: &AppState) -> Vec<BookSummary> {
  state.store.published_books().await.iter().map(BookSummary::from).collect()
}

pub async fn get_book(state: &AppState, book_id: &str) -> AppResult<BookTemplate> {
  state.store.published_book(book_id.trim()).await
}
