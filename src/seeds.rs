//! Built-in library content so the service is useful without any config file.

use crate::domain::{BookLesson, BookTemplate, BookUnit};

fn lesson(unit: &str, code: &str, title: &str) -> BookLesson {
  BookLesson { id: format!("{}_{}", unit, code.to_lowercase()), code: code.into(), title: title.into() }
}

/// Minimal published book catalogue. Config `[[books]]` entries with the same
/// `book_id` replace these.
pub fn seed_books() -> Vec<BookTemplate> {
  vec![BookTemplate {
    book_id: "tieng-anh-10-friends-global".into(),
    title: "Tiếng Anh 10 – Friends Global".into(),
    grade: Some(10),
    subject: Some("Tiếng Anh".into()),
    status: "published".into(),
    units: vec![
      BookUnit {
        id: "u1".into(),
        title: "Unit 1: Feelings".into(),
        lessons: vec![
          lesson("u1", "A", "Vocabulary"),
          lesson("u1", "B", "Grammar"),
          lesson("u1", "C", "Listening"),
          lesson("u1", "D", "Grammar"),
        ],
      },
      BookUnit {
        id: "u2".into(),
        title: "Unit 2: Adventure".into(),
        lessons: vec![
          lesson("u2", "A", "Vocabulary"),
          lesson("u2", "B", "Grammar"),
          lesson("u2", "C", "Listening"),
        ],
      },
    ],
  }]
}
