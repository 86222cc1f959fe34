//! Loading service configuration (heading patterns, seeding, homework, extra
//! library books) from TOML.
//!
//! See `AppConfig` for the expected schema. Every section is optional.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::BookTemplate;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub structure: StructureCfg,
  #[serde(default)]
  pub quiz: QuizCfg,
  #[serde(default)]
  pub seed: SeedCfg,
  #[serde(default)]
  pub homework: HomeworkCfg,
  #[serde(default)]
  pub books: Vec<BookTemplate>,
}

/// Text-to-structure parser settings.
/// A line matching any of `heading_patterns` (case-insensitive) opens a new topic.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StructureCfg {
  pub heading_patterns: Vec<String>,
}

impl Default for StructureCfg {
  fn default() -> Self {
    Self { heading_patterns: vec![r"^(unit|chương|chapter|bài|lesson)\b".into()] }
  }
}

impl StructureCfg {
  /// Compile the heading patterns. Bad entries are logged and skipped.
  pub fn compile(&self) -> Vec<Regex> {
    self
      .heading_patterns
      .iter()
      .filter_map(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
          error!(target: "quizbank", pattern = %p, error = %e, "Skipping invalid heading pattern");
          None
        }
      })
      .collect()
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizCfg {
  pub default_num_questions: i64,
}

impl Default for QuizCfg {
  fn default() -> Self {
    Self { default_num_questions: 20 }
  }
}

/// Placeholder questions created by the seeder.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SeedCfg {
  pub choices: Vec<String>,
  pub correct_index: usize,
  /// Questions seeded across the lessons of a freshly applied library book.
  pub library_total: usize,
}

impl Default for SeedCfg {
  fn default() -> Self {
    Self { choices: ["A", "B", "C", "D"].map(String::from).to_vec(), correct_index: 0, library_total: 50 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HomeworkCfg {
  pub frontend_url: String,
  pub share_code_len: usize,
}

impl Default for HomeworkCfg {
  fn default() -> Self {
    Self { frontend_url: "http://localhost:5173".into(), share_code_len: 7 }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  let mut cfg: AppConfig = toml::from_str(s)?;
  if cfg.seed.choices.is_empty() {
    warn!(target: "quizbank", "seed.choices is empty; using A-D");
    cfg.seed.choices = SeedCfg::default().choices;
  }
  if cfg.seed.correct_index >= cfg.seed.choices.len() {
    warn!(target: "quizbank", correct_index = cfg.seed.correct_index, "seed.correct_index out of range; using 0");
    cfg.seed.correct_index = 0;
  }
  Ok(cfg)
}

/// Load `AppConfig` from QUIZBANK_CONFIG_PATH. Falls back to defaults on any IO/parse error.
pub fn load_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("QUIZBANK_CONFIG_PATH") else {
    info!(target: "quizbank", "QUIZBANK_CONFIG_PATH not set; using defaults");
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "quizbank", %path, books = cfg.books.len(), "Loaded config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "quizbank", %path, error = %e, "Failed to parse TOML config");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "quizbank", %path, error = %e, "Failed to read TOML config file");
      AppConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.quiz.default_num_questions, 20);
    assert_eq!(cfg.seed.choices, vec!["A", "B", "C", "D"]);
    assert_eq!(cfg.homework.share_code_len, 7);
    assert_eq!(cfg.seed.library_total, 50);
    assert_eq!(cfg.structure.compile().len(), 1);
  }

  #[test]
  fn partial_section_keeps_other_defaults() {
    let cfg = parse_config("[homework]\nfrontend_url = \"https://quiz.example\"\n").unwrap();
    assert_eq!(cfg.homework.frontend_url, "https://quiz.example");
    assert_eq!(cfg.homework.share_code_len, 7);
  }

  #[test]
  fn sections_and_books_parse() {
    let cfg = parse_config(
      r#"
[structure]
heading_patterns = ['^(unit|chương)\b', '^phần\s+\d+', '(']

[seed]
choices = ["A", "B"]
correct_index = 5

[[books]]
book_id = "eng10"
title = "English 10"
grade = 10

[[books.units]]
id = "u1"
title = "Unit 1"
lessons = [{ id = "u1_a", code = "A", title = "Vocabulary" }]
"#,
    )
    .unwrap();
    // the unbalanced "(" is dropped
    let res = cfg.structure.compile();
    assert_eq!(res.len(), 2);
    assert!(res[1].is_match("PHẦN 2"));
    assert_eq!(cfg.seed.correct_index, 0);
    assert_eq!(cfg.books[0].book_id, "eng10");
    assert!(cfg.books[0].is_published());
    assert_eq!(cfg.books[0].units[0].lessons[0].code, "A");
  }
}
