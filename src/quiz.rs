//! Quiz generation: validate a lesson selection against the bank structure,
//! pull the eligible mcq pool, sample it, and persist the snapshot.

use std::collections::HashSet;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{NodeType, Question, QuestionType, Quiz};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::QuestionFilter;
use crate::util::{non_blank, parse_id};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuiz {
  pub bank_id: String,
  #[serde(default)]
  pub lesson_ids: Vec<String>,
  #[serde(default)]
  pub num_questions: Option<i64>,
  #[serde(default)]
  pub shuffle: Option<bool>,
  #[serde(default)]
  pub title: Option<String>,
}

/// Number of questions a quiz gets: at least one, at most the pool.
pub fn quiz_size(requested: i64, pool: usize) -> usize {
  usize::try_from(requested.max(1)).unwrap_or(usize::MAX).min(pool)
}

/// Take `quiz_size(requested, pool.len())` ids. With `shuffle` the pool gets a
/// Fisher-Yates pass first, so every ordered k-subset is equally likely;
/// without it the first k in pool order are taken.
pub fn sample_ids<R: Rng + ?Sized>(mut pool: Vec<Uuid>, requested: i64, shuffle: bool, rng: &mut R) -> Vec<Uuid> {
  let k = quiz_size(requested, pool.len());
  if shuffle {
    pool.shuffle(rng);
  }
  pool.truncate(k);
  pool
}

/// First-occurrence order, blanks dropped.
fn dedup_lessons(ids: Vec<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  ids.into_iter().filter(|id| !id.trim().is_empty() && seen.insert(id.clone())).collect()
}

#[instrument(level = "info", skip(state, req), fields(bank_id = %req.bank_id, lessons = req.lesson_ids.len()))]
pub async fn generate(state: &AppState, actor: Uuid, req: GenerateQuiz) -> AppResult<Quiz> {
  // validate
  let bank_id = parse_id("bank", &req.bank_id)?;
  let lesson_ids = dedup_lessons(req.lesson_ids);
  if lesson_ids.is_empty() {
    return Err(AppError::InvalidArgument("lessonIds must not be empty".into()));
  }
  let bank = state.store.bank(bank_id).await?;
  let known: HashSet<&str> = bank
    .structure_nodes
    .iter()
    .filter(|n| n.node_type == NodeType::Lesson)
    .map(|n| n.id.as_str())
    .collect();
  if known.is_empty() {
    return Err(AppError::BankNoStructure);
  }
  let unknown: Vec<String> = lesson_ids.iter().filter(|id| !known.contains(id.as_str())).cloned().collect();
  if !unknown.is_empty() {
    warn!(target: "quiz", %bank_id, ?unknown, "Lessons not in bank structure");
    return Err(AppError::LessonNotInStructure(unknown));
  }

  // collect pool
  let filter = QuestionFilter { node_ids: Some(lesson_ids.as_slice()), kind: Some(QuestionType::Mcq), ..QuestionFilter::bank(bank_id) };
  let pool: Vec<Uuid> = state.store.find_questions(&filter).await.into_iter().map(|q| q.id).collect();
  if pool.is_empty() {
    return Err(AppError::NoQuestions);
  }
  let pool_size = pool.len();

  // sample
  let requested = req.num_questions.unwrap_or(state.config.quiz.default_num_questions);
  let shuffle = req.shuffle.unwrap_or(true);
  let question_ids = sample_ids(pool, requested, shuffle, &mut rand::thread_rng());

  // persist
  let title = req
    .title
    .as_deref()
    .and_then(non_blank)
    .map(String::from)
    .unwrap_or_else(|| format!("Quiz ({} bài)", lesson_ids.len()));
  let quiz = Quiz {
    id: Uuid::new_v4(),
    bank: bank_id,
    title,
    lesson_ids,
    num_questions: question_ids.len(),
    shuffle,
    question_ids,
    created_by: actor,
    created_at: Utc::now(),
  };
  state.store.insert_quiz(quiz.clone()).await;
  info!(target: "quiz", id = %quiz.id, %bank_id, pool_size, picked = quiz.num_questions, shuffle, "Quiz generated");
  Ok(quiz)
}

/// Quiz plus its questions in quiz order. Questions removed since generation are skipped.
pub async fn get_quiz(state: &AppState, quiz_id: &str) -> AppResult<(Quiz, Vec<Question>)> {
  let quiz = state.store.quiz(parse_id("quiz", quiz_id)?).await?;
  let snapshot = state.store.question_snapshot(&quiz.question_ids).await;
  let questions = quiz
    .question_ids
    .iter()
    .filter_map(|id| snapshot.get(id))
    .filter(|q| !q.is_deleted)
    .cloned()
    .collect();
  Ok((quiz, questions))
}
