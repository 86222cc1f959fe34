//! Attempts: one user's pass through a quiz, `in_progress -> submitted`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Attempt, AttemptAnswer, AttemptStatus, Question};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::util::parse_id;

/// One submitted answer as sent by the client. Both fields are kept loose
/// so malformed entries can be dropped instead of failing the whole submit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
  #[serde(default)]
  pub question_id: Value,
  #[serde(default)]
  pub selected_index: Value,
}

impl AnswerInput {
  /// Entries that are not JSON objects come out empty and are dropped by `grade`.
  pub fn from_raw(raw: Value) -> Self {
    serde_json::from_value(raw).unwrap_or_default()
  }

  fn question_id(&self) -> Option<Uuid> {
    self.question_id.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok())
  }

  /// Integers only, but `1.0` counts: JSON does not tell the two apart.
  fn selected_index(&self) -> Option<i64> {
    let n = &self.selected_index;
    n.as_i64().or_else(|| {
      n.as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
    })
  }
}

/// Keep answers for questions in the quiz with an integer index (first one
/// per question wins) and mark each against the stored mcq key.
pub fn grade(quiz_questions: &[Uuid], keys: &HashMap<Uuid, Question>, answers: Vec<AnswerInput>) -> (Vec<AttemptAnswer>, usize) {
  let in_quiz: HashSet<&Uuid> = quiz_questions.iter().collect();
  let mut seen = HashSet::new();
  let mut graded = Vec::new();
  let mut score = 0;

  for a in answers {
    let Some(question_id) = a.question_id() else { continue };
    let Some(selected_index) = a.selected_index() else { continue };
    if !in_quiz.contains(&question_id) || !seen.insert(question_id) {
      continue;
    }
    let correct = keys.get(&question_id).and_then(|q| q.answer.correct_index());
    let is_correct = correct.is_some_and(|c| i64::try_from(c).ok() == Some(selected_index));
    if is_correct {
      score += 1;
    }
    graded.push(AttemptAnswer { question_id, selected_index, is_correct });
  }
  (graded, score)
}

/// Reuse the caller's open attempt on this quiz, or open a new one.
/// Returns the attempt and whether it was reused.
#[instrument(level = "info", skip(state), fields(%quiz_id, %user))]
pub async fn start(state: &AppState, quiz_id: &str, user: Uuid) -> AppResult<(Attempt, bool)> {
  let quiz = state.store.quiz(parse_id("quiz", quiz_id)?).await?;
  let (attempt, reused) = state.store.start_attempt(quiz.id, user, quiz.question_ids.len()).await;
  info!(target: "attempt", id = %attempt.id, quiz = %quiz.id, reused, "Attempt started");
  Ok((attempt, reused))
}

#[instrument(level = "info", skip(state, answers), fields(%attempt_id, %user, answers = answers.len()))]
pub async fn submit(state: &AppState, attempt_id: &str, user: Uuid, answers: Vec<AnswerInput>) -> AppResult<Attempt> {
  let id = parse_id("attempt", attempt_id)?;
  let attempt = state.store.attempt(id).await?;
  if attempt.user != user {
    warn!(target: "attempt", %id, %user, "Submit by non-owner");
    return Err(AppError::Forbidden("attempt belongs to another user".into()));
  }
  if attempt.status == AttemptStatus::Submitted {
    return Err(AppError::AlreadySubmitted);
  }

  // Quizzes are never removed, so a dangling reference is a store fault.
  let quiz = state
    .store
    .quiz(attempt.quiz)
    .await
    .map_err(|_| AppError::Storage(format!("attempt {id} references missing quiz {}", attempt.quiz)))?;
  let keys = state.store.question_snapshot(&quiz.question_ids).await;
  let (graded, score) = grade(&quiz.question_ids, &keys, answers);
  let total = quiz.question_ids.len();

  // The status is checked again under the store lock; a racing submit loses.
  let saved = state
    .store
    .finalize_attempt(id, |a| {
      a.answers = graded;
      a.score = score;
      a.total = total;
      a.status = AttemptStatus::Submitted;
      a.submitted_at = Some(Utc::now());
      Ok(())
    })
    .await?;
  info!(target: "attempt", %id, score, total, "Attempt submitted");
  Ok(saved)
}

pub async fn get_by_id(state: &AppState, attempt_id: &str, user: Uuid) -> AppResult<Attempt> {
  let attempt = state.store.attempt(parse_id("attempt", attempt_id)?).await?;
  if attempt.user != user {
    return Err(AppError::Forbidden("attempt belongs to another user".into()));
  }
  Ok(attempt)
}
