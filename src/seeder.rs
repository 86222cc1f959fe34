//! Placeholder mcq questions for demo and test banks.
//!
//! Seeding tops each lesson up to its share of `total` and never goes past it,
//! so running it again with the same total inserts nothing.

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{AnswerKey, BankAction, Question, QuestionType};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::QuestionFilter;
use crate::util::{fill_template, parse_id};

const SEED_CONTENT_TEMPLATE: &str = "[Seed - {lesson}] Câu {n}";
/// Codes never repeat: soft-deleted questions still hold theirs.
const SEED_CODE_TEMPLATE: &str = "SEED-{lesson}-{stamp}-{suffix}";

/// Split `total` across `lessons` slots: integer share each, and the first
/// `total % lessons` slots get one extra.
pub fn distribute(total: usize, lessons: usize) -> Vec<usize> {
  if lessons == 0 {
    return Vec::new();
  }
  let (base, extra) = (total / lessons, total % lessons);
  (0..lessons).map(|i| base + usize::from(i < extra)).collect()
}

#[instrument(level = "info", skip(state, lesson_ids), fields(%bank_id, lessons = lesson_ids.len()))]
pub async fn seed_for_bank(
  state: &AppState,
  bank_id: &str,
  lesson_ids: &[String],
  total: usize,
  created_by: Uuid,
) -> AppResult<usize> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  if lesson_ids.is_empty() {
    return Err(AppError::InvalidArgument("lessonIds must not be empty".into()));
  }
  let seed = &state.config.seed;
  let stamp = Utc::now().timestamp_millis().to_string();

  let mut docs = Vec::new();
  for (lesson, target) in lesson_ids.iter().zip(distribute(total, lesson_ids.len())) {
    let one = std::slice::from_ref(lesson);
    let filter = QuestionFilter { node_ids: Some(one), kind: Some(QuestionType::Mcq), ..QuestionFilter::bank(bank.id) };
    let existing = state.store.count_questions(&filter).await;
    let missing = target.saturating_sub(existing);
    debug!(target: "seed", %lesson, want = target, existing, missing, "Lesson top-up");

    for i in 0..missing {
      let n = (existing + i + 1).to_string();
      let suffix = format!("{:08x}", rand::thread_rng().gen::<u32>());
      let vars = [("lesson", lesson.as_str()), ("n", n.as_str()), ("stamp", stamp.as_str()), ("suffix", suffix.as_str())];
      docs.push(Question {
        id: Uuid::new_v4(),
        bank: bank.id,
        code: fill_template(SEED_CODE_TEMPLATE, &vars),
        question_type: QuestionType::Mcq,
        content: fill_template(SEED_CONTENT_TEMPLATE, &vars),
        choices: seed.choices.clone(),
        answer: AnswerKey::Mcq { correct: seed.correct_index },
        explanation: String::new(),
        structure_node_id: Some(lesson.clone()),
        created_by: Some(created_by),
        is_deleted: false,
        created_at: Utc::now(),
      });
    }
  }

  if docs.is_empty() {
    info!(target: "seed", bank = %bank.id, "All lessons already at target");
    return Ok(0);
  }
  let inserted = state.store.insert_questions(docs).await;
  state.store.bump_question_count(bank.id, inserted).await;
  state
    .store
    .log_activity(bank.id, created_by, BankAction::QuestionImported, json!({ "imported": inserted, "seed": true }))
    .await;
  info!(target: "seed", bank = %bank.id, inserted, "Seed questions inserted");
  Ok(inserted)
}
