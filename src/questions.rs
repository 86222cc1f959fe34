//! Question CRUD and bulk import for a bank.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{AnswerKey, BankAction, Question, QuestionType};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::QuestionFilter;
use crate::util::{non_blank, parse_id};

const LIST_LIMIT: usize = 200;

/// Client payload for one question (create or import item).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
  #[serde(default)]
  pub code: Option<String>,
  #[serde(rename = "type", default)]
  pub question_type: QuestionType,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub choices: Vec<String>,
  pub answer: Option<AnswerKey>,
  #[serde(default)]
  pub explanation: String,
  #[serde(default)]
  pub structure_node_id: Option<String>,
}

/// Default key for a type when the client sent none.
fn default_answer(kind: QuestionType) -> AnswerKey {
  match kind {
    QuestionType::Mcq => AnswerKey::Mcq { correct: 0 },
    QuestionType::TrueFalse => AnswerKey::TrueFalse { correct: true },
    QuestionType::ShortAnswer => AnswerKey::ShortAnswer { accepted: Vec::new() },
    QuestionType::Essay => AnswerKey::Essay { rubric: String::new() },
  }
}

/// Turn a payload into a stored document, checking that the answer key matches the type.
fn build_question(state: &AppState, bank: Uuid, actor: Uuid, input: QuestionInput) -> AppResult<Question> {
  let content = non_blank(&input.content)
    .ok_or_else(|| AppError::InvalidArgument("question content is required".into()))?
    .to_string();
  let answer = input.answer.unwrap_or_else(|| default_answer(input.question_type));
  if !answer.fits(input.question_type) {
    return Err(AppError::Validation(format!("answer does not match question type {:?}", input.question_type)));
  }
  if let Some(correct) = answer.correct_index() {
    if correct >= input.choices.len() && !input.choices.is_empty() {
      return Err(AppError::Validation(format!("correct index {correct} out of range")));
    }
  }
  let code = input.code.as_deref().and_then(non_blank).map(String::from).unwrap_or_else(|| state.next_question_code());
  Ok(Question {
    id: Uuid::new_v4(),
    bank,
    code,
    question_type: input.question_type,
    content,
    choices: input.choices,
    answer,
    explanation: input.explanation,
    structure_node_id: input.structure_node_id,
    created_by: Some(actor),
    is_deleted: false,
    created_at: Utc::now(),
  })
}

#[instrument(level = "info", skip(state, input), fields(%bank_id))]
pub async fn create_question(state: &AppState, actor: Uuid, bank_id: &str, input: QuestionInput) -> AppResult<Question> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  let q = build_question(state, bank.id, actor, input)?;
  if state.store.insert_questions(vec![q.clone()]).await == 0 {
    return Err(AppError::Validation(format!("question code {} already exists", q.code)));
  }
  state.store.bump_question_count(bank.id, 1).await;
  state
    .store
    .log_activity(bank.id, actor, BankAction::QuestionCreated, json!({ "code": q.code, "type": q.question_type }))
    .await;
  Ok(q)
}

/// Unordered bulk insert: clashing codes are skipped, the rest land.
/// Returns the number inserted.
#[instrument(level = "info", skip(state, items), fields(%bank_id, items = items.len()))]
pub async fn import_questions(state: &AppState, actor: Uuid, bank_id: &str, items: Vec<QuestionInput>) -> AppResult<usize> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  if items.is_empty() {
    return Err(AppError::InvalidArgument("import list is empty".into()));
  }
  let docs = items
    .into_iter()
    .map(|item| build_question(state, bank.id, actor, item))
    .collect::<AppResult<Vec<_>>>()?;

  let imported = state.store.insert_questions(docs).await;
  state.store.bump_question_count(bank.id, imported).await;
  state
    .store
    .log_activity(bank.id, actor, BankAction::QuestionImported, json!({ "imported": imported }))
    .await;
  info!(target: "bank", bank = %bank.id, imported, "Questions imported");
  Ok(imported)
}

/// Newest first, capped, with an optional exact code filter.
pub async fn list_questions(state: &AppState, bank_id: &str, code: Option<&str>) -> AppResult<Vec<Question>> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  let filter = QuestionFilter { code: code.and_then(non_blank), ..QuestionFilter::bank(bank.id) };
  let mut items = state.store.find_questions(&filter).await;
  items.reverse();
  items.truncate(LIST_LIMIT);
  Ok(items)
}

pub async fn delete_question(state: &AppState, bank_id: &str, question_id: &str) -> AppResult<()> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  state.store.soft_delete_question(bank.id, parse_id("question", question_id)?).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bank::{create_bank, NewBank};
  use crate::config::AppConfig;
  use serde_json::json;

  async fn setup() -> (AppState, Uuid, String) {
    let st = AppState::from_config(AppConfig::default());
    let me = Uuid::new_v4();
    let bank = create_bank(&st, me, NewBank { name: "B".into(), ..Default::default() }).await.unwrap();
    (st, me, bank.id.to_string())
  }

  fn input(v: serde_json::Value) -> QuestionInput {
    serde_json::from_value(v).unwrap()
  }

  #[tokio::test]
  async fn create_validates_and_counts() {
    let (st, me, bank) = setup().await;
    let empty = create_question(&st, me, &bank, input(json!({ "content": " " }))).await;
    assert!(matches!(empty, Err(AppError::InvalidArgument(_))));
    let mismatched = create_question(&st, me, &bank, input(json!({ "content": "Q", "type": "essay", "answer": { "correct": 1 } }))).await;
    assert!(matches!(mismatched, Err(AppError::Validation(_))));

    let q = create_question(
      &st,
      me,
      &bank,
      input(json!({ "content": "2+2?", "choices": ["3", "4"], "answer": { "correct": 1 }, "structureNodeId": "l1" })),
    )
    .await
    .unwrap();
    assert!(q.code.starts_with("QB-"));
    assert_eq!(q.question_type, QuestionType::Mcq);
    assert_eq!(crate::bank::get_bank(&st, &bank).await.unwrap().question_count, 1);
  }

  #[tokio::test]
  async fn import_skips_clashing_codes() {
    let (st, me, bank) = setup().await;
    assert!(matches!(import_questions(&st, me, &bank, vec![]).await, Err(AppError::InvalidArgument(_))));
    let items = vec![
      input(json!({ "code": "C1", "content": "a" })),
      input(json!({ "code": "C1", "content": "b" })),
      input(json!({ "content": "c" })),
      input(json!({ "content": "d" })),
    ];
    assert_eq!(import_questions(&st, me, &bank, items).await.unwrap(), 3);
    assert_eq!(crate::bank::get_bank(&st, &bank).await.unwrap().question_count, 3);

    let listed = list_questions(&st, &bank, None).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[2].code, "C1");
    let by_code = list_questions(&st, &bank, Some("C1")).await.unwrap();
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code[0].content, "a");
  }

  #[tokio::test]
  async fn deleted_questions_drop_out_of_lists_and_analytics() {
    let (st, me, bank) = setup().await;
    let q = create_question(&st, me, &bank, input(json!({ "content": "x" }))).await.unwrap();
    delete_question(&st, &bank, &q.id.to_string()).await.unwrap();
    assert!(list_questions(&st, &bank, None).await.unwrap().is_empty());
    assert_eq!(crate::bank::analytics(&st, &bank).await.unwrap(), 0);
    // the cached counter is not decremented
    assert_eq!(crate::bank::get_bank(&st, &bank).await.unwrap().question_count, 1);
  }
}
