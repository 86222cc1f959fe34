//! Homework assignments: creator-owned CRUD plus public lookup by share code.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Attachment, Homework};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::util::{non_blank, parse_id};

const SHARE_CODE_TRIES: usize = 5;
const SHARE_CODE_FALLBACK_LEN: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHomework {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub class_ids: Vec<String>,
  /// Older clients send a single class.
  #[serde(default)]
  pub class_id: Option<String>,
  #[serde(default)]
  pub due_from: Option<DateTime<Utc>>,
  #[serde(default)]
  pub due_to: Option<DateTime<Utc>>,
  #[serde(default)]
  pub allow_view_result: bool,
  #[serde(default)]
  pub attachment: Option<Attachment>,
}

/// `null` clears a date; a missing key leaves it alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkPatch {
  pub title: Option<String>,
  pub description: Option<String>,
  pub class_ids: Option<Vec<String>>,
  #[serde(default, deserialize_with = "nullable")]
  pub due_from: Option<Option<DateTime<Utc>>>,
  #[serde(default, deserialize_with = "nullable")]
  pub due_to: Option<Option<DateTime<Utc>>>,
  pub allow_view_result: Option<bool>,
}

fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(d).map(Some)
}

/// Random URL-safe code of `len` characters.
pub fn make_share_code(len: usize) -> String {
  let mut bytes = vec![0u8; len.max(16)];
  rand::thread_rng().fill(&mut bytes[..]);
  URL_SAFE_NO_PAD.encode(&bytes).chars().take(len).collect()
}

/// Length of the code for try `n`: the configured length first, then a longer one.
fn share_code_len(configured: usize, n: usize) -> usize {
  let len = configured.max(4);
  if n < SHARE_CODE_TRIES {
    len
  } else {
    SHARE_CODE_FALLBACK_LEN.max(len + 1)
  }
}

fn check_window(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> AppResult<()> {
  match (from, to) {
    (Some(f), Some(t)) if f > t => Err(AppError::Validation("dueFrom must not be after dueTo".into())),
    _ => Ok(()),
  }
}

fn clean_class_ids(ids: Vec<String>) -> Vec<String> {
  ids.into_iter().filter_map(|c| non_blank(&c).map(String::from)).collect()
}

#[instrument(level = "info", skip(state, input), fields(%actor))]
pub async fn create_homework(state: &AppState, actor: Uuid, input: NewHomework) -> AppResult<Homework> {
  let title = non_blank(&input.title)
    .ok_or_else(|| AppError::InvalidArgument("homework title is required".into()))?
    .to_string();
  let mut class_ids = clean_class_ids(input.class_ids);
  if class_ids.is_empty() {
    class_ids.extend(input.class_id.as_deref().and_then(non_blank).map(String::from));
  }
  if class_ids.is_empty() {
    return Err(AppError::InvalidArgument("select at least one class".into()));
  }
  check_window(input.due_from, input.due_to)?;

  let cfg = &state.config.homework;
  let base = cfg.frontend_url.trim_end_matches('/');
  let now = Utc::now();
  let hw = Homework {
    id: Uuid::new_v4(),
    title,
    description: input.description,
    class_ids,
    due_from: input.due_from,
    due_to: input.due_to,
    allow_view_result: input.allow_view_result,
    share_code: String::new(),
    share_url: String::new(),
    attachments: input.attachment.into_iter().collect(),
    created_by: actor,
    created_at: now,
    updated_at: now,
  };
  let hw = state
    .store
    .insert_homework_with_code(hw, |hw, n| {
      hw.share_code = make_share_code(share_code_len(cfg.share_code_len, n));
      hw.share_url = format!("{base}/lam-bai/{}", hw.share_code);
    })
    .await;
  info!(target: "homework", id = %hw.id, code = %hw.share_code, "Homework created");
  Ok(hw)
}

pub async fn list_my_homeworks(state: &AppState, actor: Uuid) -> Vec<Homework> {
  state.store.homeworks_by(actor).await
}

/// Creator-only view; anyone else gets NotFound.
pub async fn get_homework(state: &AppState, actor: Uuid, id: &str) -> AppResult<Homework> {
  let hw = state.store.homework(parse_id("homework", id)?).await?;
  if hw.created_by != actor {
    return Err(AppError::NotFound("homework"));
  }
  Ok(hw)
}

pub async fn get_by_share_code(state: &AppState, code: &str) -> AppResult<Homework> {
  let code = non_blank(code).ok_or_else(|| AppError::InvalidArgument("share code is required".into()))?;
  state.store.homework_by_share_code(code).await
}

#[instrument(level = "info", skip(state, patch), fields(%actor, %id))]
pub async fn update_homework(state: &AppState, actor: Uuid, id: &str, patch: HomeworkPatch) -> AppResult<Homework> {
  let id = parse_id("homework", id)?;
  state
    .store
    .update_homework(id, |hw| {
      if hw.created_by != actor {
        return Err(AppError::NotFound("homework"));
      }
      if let Some(title) = patch.title {
        hw.title = non_blank(&title)
          .ok_or_else(|| AppError::InvalidArgument("homework title is required".into()))?
          .to_string();
      }
      if let Some(description) = patch.description {
        hw.description = description;
      }
      if let Some(ids) = patch.class_ids {
        hw.class_ids = clean_class_ids(ids);
      }
      if let Some(from) = patch.due_from {
        hw.due_from = from;
      }
      if let Some(to) = patch.due_to {
        hw.due_to = to;
      }
      if let Some(allow) = patch.allow_view_result {
        hw.allow_view_result = allow;
      }
      check_window(hw.due_from, hw.due_to)?;
      Ok(hw.clone())
    })
    .await
}

/// Creator-only hard delete; anyone else gets NotFound.
#[instrument(level = "info", skip(state), fields(%actor, %id))]
pub async fn delete_homework(state: &AppState, actor: Uuid, id: &str) -> AppResult<()> {
  let removed = state.store.delete_homework(parse_id("homework", id)?, actor).await?;
  info!(target: "homework", id = %removed.id, code = %removed.share_code, "Homework deleted");
  Ok(())
}

/// Record metadata of a file stored elsewhere.
pub async fn add_attachment(state: &AppState, actor: Uuid, id: &str, attachment: Attachment) -> AppResult<Homework> {
  if non_blank(&attachment.url).is_none() {
    return Err(AppError::InvalidArgument("attachment url is required".into()));
  }
  let id = parse_id("homework", id)?;
  state
    .store
    .update_homework(id, |hw| {
      if hw.created_by != actor {
        return Err(AppError::NotFound("homework"));
      }
      hw.attachments.push(attachment);
      Ok(hw.clone())
    })
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use chrono::Duration;
  use serde_json::json;

  fn state() -> AppState {
    AppState::from_config(AppConfig::default())
  }

  fn new_hw(v: serde_json::Value) -> NewHomework {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn share_codes_are_url_safe() {
    for len in [7, 10, 30] {
      let code = make_share_code(len);
      assert_eq!(code.len(), len);
      assert!(code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
  }

  #[tokio::test]
  async fn create_validates_and_builds_share_url() {
    let st = state();
    let me = Uuid::new_v4();
    assert!(matches!(create_homework(&st, me, new_hw(json!({ "classIds": ["c1"] }))).await, Err(AppError::InvalidArgument(_))));
    assert!(matches!(create_homework(&st, me, new_hw(json!({ "title": "T" }))).await, Err(AppError::InvalidArgument(_))));

    let hw = create_homework(&st, me, new_hw(json!({ "title": " Bài 1 ", "classId": "10A1" }))).await.unwrap();
    assert_eq!(hw.title, "Bài 1");
    assert_eq!(hw.class_ids, vec!["10A1"]);
    assert_eq!(hw.share_code.len(), 7);
    assert_eq!(hw.share_url, format!("http://localhost:5173/lam-bai/{}", hw.share_code));

    let found = get_by_share_code(&st, &hw.share_code).await.unwrap();
    assert_eq!(found.id, hw.id);
    assert!(matches!(get_by_share_code(&st, " ").await, Err(AppError::InvalidArgument(_))));
    assert!(matches!(get_by_share_code(&st, "zzzzzzz").await, Err(AppError::NotFound(_))));
  }

  #[test]
  fn share_code_grows_after_repeated_clashes() {
    assert_eq!(share_code_len(7, 0), 7);
    assert_eq!(share_code_len(7, SHARE_CODE_TRIES - 1), 7);
    assert_eq!(share_code_len(7, SHARE_CODE_TRIES), 10);
    assert_eq!(share_code_len(12, SHARE_CODE_TRIES + 3), 13);
    assert_eq!(share_code_len(1, 0), 4);
  }

  #[tokio::test]
  async fn creator_deletes_and_the_share_code_stops_working() {
    let st = state();
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let hw = create_homework(&st, me, new_hw(json!({ "title": "T", "classIds": ["c1"] }))).await.unwrap();
    let id = hw.id.to_string();

    assert!(matches!(delete_homework(&st, other, &id).await, Err(AppError::NotFound(_))));
    assert!(get_by_share_code(&st, &hw.share_code).await.is_ok());
    delete_homework(&st, me, &id).await.unwrap();
    assert!(matches!(get_homework(&st, me, &id).await, Err(AppError::NotFound(_))));
    assert!(matches!(get_by_share_code(&st, &hw.share_code).await, Err(AppError::NotFound(_))));
    assert!(list_my_homeworks(&st, me).await.is_empty());
    assert!(matches!(delete_homework(&st, me, "bad-id").await, Err(AppError::InvalidArgument(_))));
  }

  #[tokio::test]
  async fn due_window_must_be_ordered() {
    let st = state();
    let me = Uuid::new_v4();
    let now = Utc::now();
    let mut input = new_hw(json!({ "title": "T", "classIds": ["c"] }));
    input.due_from = Some(now);
    input.due_to = Some(now - Duration::hours(1));
    assert!(matches!(create_homework(&st, me, input).await, Err(AppError::Validation(_))));
  }

  #[tokio::test]
  async fn only_creator_sees_and_edits() {
    let st = state();
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
    let hw = create_homework(&st, me, new_hw(json!({ "title": "T", "classIds": ["c1", " "] }))).await.unwrap();
    assert_eq!(hw.class_ids, vec!["c1"]);
    let id = hw.id.to_string();

    assert!(matches!(get_homework(&st, other, &id).await, Err(AppError::NotFound(_))));
    let patch: HomeworkPatch = serde_json::from_value(json!({ "title": "T2" })).unwrap();
    assert!(matches!(update_homework(&st, other, &id, patch).await, Err(AppError::NotFound(_))));

    let patch: HomeworkPatch =
      serde_json::from_value(json!({ "description": "d", "dueTo": "2030-01-01T00:00:00Z", "allowViewResult": true })).unwrap();
    let updated = update_homework(&st, me, &id, patch).await.unwrap();
    assert_eq!(updated.description, "d");
    assert!(updated.due_to.is_some());
    assert!(updated.allow_view_result);

    let clear: HomeworkPatch = serde_json::from_value(json!({ "dueTo": null })).unwrap();
    assert!(update_homework(&st, me, &id, clear).await.unwrap().due_to.is_none());

    let att = Attachment { original_name: "a.pdf".into(), url: "/uploads/homeworks/a.pdf".into(), ..Default::default() };
    assert_eq!(add_attachment(&st, me, &id, att).await.unwrap().attachments.len(), 1);
    assert_eq!(list_my_homeworks(&st, me).await.len(), 1);
    assert!(list_my_homeworks(&st, other).await.is_empty());
  }
}
