//! Question bank lifecycle, membership and role checks.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{BankAction, BankActivity, Member, QuestionBank, Role, StructureSource};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::util::{non_blank, parse_id};

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct NewBank {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub grade: String,
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub book: String,
}

/// Descriptive fields only; structure and counters have their own operations.
#[derive(Debug, Default, Deserialize)]
pub struct BankPatch {
  pub name: Option<String>,
  pub grade: Option<String>,
  pub subject: Option<String>,
  pub book: Option<String>,
}

fn checked_name(raw: &str) -> AppResult<String> {
  let name = non_blank(raw).ok_or_else(|| AppError::InvalidArgument("bank name is required".into()))?;
  if name.chars().count() > MAX_NAME_LEN {
    return Err(AppError::Validation(format!("bank name longer than {MAX_NAME_LEN} characters")));
  }
  Ok(name.to_string())
}

/// Fail with `Forbidden` unless `actor` holds at least `min` in the bank.
pub async fn authorize(state: &AppState, bank_id: &str, actor: Uuid, min: Role) -> AppResult<QuestionBank> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  match bank.role_of(actor) {
    Some(role) if role >= min => Ok(bank),
    role => {
      warn!(target: "bank", bank = %bank.id, %actor, ?role, required = ?min, "Bank access denied");
      Err(AppError::Forbidden(format!("requires {min:?} role on this bank").to_lowercase()))
    }
  }
}

#[instrument(level = "info", skip(state, input), fields(%actor))]
pub async fn create_bank(state: &AppState, actor: Uuid, input: NewBank) -> AppResult<QuestionBank> {
  let name = checked_name(&input.name)?;
  let now = Utc::now();
  let bank = QuestionBank {
    id: Uuid::new_v4(),
    name,
    grade: input.grade,
    subject: input.subject,
    book: input.book,
    owner: actor,
    members: vec![Member { user: actor, role: Role::Owner, added_at: now }],
    structure_source: StructureSource::None,
    structure_book_id: None,
    structure_nodes: Vec::new(),
    structure_docx_text: String::new(),
    structure_docx_uploaded_at: None,
    question_count: 0,
    is_deleted: false,
    created_at: now,
    updated_at: now,
  };
  state.store.insert_bank(bank.clone()).await;
  state.store.log_activity(bank.id, actor, BankAction::BankCreated, json!({ "name": bank.name })).await;
  info!(target: "bank", id = %bank.id, "Bank created");
  Ok(bank)
}

pub async fn list_banks(state: &AppState, actor: Uuid) -> Vec<QuestionBank> {
  state.store.banks_for(actor).await
}

pub async fn get_bank(state: &AppState, bank_id: &str) -> AppResult<QuestionBank> {
  state.store.bank(parse_id("bank", bank_id)?).await
}

#[instrument(level = "info", skip(state, patch), fields(%bank_id))]
pub async fn update_bank_info(state: &AppState, actor: Uuid, bank_id: &str, patch: BankPatch) -> AppResult<QuestionBank> {
  let id = parse_id("bank", bank_id)?;
  let name = patch.name.as_deref().map(checked_name).transpose()?;
  let bank = state
    .store
    .update_bank(id, |b| {
      if let Some(name) = name {
        b.name = name;
      }
      if let Some(grade) = patch.grade {
        b.grade = grade;
      }
      if let Some(subject) = patch.subject {
        b.subject = subject;
      }
      if let Some(book) = patch.book {
        b.book = book;
      }
      Ok(b.clone())
    })
    .await?;
  state.store.log_activity(id, actor, BankAction::BankUpdated, json!({})).await;
  Ok(bank)
}

#[instrument(level = "info", skip(state), fields(%bank_id))]
pub async fn delete_bank(state: &AppState, actor: Uuid, bank_id: &str) -> AppResult<()> {
  let id = parse_id("bank", bank_id)?;
  state
    .store
    .update_bank(id, |b| {
      b.is_deleted = true;
      Ok(())
    })
    .await?;
  state.store.log_activity(id, actor, BankAction::BankDeleted, json!({})).await;
  info!(target: "bank", %id, "Bank soft-deleted");
  Ok(())
}

/// Add a member or change an existing member's role.
#[instrument(level = "info", skip(state), fields(%bank_id, %user))]
pub async fn add_member(state: &AppState, actor: Uuid, bank_id: &str, user: Uuid, role: Role) -> AppResult<Vec<Member>> {
  let id = parse_id("bank", bank_id)?;
  if role == Role::Owner {
    return Err(AppError::InvalidArgument("ownership cannot be granted through membership".into()));
  }
  let (members, action) = state
    .store
    .update_bank(id, |b| {
      if b.owner == user {
        return Err(AppError::InvalidArgument("the owner's role cannot be changed".into()));
      }
      let action = match b.members.iter_mut().find(|m| m.user == user) {
        Some(m) => {
          m.role = role;
          BankAction::RoleChanged
        }
        None => {
          b.members.push(Member { user, role, added_at: Utc::now() });
          BankAction::MemberAdded
        }
      };
      Ok((b.members.clone(), action))
    })
    .await?;
  state.store.log_activity(id, actor, action, json!({ "user": user, "role": role })).await;
  Ok(members)
}

#[instrument(level = "info", skip(state), fields(%bank_id, %user))]
pub async fn remove_member(state: &AppState, actor: Uuid, bank_id: &str, user: Uuid) -> AppResult<Vec<Member>> {
  let id = parse_id("bank", bank_id)?;
  let members = state
    .store
    .update_bank(id, |b| {
      if b.owner == user {
        return Err(AppError::InvalidArgument("the owner cannot be removed".into()));
      }
      let before = b.members.len();
      b.members.retain(|m| m.user != user);
      if b.members.len() == before {
        return Err(AppError::NotFound("member"));
      }
      Ok(b.members.clone())
    })
    .await?;
  state.store.log_activity(id, actor, BankAction::MemberRemoved, json!({ "user": user })).await;
  Ok(members)
}

/// Exact question total, computed from the live questions rather than the cached counter.
pub async fn analytics(state: &AppState, bank_id: &str) -> AppResult<usize> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  Ok(state.store.count_live_questions(bank.id).await)
}

pub async fn list_activity(state: &AppState, bank_id: &str) -> AppResult<Vec<BankActivity>> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  Ok(state.store.activity_for(bank.id).await)
}
