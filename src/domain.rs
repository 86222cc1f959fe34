//! Domain models: question banks and their structure tree, questions, quizzes,
//! attempts, homework, and library book templates.
//!
//! Wire names are camelCase so the existing frontend keeps working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a structure node. Only `Lesson` nodes hold questions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
  Topic,
  Lesson,
  Unit,
  Chapter,
  #[default]
  Custom,
}

/// Typed node metadata. Unknown keys survive a round trip through `extra`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct NodeMeta {
  /// Lesson code from a library book (A/B/C/D...).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  /// UI expand/collapse state.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub open: Option<bool>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructureNode {
  pub id: String,
  #[serde(default)]
  pub parent_id: Option<String>,
  pub title: String,
  #[serde(rename = "type", default)]
  pub node_type: NodeType,
  #[serde(default)]
  pub order: i64,
  #[serde(default)]
  pub meta: NodeMeta,
}

/// Where the current structure of a bank came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StructureSource {
  #[default]
  None,
  AzotaLibrary,
  PdfUpload,
  DocxUpload,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Viewer,
  Editor,
  Owner,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
  pub user: Uuid,
  pub role: Role,
  pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
  pub id: Uuid,
  pub name: String,
  pub grade: String,
  pub subject: String,
  pub book: String,
  pub owner: Uuid,
  pub members: Vec<Member>,

  pub structure_source: StructureSource,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub structure_book_id: Option<String>,
  pub structure_nodes: Vec<StructureNode>,
  pub structure_docx_text: String,
  pub structure_docx_uploaded_at: Option<DateTime<Utc>>,

  /// Denormalized and best-effort; see `Store::count_live_questions` for the exact number.
  pub question_count: u64,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl QuestionBank {
  /// Role of `user` in this bank, if any. The owner is always `Owner`.
  pub fn role_of(&self, user: Uuid) -> Option<Role> {
    if self.owner == user {
      return Some(Role::Owner);
    }
    self.members.iter().find(|m| m.user == user).map(|m| m.role)
  }

  pub fn node(&self, node_id: &str) -> Option<&StructureNode> {
    self.structure_nodes.iter().find(|n| n.id == node_id)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  #[default]
  Mcq,
  TrueFalse,
  ShortAnswer,
  Essay,
}

/// Stored answer key, one shape per question type.
/// Untagged so the mcq payload stays `{ "correct": <index> }` on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerKey {
  Mcq { correct: usize },
  TrueFalse { correct: bool },
  ShortAnswer { accepted: Vec<String> },
  Essay {
    #[serde(default)]
    rubric: String,
  },
}

impl AnswerKey {
  pub fn fits(&self, kind: QuestionType) -> bool {
    matches!(
      (self, kind),
      (AnswerKey::Mcq { .. }, QuestionType::Mcq)
        | (AnswerKey::TrueFalse { .. }, QuestionType::TrueFalse)
        | (AnswerKey::ShortAnswer { .. }, QuestionType::ShortAnswer)
        | (AnswerKey::Essay { .. }, QuestionType::Essay)
    )
  }

  /// Correct choice index, for mcq keys only.
  pub fn correct_index(&self) -> Option<usize> {
    match self {
      AnswerKey::Mcq { correct } => Some(*correct),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: Uuid,
  pub bank: Uuid,
  pub code: String,
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub content: String,
  pub choices: Vec<String>,
  pub answer: AnswerKey,
  pub explanation: String,
  pub structure_node_id: Option<String>,
  pub created_by: Option<Uuid>,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
  pub id: Uuid,
  pub bank: Uuid,
  pub title: String,
  pub lesson_ids: Vec<String>,
  pub num_questions: usize,
  pub shuffle: bool,
  /// Snapshot taken at generation time; never rewritten.
  pub question_ids: Vec<Uuid>,
  pub created_by: Uuid,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
  InProgress,
  Submitted,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
  pub question_id: Uuid,
  pub selected_index: i64,
  pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
  pub id: Uuid,
  pub quiz: Uuid,
  pub user: Uuid,
  pub status: AttemptStatus,
  pub answers: Vec<AttemptAnswer>,
  pub score: usize,
  pub total: usize,
  pub started_at: DateTime<Utc>,
  pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub original_name: String,
  pub url: String,
  #[serde(default)]
  pub pdf_url: String,
  #[serde(default)]
  pub mime: String,
  #[serde(default)]
  pub size: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub class_ids: Vec<String>,
  pub due_from: Option<DateTime<Utc>>,
  pub due_to: Option<DateTime<Utc>>,
  pub allow_view_result: bool,
  pub share_code: String,
  pub share_url: String,
  pub attachments: Vec<Attachment>,
  pub created_by: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Library book: units holding lessons.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTemplate {
  #[serde(alias = "book_id")]
  pub book_id: String,
  pub title: String,
  #[serde(default)]
  pub grade: Option<u32>,
  #[serde(default)]
  pub subject: Option<String>,
  #[serde(default)]
  pub units: Vec<BookUnit>,
  #[serde(default = "default_book_status")]
  pub status: String,
}

fn default_book_status() -> String {
  "published".into()
}

impl BookTemplate {
  pub fn is_published(&self) -> bool {
    self.status == "published"
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookUnit {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub lessons: Vec<BookLesson>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookLesson {
  pub id: String,
  pub code: String,
  pub title: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BankAction {
  BankCreated,
  BankUpdated,
  BankDeleted,
  StructureCreated,
  StructureUpdated,
  QuestionCreated,
  QuestionImported,
  MemberAdded,
  MemberRemoved,
  RoleChanged,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankActivity {
  pub bank: Uuid,
  pub actor: Uuid,
  pub action: BankAction,
  pub payload: serde_json::Value,
  pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn mcq_answer_keeps_legacy_wire_shape() {
    let key: AnswerKey = serde_json::from_value(json!({ "correct": 2 })).unwrap();
    assert_eq!(key, AnswerKey::Mcq { correct: 2 });
    assert_eq!(serde_json::to_value(&key).unwrap(), json!({ "correct": 2 }));
    assert!(key.fits(QuestionType::Mcq));
    assert!(!key.fits(QuestionType::Essay));
  }

  #[test]
  fn boolean_answer_is_true_false() {
    let key: AnswerKey = serde_json::from_value(json!({ "correct": true })).unwrap();
    assert_eq!(key, AnswerKey::TrueFalse { correct: true });
    assert_eq!(key.correct_index(), None);
  }

  #[test]
  fn node_meta_keeps_unknown_keys() {
    let node: StructureNode = serde_json::from_value(json!({
      "id": "l1", "parentId": "t1", "title": "Bài A", "type": "lesson",
      "order": 0, "meta": { "code": "A", "color": "red" }
    }))
    .unwrap();
    assert_eq!(node.meta.code.as_deref(), Some("A"));
    assert_eq!(node.meta.extra.get("color"), Some(&json!("red")));
    let back = serde_json::to_value(&node).unwrap();
    assert_eq!(back["meta"]["color"], json!("red"));
    assert_eq!(back["type"], json!("lesson"));
  }

  #[test]
  fn node_defaults_to_custom_root() {
    let node: StructureNode = serde_json::from_value(json!({ "id": "x", "title": "X" })).unwrap();
    assert_eq!(node.node_type, NodeType::Custom);
    assert_eq!(node.parent_id, None);
    assert_eq!(node.order, 0);
  }

  #[test]
  fn owner_role_wins_over_member_entry() {
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();
    let now = Utc::now();
    let bank = QuestionBank {
      id: Uuid::new_v4(),
      name: "B".into(),
      grade: String::new(),
      subject: String::new(),
      book: String::new(),
      owner,
      members: vec![
        Member { user: owner, role: Role::Viewer, added_at: now },
        Member { user: editor, role: Role::Editor, added_at: now },
      ],
      structure_source: StructureSource::None,
      structure_book_id: None,
      structure_nodes: vec![],
      structure_docx_text: String::new(),
      structure_docx_uploaded_at: None,
      question_count: 0,
      is_deleted: false,
      created_at: now,
      updated_at: now,
    };
    assert_eq!(bank.role_of(owner), Some(Role::Owner));
    assert_eq!(bank.role_of(editor), Some(Role::Editor));
    assert_eq!(bank.role_of(Uuid::new_v4()), None);
    assert!(Role::Viewer < Role::Editor && Role::Editor < Role::Owner);
  }
}
