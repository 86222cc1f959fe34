//! Public protocol structs for the HTTP API (serde ready).
//! Request bodies the service layer does not already define, plus the
//! response envelopes and the student-facing quiz view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Attempt, QuestionType, Question, Quiz, Role, StructureNode, StructureSource};
use crate::questions::QuestionInput;

/// Success envelope for a single value: `{ "ok": true, "item": ... }`.
#[derive(Debug, Serialize)]
pub struct Item<T> {
    pub ok: bool,
    pub item: T,
}

impl<T> Item<T> {
    pub fn new(item: T) -> Self {
        Self { ok: true, item }
    }
}

/// Success envelope for a list: `{ "ok": true, "items": [...] }`.
#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub ok: bool,
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { ok: true, items }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Bare `{ "ok": true }` for deletes.
#[derive(Serialize)]
pub struct Ack {
    pub ok: bool,
}

//
// Structure
//

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLibraryIn {
    #[serde(default)]
    pub book_id: String,
    /// Questions to seed over the book's lessons; absent means the configured default.
    #[serde(default)]
    pub seed_total: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLibraryOut {
    pub structure_source: StructureSource,
    pub structure_nodes: Vec<StructureNode>,
    pub seeded: usize,
}

/// Nodes stay raw so a non-array can be told apart from a bad node.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStructureIn {
    #[serde(default)]
    pub structure_nodes: serde_json::Value,
    #[serde(default)]
    pub structure_source: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureOut {
    pub structure_source: StructureSource,
    pub structure_nodes: Vec<StructureNode>,
}

#[derive(Deserialize)]
pub struct RenameNodeIn {
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize)]
pub struct TextIn {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxUploadOut {
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxPreviewOut {
    pub text: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxApplyOut {
    pub structure_nodes: Vec<StructureNode>,
    pub created: bool,
}

//
// Banks and questions
//

#[derive(Deserialize)]
pub struct MemberIn {
    #[serde(default)]
    pub user: String,
    pub role: Role,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOut {
    pub total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub code: Option<String>,
}

/// Bulk import body. `questions` is accepted for older clients.
#[derive(Deserialize)]
pub struct ImportIn {
    #[serde(default, alias = "questions")]
    pub items: Vec<QuestionInput>,
}

#[derive(Serialize)]
pub struct ImportedOut {
    pub imported: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedIn {
    #[serde(default)]
    pub lesson_ids: Vec<String>,
    #[serde(default)]
    pub total: i64,
}

#[derive(Serialize)]
pub struct InsertedOut {
    pub inserted: usize,
}

//
// Quizzes and attempts
//

/// A question as shown to the student: no answer key, no explanation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionOut {
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub choices: Vec<String>,
    pub structure_node_id: Option<String>,
}

impl From<Question> for QuizQuestionOut {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            code: q.code,
            question_type: q.question_type,
            content: q.content,
            choices: q.choices,
            structure_node_id: q.structure_node_id,
        }
    }
}

#[derive(Serialize)]
pub struct QuizOut {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestionOut>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptIn {
    #[serde(default)]
    pub quiz_id: String,
}

#[derive(Serialize)]
pub struct StartAttemptOut {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub reused: bool,
}

/// Entries stay raw JSON here; a bad entry is dropped at grading, not rejected.
#[derive(Deserialize)]
pub struct SubmitIn {
    #[serde(default)]
    pub answers: Vec<serde_json::Value>,
}
