//! HTTP endpoint handlers. These are thin wrappers that resolve the caller,
//! check their bank role, and forward to the service modules.

use std::sync::Arc;

use axum::{
  async_trait,
  extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State},
  http::{request::Parts, StatusCode},
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::attempt;
use crate::bank::{self, BankPatch, NewBank};
use crate::domain::{
  Attachment, Attempt, BankActivity, BookTemplate, Homework, Member, Question, QuestionBank, Quiz, Role, StructureNode,
  StructureSource,
};
use crate::error::{AppError, AppResult};
use crate::homework::{self, HomeworkPatch, NewHomework};
use crate::library::{self, BookSummary};
use crate::protocol::*;
use crate::questions::{self, QuestionInput};
use crate::quiz::{self, GenerateQuiz};
use crate::seeder;
use crate::state::AppState;
use crate::structure;
use crate::util::parse_id;

type Shared = State<Arc<AppState>>;

/// Caller identity, taken from the `x-user-id` header set by the auth gateway.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
  S: Send + Sync,
{
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get("x-user-id")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| Uuid::parse_str(v.trim()).ok())
      .map(Actor)
      .ok_or(AppError::Unauthorized)
  }
}

/// `Json` body whose rejection renders as a `VALIDATION_ERROR` envelope.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
  Json<T>: FromRequest<S, Rejection = JsonRejection>,
  S: Send + Sync,
{
  type Rejection = AppError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state).await?;
    Ok(JsonBody(value))
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> Json<HealthOut> {
  Json(HealthOut { ok: true })
}

// -------- banks --------

#[instrument(level = "info", skip(state))]
pub async fn list_banks(State(state): Shared, Actor(me): Actor) -> Json<Items<QuestionBank>> {
  Json(Items::new(bank::list_banks(&state, me).await))
}

#[instrument(level = "info", skip(state, body))]
pub async fn create_bank(
  State(state): Shared,
  Actor(me): Actor,
  JsonBody(body): JsonBody<NewBank>,
) -> AppResult<(StatusCode, Json<Item<QuestionBank>>)> {
  let created = bank::create_bank(&state, me, body).await?;
  Ok((StatusCode::CREATED, Json(Item::new(created))))
}

#[instrument(level = "info", skip(state))]
pub async fn get_bank(State(state): Shared, Actor(me): Actor, Path(id): Path<String>) -> AppResult<Json<Item<QuestionBank>>> {
  let found = bank::authorize(&state, &id, me, Role::Viewer).await?;
  Ok(Json(Item::new(found)))
}

#[instrument(level = "info", skip(state, patch))]
pub async fn update_bank(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(patch): JsonBody<BankPatch>,
) -> AppResult<Json<Item<QuestionBank>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  Ok(Json(Item::new(bank::update_bank_info(&state, me, &id, patch).await?)))
}

#[instrument(level = "info", skip(state))]
pub async fn delete_bank(State(state): Shared, Actor(me): Actor, Path(id): Path<String>) -> AppResult<Json<Ack>> {
  bank::authorize(&state, &id, me, Role::Owner).await?;
  bank::delete_bank(&state, me, &id).await?;
  Ok(Json(Ack { ok: true }))
}

#[instrument(level = "info", skip(state))]
pub async fn bank_analytics(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
) -> AppResult<Json<Item<AnalyticsOut>>> {
  bank::authorize(&state, &id, me, Role::Viewer).await?;
  let total_questions = bank::analytics(&state, &id).await?;
  Ok(Json(Item::new(AnalyticsOut { total_questions })))
}

#[instrument(level = "info", skip(state))]
pub async fn bank_activity(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
) -> AppResult<Json<Items<BankActivity>>> {
  bank::authorize(&state, &id, me, Role::Viewer).await?;
  Ok(Json(Items::new(bank::list_activity(&state, &id).await?)))
}

#[instrument(level = "info", skip(state, body), fields(role = ?body.role))]
pub async fn add_member(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<MemberIn>,
) -> AppResult<Json<Items<Member>>> {
  bank::authorize(&state, &id, me, Role::Owner).await?;
  let user = parse_id("user", &body.user)?;
  Ok(Json(Items::new(bank::add_member(&state, me, &id, user, body.role).await?)))
}

#[instrument(level = "info", skip(state))]
pub async fn remove_member(
  State(state): Shared,
  Actor(me): Actor,
  Path((id, user)): Path<(String, String)>,
) -> AppResult<Json<Items<Member>>> {
  bank::authorize(&state, &id, me, Role::Owner).await?;
  let user = parse_id("user", &user)?;
  Ok(Json(Items::new(bank::remove_member(&state, me, &id, user).await?)))
}

// -------- structure --------

#[instrument(level = "info", skip(state))]
pub async fn get_structure(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
) -> AppResult<Json<Item<StructureOut>>> {
  bank::authorize(&state, &id, me, Role::Viewer).await?;
  let (structure_source, structure_nodes) = structure::get_structure(&state, &id).await?;
  Ok(Json(Item::new(StructureOut { structure_source, structure_nodes })))
}

#[instrument(level = "info", skip(state, body))]
pub async fn save_structure(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<SaveStructureIn>,
) -> AppResult<Json<Item<StructureOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let (structure_source, structure_nodes) =
    structure::save_manual(&state, me, &id, body.structure_nodes, body.structure_source.as_deref()).await?;
  Ok(Json(Item::new(StructureOut { structure_source, structure_nodes })))
}

#[instrument(level = "info", skip(state, body), fields(book_id = %body.book_id, seed_total = ?body.seed_total))]
pub async fn apply_library(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<ApplyLibraryIn>,
) -> AppResult<Json<Item<ApplyLibraryOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  if body.book_id.trim().is_empty() {
    return Err(AppError::InvalidArgument("bookId is required".into()));
  }
  let seed_total = match body.seed_total {
    Some(n) => usize::try_from(n.max(0)).unwrap_or(0),
    None => state.config.seed.library_total,
  };
  let (structure_nodes, seeded) = structure::apply_from_library(&state, me, &id, body.book_id.trim(), seed_total).await?;
  Ok(Json(Item::new(ApplyLibraryOut { structure_source: StructureSource::AzotaLibrary, structure_nodes, seeded })))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn upload_docx(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<TextIn>,
) -> AppResult<Json<Item<DocxUploadOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let uploaded_at = structure::upload_docx_text(&state, &id, body.text).await?;
  Ok(Json(Item::new(DocxUploadOut { uploaded_at })))
}

#[instrument(level = "info", skip(state))]
pub async fn preview_docx(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
) -> AppResult<Json<Item<DocxPreviewOut>>> {
  bank::authorize(&state, &id, me, Role::Viewer).await?;
  let (text, uploaded_at) = structure::preview_docx(&state, &id).await?;
  Ok(Json(Item::new(DocxPreviewOut { text, uploaded_at })))
}

#[instrument(level = "info", skip(state))]
pub async fn apply_docx(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
) -> AppResult<Json<Item<DocxApplyOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let (structure_nodes, created) = structure::apply_from_docx(&state, me, &id).await?;
  Ok(Json(Item::new(DocxApplyOut { structure_nodes, created })))
}

#[instrument(level = "info", skip(state, body))]
pub async fn rename_node(
  State(state): Shared,
  Actor(me): Actor,
  Path((id, node_id)): Path<(String, String)>,
  JsonBody(body): JsonBody<RenameNodeIn>,
) -> AppResult<Json<Items<StructureNode>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  Ok(Json(Items::new(structure::rename_node(&state, &id, &node_id, &body.title).await?)))
}

#[instrument(level = "info", skip(state))]
pub async fn delete_node(
  State(state): Shared,
  Actor(me): Actor,
  Path((id, node_id)): Path<(String, String)>,
) -> AppResult<Json<Items<StructureNode>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  Ok(Json(Items::new(structure::delete_node(&state, &id, &node_id).await?)))
}

/// Pure parse, nothing is stored.
#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn parse_structure(
  State(state): Shared,
  Actor(_me): Actor,
  JsonBody(body): JsonBody<TextIn>,
) -> Json<Items<StructureNode>> {
  Json(Items::new(structure::build_from_text(&body.text, &state.headings)))
}

// -------- questions --------

#[instrument(level = "info", skip(state))]
pub async fn list_questions(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  Query(q): Query<QuestionQuery>,
) -> AppResult<Json<Items<Question>>> {
  bank::authorize(&state, &id, me, Role::Viewer).await?;
  Ok(Json(Items::new(questions::list_questions(&state, &id, q.code.as_deref()).await?)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn create_question(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<QuestionInput>,
) -> AppResult<(StatusCode, Json<Item<Question>>)> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let created = questions::create_question(&state, me, &id, body).await?;
  Ok((StatusCode::CREATED, Json(Item::new(created))))
}

#[instrument(level = "info", skip(state, body), fields(items = body.items.len()))]
pub async fn import_questions(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<ImportIn>,
) -> AppResult<Json<Item<ImportedOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let imported = questions::import_questions(&state, me, &id, body.items).await?;
  Ok(Json(Item::new(ImportedOut { imported })))
}

#[instrument(level = "info", skip(state))]
pub async fn delete_question(
  State(state): Shared,
  Actor(me): Actor,
  Path((id, question_id)): Path<(String, String)>,
) -> AppResult<Json<Ack>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  questions::delete_question(&state, &id, &question_id).await?;
  Ok(Json(Ack { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(lessons = body.lesson_ids.len(), total = body.total))]
pub async fn seed_bank(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<SeedIn>,
) -> AppResult<Json<Item<InsertedOut>>> {
  bank::authorize(&state, &id, me, Role::Editor).await?;
  let total = usize::try_from(body.total.max(0)).unwrap_or(0);
  let inserted = seeder::seed_for_bank(&state, &id, &body.lesson_ids, total, me).await?;
  Ok(Json(Item::new(InsertedOut { inserted })))
}

// -------- library --------

#[instrument(level = "info", skip(state))]
pub async fn list_books(State(state): Shared) -> Json<Items<BookSummary>> {
  Json(Items::new(library::list_books(&state).await))
}

#[instrument(level = "info", skip(state))]
pub async fn get_book(State(state): Shared, Path(book_id): Path<String>) -> AppResult<Json<Item<BookTemplate>>> {
  Ok(Json(Item::new(library::get_book(&state, &book_id).await?)))
}

// -------- quizzes and attempts --------

#[instrument(level = "info", skip(state, body), fields(bank_id = %body.bank_id))]
pub async fn generate_quiz(
  State(state): Shared,
  Actor(me): Actor,
  JsonBody(body): JsonBody<GenerateQuiz>,
) -> AppResult<(StatusCode, Json<Item<Quiz>>)> {
  bank::authorize(&state, &body.bank_id, me, Role::Editor).await?;
  let created = quiz::generate(&state, me, body).await?;
  info!(target: "quiz", id = %created.id, picked = created.question_ids.len(), "HTTP quiz generated");
  Ok((StatusCode::CREATED, Json(Item::new(created))))
}

/// Quiz as a student sees it: answer keys and explanations stripped.
#[instrument(level = "info", skip(state))]
pub async fn get_quiz(State(state): Shared, Actor(_me): Actor, Path(id): Path<String>) -> AppResult<Json<Item<QuizOut>>> {
  let (quiz, questions) = quiz::get_quiz(&state, &id).await?;
  let questions = questions.into_iter().map(QuizQuestionOut::from).collect();
  Ok(Json(Item::new(QuizOut { quiz, questions })))
}

#[instrument(level = "info", skip(state, body), fields(quiz_id = %body.quiz_id))]
pub async fn start_attempt(
  State(state): Shared,
  Actor(me): Actor,
  JsonBody(body): JsonBody<StartAttemptIn>,
) -> AppResult<Json<Item<StartAttemptOut>>> {
  let (attempt, reused) = attempt::start(&state, &body.quiz_id, me).await?;
  Ok(Json(Item::new(StartAttemptOut { attempt, reused })))
}

#[instrument(level = "info", skip(state, body), fields(answers = body.answers.len()))]
pub async fn submit_attempt(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<SubmitIn>,
) -> AppResult<Json<Item<Attempt>>> {
  let answers = body.answers.into_iter().map(attempt::AnswerInput::from_raw).collect();
  let done = attempt::submit(&state, &id, me, answers).await?;
  info!(target: "attempt", id = %done.id, score = done.score, total = done.total, "HTTP attempt submitted");
  Ok(Json(Item::new(done)))
}

#[instrument(level = "info", skip(state))]
pub async fn get_attempt(State(state): Shared, Actor(me): Actor, Path(id): Path<String>) -> AppResult<Json<Item<Attempt>>> {
  Ok(Json(Item::new(attempt::get_by_id(&state, &id, me).await?)))
}

// -------- homework --------

#[instrument(level = "info", skip(state))]
pub async fn list_homeworks(State(state): Shared, Actor(me): Actor) -> Json<Items<Homework>> {
  Json(Items::new(homework::list_my_homeworks(&state, me).await))
}

#[instrument(level = "info", skip(state, body))]
pub async fn create_homework(
  State(state): Shared,
  Actor(me): Actor,
  JsonBody(body): JsonBody<NewHomework>,
) -> AppResult<(StatusCode, Json<Item<Homework>>)> {
  let created = homework::create_homework(&state, me, body).await?;
  Ok((StatusCode::CREATED, Json(Item::new(created))))
}

#[instrument(level = "info", skip(state))]
pub async fn get_homework(State(state): Shared, Actor(me): Actor, Path(id): Path<String>) -> AppResult<Json<Item<Homework>>> {
  Ok(Json(Item::new(homework::get_homework(&state, me, &id).await?)))
}

#[instrument(level = "info", skip(state, patch))]
pub async fn update_homework(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(patch): JsonBody<HomeworkPatch>,
) -> AppResult<Json<Item<Homework>>> {
  Ok(Json(Item::new(homework::update_homework(&state, me, &id, patch).await?)))
}

#[instrument(level = "info", skip(state))]
pub async fn delete_homework(State(state): Shared, Actor(me): Actor, Path(id): Path<String>) -> AppResult<Json<Ack>> {
  homework::delete_homework(&state, me, &id).await?;
  Ok(Json(Ack { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(name = %body.original_name))]
pub async fn add_homework_attachment(
  State(state): Shared,
  Actor(me): Actor,
  Path(id): Path<String>,
  JsonBody(body): JsonBody<Attachment>,
) -> AppResult<Json<Item<Homework>>> {
  Ok(Json(Item::new(homework::add_attachment(&state, me, &id, body).await?)))
}

/// Public: students open homework through the share link without an account.
#[instrument(level = "info", skip(state))]
pub async fn homework_by_code(State(state): Shared, Path(code): Path<String>) -> AppResult<Json<Item<Homework>>> {
  Ok(Json(Item::new(homework::get_by_share_code(&state, &code).await?)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::routes::build_router;
  use axum::{body::Body, http::Request, Router};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  fn app() -> Router {
    build_router(Arc::new(AppState::from_config(AppConfig::default())))
  }

  async fn call(app: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(u) = user {
      req = req.header("x-user-id", u.to_string());
    }
    let body = match body {
      Some(v) => {
        req = req.header("content-type", "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  #[tokio::test]
  async fn health_needs_no_identity() {
    let (status, body) = call(&app(), "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
  }

  #[tokio::test]
  async fn missing_or_bad_identity_is_unauthorized() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/v1/question-banks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let req = Request::builder().uri("/api/v1/question-banks").header("x-user-id", "teacher-1").body(Body::empty()).unwrap();
    assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn teacher_builds_a_quiz_and_student_takes_it() {
    let app = app();
    let (teacher, student) = (Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = call(&app, "POST", "/api/v1/question-banks", Some(teacher), Some(json!({ "name": "Anh 10" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let bank = body["item"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
      &app,
      "POST",
      &format!("/api/v1/question-banks/{bank}/structure/library"),
      Some(teacher),
      Some(json!({ "bookId": "tieng-anh-10-friends-global", "seedTotal": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["structureNodes"].as_array().unwrap().len(), 9);
    assert_eq!(body["item"]["seeded"], 0);

    let (_, body) = call(
      &app,
      "POST",
      &format!("/api/v1/question-banks/{bank}/seed"),
      Some(teacher),
      Some(json!({ "lessonIds": ["u1_a", "u1_b"], "total": 6 })),
    )
    .await;
    assert_eq!(body["item"]["inserted"], 6);

    let (status, body) = call(
      &app,
      "POST",
      "/api/v1/quizzes/generate",
      Some(teacher),
      Some(json!({ "bankId": bank, "lessonIds": ["u1_a", "u1_b"], "numQuestions": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["questionIds"].as_array().unwrap().len(), 4);
    let quiz = body["item"]["id"].as_str().unwrap().to_string();

    let (_, body) = call(&app, "GET", &format!("/api/v1/quizzes/{quiz}"), Some(student), None).await;
    let shown = body["item"]["questions"].as_array().unwrap();
    assert_eq!(shown.len(), 4);
    assert!(shown.iter().all(|q| q.get("answer").is_none() && q.get("explanation").is_none()));

    let (_, body) = call(&app, "POST", "/api/v1/attempts/start", Some(student), Some(json!({ "quizId": quiz }))).await;
    assert_eq!(body["item"]["reused"], false);
    let attempt = body["item"]["id"].as_str().unwrap().to_string();
    let (_, again) = call(&app, "POST", "/api/v1/attempts/start", Some(student), Some(json!({ "quizId": quiz }))).await;
    assert_eq!(again["item"]["reused"], true);
    assert_eq!(again["item"]["id"], attempt.as_str());

    // seeded questions are all keyed to index 0
    let answers: Vec<Value> = shown.iter().map(|q| json!({ "questionId": q["id"], "selectedIndex": 0 })).collect();
    let uri = format!("/api/v1/attempts/{attempt}/submit");
    let (status, body) = call(&app, "POST", &uri, Some(student), Some(json!({ "answers": answers }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["score"], 4);
    assert_eq!(body["item"]["total"], 4);
    assert_eq!(body["item"]["status"], "submitted");

    let (status, body) = call(&app, "POST", &uri, Some(student), Some(json!({ "answers": [] }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_SUBMITTED");

    let (status, _) = call(&app, "GET", &format!("/api/v1/attempts/{attempt}"), Some(teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn roles_gate_bank_operations() {
    let app = app();
    let (owner, viewer, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (_, body) = call(&app, "POST", "/api/v1/question-banks", Some(owner), Some(json!({ "name": "B" }))).await;
    let bank = body["item"]["id"].as_str().unwrap().to_string();

    let members = format!("/api/v1/question-banks/{bank}/members");
    let (status, _) = call(&app, "POST", &members, Some(owner), Some(json!({ "user": viewer, "role": "viewer" }))).await;
    assert_eq!(status, StatusCode::OK);

    let detail = format!("/api/v1/question-banks/{bank}");
    assert_eq!(call(&app, "GET", &detail, Some(viewer), None).await.0, StatusCode::OK);
    assert_eq!(call(&app, "GET", &detail, Some(stranger), None).await.0, StatusCode::FORBIDDEN);
    let (status, body) = call(&app, "PATCH", &detail, Some(viewer), Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    assert_eq!(call(&app, "DELETE", &detail, Some(owner), None).await.0, StatusCode::OK);
    assert_eq!(call(&app, "GET", &detail, Some(owner), None).await.0, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_lessons_are_reported_in_details() {
    let app = app();
    let me = Uuid::new_v4();
    let (_, body) = call(&app, "POST", "/api/v1/question-banks", Some(me), Some(json!({ "name": "B" }))).await;
    let bank = body["item"]["id"].as_str().unwrap().to_string();
    call(
      &app,
      "POST",
      &format!("/api/v1/question-banks/{bank}/structure/library"),
      Some(me),
      Some(json!({ "bookId": "tieng-anh-10-friends-global" })),
    )
    .await;

    let (status, body) = call(
      &app,
      "POST",
      "/api/v1/quizzes/generate",
      Some(me),
      Some(json!({ "bankId": bank, "lessonIds": ["u1_a", "ghost", "u9_z"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "LESSON_NOT_IN_STRUCTURE");
    assert_eq!(body["error"]["details"]["lessonIds"], json!(["ghost", "u9_z"]));
  }

  #[tokio::test]
  async fn homework_is_public_by_share_code() {
    let app = app();
    let me = Uuid::new_v4();
    let (status, body) =
      call(&app, "POST", "/api/v1/homeworks", Some(me), Some(json!({ "title": "Tuần 1", "classIds": ["10A1"] }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let code = body["item"]["shareCode"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", &format!("/api/v1/homeworks/share/{code}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["title"], "Tuần 1");

    let (_, body) = call(&app, "GET", "/api/v1/library/books", None, None).await;
    assert_eq!(body["items"][0]["bookId"], "tieng-anh-10-friends-global");

    let detail = format!("/api/v1/homeworks/{}", first_homework_id(&app, me).await);
    assert_eq!(call(&app, "DELETE", &detail, Some(Uuid::new_v4()), None).await.0, StatusCode::NOT_FOUND);
    let (status, body) = call(&app, "DELETE", &detail, Some(me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(call(&app, "GET", &detail, Some(me), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(call(&app, "GET", &format!("/api/v1/homeworks/share/{code}"), None, None).await.0, StatusCode::NOT_FOUND);
  }

  async fn first_homework_id(app: &Router, me: Uuid) -> String {
    let (_, body) = call(app, "GET", "/api/v1/homeworks", Some(me), None).await;
    body["items"][0]["id"].as_str().unwrap().to_string()
  }

  #[tokio::test]
  async fn library_apply_seeds_questions_by_default() {
    let app = app();
    let me = Uuid::new_v4();
    let (_, body) = call(&app, "POST", "/api/v1/question-banks", Some(me), Some(json!({ "name": "B" }))).await;
    let bank = body["item"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
      &app,
      "POST",
      &format!("/api/v1/question-banks/{bank}/structure/library"),
      Some(me),
      Some(json!({ "bookId": "tieng-anh-10-friends-global" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["seeded"], 50);
    assert_eq!(body["item"]["structureSource"], "azota_library");

    let (_, body) = call(&app, "GET", &format!("/api/v1/question-banks/{bank}/analytics"), Some(me), None).await;
    assert_eq!(body["item"]["totalQuestions"], 50);

    // the seeded pool is enough to generate straight away
    let (status, _) = call(
      &app,
      "POST",
      "/api/v1/quizzes/generate",
      Some(me),
      Some(json!({ "bankId": bank, "lessonIds": ["u1_a", "u2_c"], "numQuestions": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn submit_drops_malformed_entries_and_bad_bodies_get_the_envelope() {
    let app = app();
    let (teacher, student) = (Uuid::new_v4(), Uuid::new_v4());
    let (_, body) = call(&app, "POST", "/api/v1/question-banks", Some(teacher), Some(json!({ "name": "B" }))).await;
    let bank = body["item"]["id"].as_str().unwrap().to_string();
    call(
      &app,
      "POST",
      &format!("/api/v1/question-banks/{bank}/structure/library"),
      Some(teacher),
      Some(json!({ "bookId": "tieng-anh-10-friends-global", "seedTotal": 7 })),
    )
    .await;
    let (_, body) = call(
      &app,
      "POST",
      "/api/v1/quizzes/generate",
      Some(teacher),
      Some(json!({ "bankId": bank, "lessonIds": ["u1_a"], "numQuestions": 1 })),
    )
    .await;
    let quiz = body["item"]["id"].as_str().unwrap().to_string();
    let (_, body) = call(&app, "GET", &format!("/api/v1/quizzes/{quiz}"), Some(student), None).await;
    let question = body["item"]["questions"][0]["id"].clone();
    let (_, body) = call(&app, "POST", "/api/v1/attempts/start", Some(student), Some(json!({ "quizId": quiz }))).await;
    let uri = format!("/api/v1/attempts/{}/submit", body["item"]["id"].as_str().unwrap());

    // `answers` must be an array; anything else fails the whole body
    let (status, body) = call(&app, "POST", &uri, Some(student), Some(json!({ "answers": "all of them" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let answers = json!([
      { "questionId": question, "selectedIndex": 0 },
      { "questionId": 42, "selectedIndex": 0 },
      "not an answer",
      { "selectedIndex": 1 },
    ]);
    let (status, body) = call(&app, "POST", &uri, Some(student), Some(json!({ "answers": answers }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["answers"].as_array().unwrap().len(), 1);
    assert_eq!(body["item"]["score"], 1);
    assert_eq!(body["item"]["total"], 1);
  }
}
