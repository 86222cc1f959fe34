//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); the gateway in front narrows it
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let banks = Router::new()
        .route("/", get(http::list_banks).post(http::create_bank))
        .route("/:id", get(http::get_bank).patch(http::update_bank).delete(http::delete_bank))
        .route("/:id/structure", get(http::get_structure).put(http::save_structure))
        .route("/:id/structure/library", post(http::apply_library))
        .route("/:id/structure/docx", post(http::upload_docx))
        .route("/:id/structure/preview", get(http::preview_docx))
        .route("/:id/structure/apply", post(http::apply_docx))
        .route("/:id/structure/nodes/:node_id", patch(http::rename_node).delete(http::delete_node))
        .route("/:id/analytics", get(http::bank_analytics))
        .route("/:id/activity", get(http::bank_activity))
        .route("/:id/members", post(http::add_member))
        .route("/:id/members/:user_id", delete(http::remove_member))
        .route("/:id/questions", get(http::list_questions).post(http::create_question))
        .route("/:id/questions/import", post(http::import_questions))
        .route("/:id/questions/:question_id", delete(http::delete_question))
        .route("/:id/seed", post(http::seed_bank));

    let api = Router::new()
        .route("/health", get(http::http_health))
        .nest("/question-banks", banks)
        .route("/structure/parse", post(http::parse_structure))
        .route("/library/books", get(http::list_books))
        .route("/library/books/:book_id", get(http::get_book))
        .route("/quizzes/generate", post(http::generate_quiz))
        .route("/quizzes/:id", get(http::get_quiz))
        .route("/attempts/start", post(http::start_attempt))
        .route("/attempts/:id", get(http::get_attempt))
        .route("/attempts/:id/submit", post(http::submit_attempt))
        .route("/homeworks", get(http::list_homeworks).post(http::create_homework))
        .route("/homeworks/share/:code", get(http::homework_by_code))
        .route(
            "/homeworks/:id",
            get(http::get_homework).patch(http::update_homework).delete(http::delete_homework),
        )
        .route("/homeworks/:id/attachments", post(http::add_homework_attachment));

    Router::new()
        .nest("/api/v1", api)
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
