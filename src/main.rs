//! Quiz bank backend
//!
//! - Axum HTTP API for question banks, lesson structures, quizzes and attempts
//! - Homework assignments shared through short public codes
//! - In-memory document store seeded with the built-in book library
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   QUIZBANK_CONFIG_PATH : path to TOML config (heading patterns, seed, homework, books)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod store;
mod state;
mod structure;
mod bank;
mod questions;
mod seeder;
mod library;
mod quiz;
mod attempt;
mod homework;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: document store, loaded config, compiled heading patterns.
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizbank", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quizbank", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "quizbank", "Shutting down");
}
