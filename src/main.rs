//! Clueboard · Trivia Board Backend
//!
//! - Axum HTTP + WebSocket API over one live board
//! - Clue validation, per-category difficulty tracking, and guidance for the
//!   next generated board
//! - Optional LLM integration (via environment variables)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   DATA_DIR              : JSON store directory (default "./data")
//!   LLM_PROVIDER          : openai | mistral | deepseek | meta | gemini
//!   LLM_API_KEY           : enables generation if present (or OPENAI_API_KEY)
//!   LLM_BASE_URL          : provider default when unset
//!   LLM_MODEL             : provider default when unset
//!   CLUEBOARD_CONFIG_PATH : path to TOML config (prompts + generation settings)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod store;
mod seeds;
mod validation;
mod rating;
mod difficulty;
mod guidance;
mod generation;
mod export;
mod llm;
mod state;
mod protocol;
mod logic;
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

  // Shared application state (board, difficulty store, provider, prompts).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "clueboard_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "clueboard_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "clueboard_backend", error = %e, "Failed to listen for shutdown signal");
  }
}
