//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; errors come back as `{ ok: false, message }`.

use std::sync::Arc;

use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::export::{append_export, ExportPayload};
use crate::llm::ProviderError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::validation::validate_clue;

/// Error half of every handler.
#[derive(Debug)]
pub struct ApiError {
  status: StatusCode,
  message: String,
}

impl ApiError {
  pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
    Self { status, message: message.into() }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(ErrorOut { ok: false, message: self.message })).into_response()
  }
}

impl From<LogicError> for ApiError {
  fn from(e: LogicError) -> Self {
    let status = match &e {
      LogicError::ClueNotFound { .. } | LogicError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
      LogicError::EmptyTitle => StatusCode::BAD_REQUEST,
      LogicError::TooVague(_) => StatusCode::UNPROCESSABLE_ENTITY,
      LogicError::AlreadyAnswered { .. } => StatusCode::CONFLICT,
    };
    ApiError::new(status, e.to_string())
  }
}

impl From<GenerationError> for ApiError {
  fn from(e: GenerationError) -> Self {
    let status = match &e {
      GenerationError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
      GenerationError::Cancelled => StatusCode::CONFLICT,
      GenerationError::Provider(ProviderError::RateLimit(_)) => StatusCode::TOO_MANY_REQUESTS,
      GenerationError::Provider(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError::new(status, e.to_string())
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation_enabled: state.provider.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_board(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.board.read().await.clone())
}

#[instrument(level = "info", skip(state, body), fields(reference_len = body.as_ref().map(|b| b.reference_text.len()).unwrap_or(0)))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  body: Option<Json<GenerateIn>>,
) -> ApiResult<crate::domain::Board> {
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let board = generate_board(&state, &body.reference_text).await?;
  info!(target: "clueboard", board = %board.id, "HTTP board generated");
  Ok(Json(board))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_cancel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  state.cancel_generation();
  StatusCode::NO_CONTENT
}

#[instrument(level = "info", skip(state, body), fields(category = body.category, clue = body.clue))]
pub async fn http_post_reveal(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ClueRef>,
) -> ApiResult<crate::domain::Clue> {
  Ok(Json(reveal_clue(&state, body.category, body.clue).await?))
}

#[instrument(level = "info", skip(state, body), fields(category = body.category, clue = body.clue, resolution = ?body.resolution))]
pub async fn http_post_resolve(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResolveIn>,
) -> ApiResult<ResolveOut> {
  let resolved = resolve_clue(&state, body.category, body.clue, body.resolution, body.rejudge).await?;
  Ok(Json(resolved.into()))
}

#[instrument(level = "info", skip(state, body), fields(category = body.category, clue = body.clue, force = body.force))]
pub async fn http_post_edit_clue(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EditClueIn>,
) -> ApiResult<crate::domain::Clue> {
  Ok(Json(edit_clue(&state, body.category, body.clue, body.edit(), body.force).await?))
}

#[instrument(level = "info", skip(state, body), fields(category = body.category))]
pub async fn http_post_edit_category(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EditCategoryIn>,
) -> ApiResult<crate::domain::Category> {
  Ok(Json(edit_category_title(&state, body.category, &body.title).await?))
}

#[instrument(level = "info", skip(body), fields(category = %body.category))]
pub async fn http_post_validate(Json(body): Json<ValidateIn>) -> impl IntoResponse {
  Json(validate_clue(&body.category, &body.clue, &body.answer))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_guidance(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(GuidanceOut { guidance: current_guidance(&state).await })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_difficulty(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.difficulty.read().await.clone())
}

#[instrument(level = "info")]
pub async fn http_post_wager(Json(body): Json<WagerIn>) -> impl IntoResponse {
  Json(WagerOut { wager: clamp_wager(body.wager, body.score) })
}

/// Ratings export. Accepts any JSON so unknown shapes get a 400 with the
/// usual error body rather than the extractor's rejection.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_ratings(
  State(state): State<Arc<AppState>>,
  Json(body): Json<Value>,
) -> Result<Json<ExportOut>, ApiError> {
  let payload: ExportPayload = serde_json::from_value(body).map_err(|e| {
    warn!(target: "clueboard_backend", error = %e, "Invalid ratings export body");
    ApiError::new(StatusCode::BAD_REQUEST, "Invalid request format")
  })?;
  let entries = payload.into_entries();
  let written = append_export(state.store.as_ref(), &entries).map_err(|e| {
    error!(target: "clueboard_backend", error = %e, "Failed to save ratings export");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save rating")
  })?;
  let message = if written == 1 {
    "Rating saved successfully".to_string()
  } else {
    format!("{} ratings saved successfully", written)
  };
  Ok(Json(ExportOut { success: true, message }))
}
