//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Revealing and resolving clues (rating + difficulty recompute)
//!   - Editing clues and category titles (re-validated)
//!   - Building guidance and generating a new board through the LLM
//!   - Daily Double wager clamping

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::difficulty::{load_quality_log, recompute};
use crate::domain::{Board, Category, Clue, DifficultyAdjustment, Rating};
use crate::generation::{build_prompt, finalize_board, parse_board_response};
use crate::guidance::build_guidance;
use crate::llm::{GenerateOptions, LlmProvider, ProviderError};
use crate::rating::{self, Resolution};
use crate::seeds::fallback_board;
use crate::state::AppState;
use crate::validation::{log_format_issues, validate_clue, FormatIssue};

#[derive(Debug, Error)]
pub enum LogicError {
  #[error("no clue at category {category}, index {clue}")]
  ClueNotFound { category: usize, clue: usize },
  #[error("no category at index {0}")]
  CategoryNotFound(usize),
  #[error("category title must not be empty")]
  EmptyTitle,
  /// Soft specificity failure; the caller may resubmit with `force`.
  #[error("{0}")]
  TooVague(String),
  /// The clue was already resolved and the request did not ask to re-judge it.
  #[error("clue at category {category}, index {clue} is already answered")]
  AlreadyAnswered { category: usize, clue: usize },
}

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("board generation is disabled: no LLM API key configured")]
  Disabled,
  #[error("generation was cancelled")]
  Cancelled,
  #[error(transparent)]
  Provider(#[from] ProviderError),
}

/// Result of closing a clue.
#[derive(Debug, Clone)]
pub struct Resolved {
  pub clue: Clue,
  pub rating: Option<Rating>,
  pub adjustment: DifficultyAdjustment,
}

/// Replacement content for a clue. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ClueEdit {
  pub text: Option<String>,
  pub answer: Option<String>,
  pub daily_double: Option<bool>,
}

#[instrument(level = "info", skip(state))]
pub async fn reveal_clue(state: &AppState, category: usize, clue: usize) -> Result<Clue, LogicError> {
  let mut board = state.board.write().await;
  let c = board.clue_mut(category, clue).ok_or(LogicError::ClueNotFound { category, clue })?;
  c.revealed = true;
  debug!(target: "clueboard", category, clue, value = c.value, daily_double = c.daily_double, "Clue revealed");
  Ok(c.clone())
}

/// Closes a clue, records the outcome its resolution implies, and recomputes
/// the category's difficulty when a rating was recorded.
///
/// An answered clue is only judged again when `rejudge` is set; each
/// re-judgement appends another rating.
#[instrument(level = "info", skip(state))]
pub async fn resolve_clue(
  state: &AppState,
  category: usize,
  clue: usize,
  resolution: Resolution,
  rejudge: bool,
) -> Result<Resolved, LogicError> {
  let mut board = state.board.write().await;
  let cat = board.categories.get_mut(category).ok_or(LogicError::CategoryNotFound(category))?;
  let target = cat.clues.get_mut(clue).ok_or(LogicError::ClueNotFound { category, clue })?;
  if target.answered && !rejudge {
    return Err(LogicError::AlreadyAnswered { category, clue });
  }

  let rating = rating::resolve_clue(target, resolution);
  let resolved_clue = target.clone();

  let adjustment = if let Some(r) = &rating {
    info!(target: "clueboard", category = %cat.title, value = resolved_clue.value, outcome = %r.outcome, "Clue rated");
    let mut difficulty = state.difficulty.write().await;
    recompute(cat, &mut difficulty, state.store.as_ref())
  } else {
    debug!(target: "clueboard", category = %cat.title, value = resolved_clue.value, "Clue closed without a rating");
    cat.difficulty_adjustment.clone()
  };

  if board.all_answered() {
    info!(target: "clueboard", board = %board.id, "All clues answered");
  }
  Ok(Resolved { clue: resolved_clue, rating, adjustment })
}

/// Re-validates edited content. Word-exclusion violations are saved with the
/// flag set; vague clues are only saved when `force` is set.
#[instrument(level = "info", skip(state, edit))]
pub async fn edit_clue(
  state: &AppState,
  category: usize,
  clue: usize,
  edit: ClueEdit,
  force: bool,
) -> Result<Clue, LogicError> {
  let mut board = state.board.write().await;
  let cat = board.categories.get_mut(category).ok_or(LogicError::CategoryNotFound(category))?;
  let title = cat.title.clone();
  let target = cat.clues.get_mut(clue).ok_or(LogicError::ClueNotFound { category, clue })?;

  let text = edit.text.unwrap_or_else(|| target.text.clone());
  let answer = edit.answer.unwrap_or_else(|| target.answer.clone());
  let result = validate_clue(&title, &text, &answer);

  if let Some(reason) = result.violation() {
    log_format_issues(state.store.as_ref(), &[FormatIssue::new(&title, &text, &answer, &reason)]);
    if result.is_vague() && !force {
      warn!(target: "clueboard", category = %title, "Edit rejected as too vague");
      return Err(LogicError::TooVague(reason));
    }
    warn!(target: "clueboard", category = %title, %reason, forced = force, "Saving clue with rule violation");
  }

  target.text = text;
  target.answer = answer;
  target.rule_violation = result.violation();
  if let Some(dd) = edit.daily_double {
    target.daily_double = dd;
  }
  Ok(target.clone())
}

#[instrument(level = "info", skip(state))]
pub async fn edit_category_title(state: &AppState, category: usize, title: &str) -> Result<Category, LogicError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(LogicError::EmptyTitle);
  }
  let mut board = state.board.write().await;
  let cat = board.categories.get_mut(category).ok_or(LogicError::CategoryNotFound(category))?;
  info!(target: "clueboard", from = %cat.title, to = %title, "Category renamed");
  cat.title = title.to_string();
  Ok(cat.clone())
}

/// Guidance text the next generation request would carry.
pub async fn current_guidance(state: &AppState) -> String {
  let titles = state.board.read().await.titles();
  let difficulty = state.difficulty.read().await;
  let history = load_quality_log(state.store.as_ref());
  build_guidance(&titles, &difficulty, &history)
}

/// Generates and installs a new board. A request cancelled (or superseded)
/// while the model call is in flight leaves the current board untouched.
#[instrument(level = "info", skip(state, reference_text), fields(reference_len = reference_text.len()))]
pub async fn generate_board(state: &AppState, reference_text: &str) -> Result<Board, GenerationError> {
  let provider = state.provider.clone().ok_or(GenerationError::Disabled)?;
  let ticket = state.begin_generation();

  let titles = state.board.read().await.titles();
  let guidance = current_guidance(state).await;
  if !guidance.is_empty() {
    debug!(target: "clueboard", guidance_len = guidance.len(), "Including difficulty guidance");
  }
  let prompt = build_prompt(&state.prompts, &titles, reference_text, &guidance);

  let raw = generate_with_retry(state, provider.as_ref(), &prompt, ticket).await?;
  if !state.is_current(ticket) {
    info!(target: "clueboard", ticket, "Discarding stale generation response");
    return Err(GenerationError::Cancelled);
  }

  let categories = match parse_board_response(&raw) {
    Some(c) => c,
    None => {
      warn!(target: "clueboard", "Could not parse model reply; using fallback board");
      fallback_board().categories
    }
  };

  let (new_board, issues) = {
    let difficulty = state.difficulty.read().await;
    finalize_board(categories, &difficulty, &mut rand::thread_rng())
  };

  {
    let mut board = state.board.write().await;
    if !state.is_current(ticket) {
      info!(target: "clueboard", ticket, "Discarding stale generation response");
      return Err(GenerationError::Cancelled);
    }
    *board = new_board.clone();
  }

  if !issues.is_empty() {
    log_format_issues(state.store.as_ref(), &issues);
  }
  info!(target: "clueboard", board = %new_board.id, violations = issues.len(), provider = provider.name(), "New board installed");
  Ok(new_board)
}

/// Retries transient provider failures with exponential backoff. Gives up
/// early if the request goes stale while waiting.
async fn generate_with_retry(
  state: &AppState,
  provider: &dyn LlmProvider,
  prompt: &str,
  ticket: u64,
) -> Result<String, GenerationError> {
  let settings = &state.generation;
  let options = GenerateOptions { temperature: settings.temperature, max_tokens: settings.max_tokens };
  let mut backoff = Duration::from_millis(settings.initial_backoff_ms);
  let mut attempt = 0u32;

  loop {
    match provider.generate(prompt, &options).await {
      Ok(text) => return Ok(text),
      Err(e) if e.is_transient() && attempt < settings.max_retries => {
        attempt += 1;
        warn!(target: "clueboard", provider = provider.name(), attempt, kind = e.category(), error = %e, backoff_ms = backoff.as_millis() as u64, "Transient provider error; retrying");
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2);
        if !state.is_current(ticket) {
          return Err(GenerationError::Cancelled);
        }
      }
      Err(e) => {
        error!(target: "clueboard", provider = provider.name(), attempts = attempt + 1, kind = e.category(), error = %e, "Board generation failed");
        return Err(e.into());
      }
    }
  }
}

/// Daily Double wager: at least 100, at most max(score, 1000), rounded to
/// the nearest 100.
pub fn clamp_wager(wager: i64, player_score: i64) -> i64 {
  let max = player_score.max(1000);
  let clamped = wager.clamp(100, max);
  clamped.saturating_add(50).div_euclid(100) * 100
}
