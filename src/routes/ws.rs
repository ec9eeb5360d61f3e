//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! Board generation runs in a spawned task so the socket keeps reading (a
//! `cancel_generation` can arrive while the model call is in flight); its
//! result is delivered through a channel.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::validation::validate_clue;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "clueboard_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "clueboard_backend", "WebSocket connected");
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerWsMessage>();

  loop {
    let reply_msg = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "clueboard_backend", "WS received: {:?}", &msg);
            handle_client_ws(msg, &state, &tx).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
        Some(Ok(_)) => continue,
      },
      Some(out) = rx.recv() => out,
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "clueboard_backend", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "clueboard_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, tx))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &Arc<AppState>,
  tx: &mpsc::UnboundedSender<ServerWsMessage>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetBoard => ServerWsMessage::Board { board: state.board.read().await.clone() },

    ClientWsMessage::GenerateBoard { reference_text } => {
      let state = state.clone();
      let tx = tx.clone();
      tokio::spawn(async move {
        let reply = match generate_board(&state, &reference_text).await {
          Ok(board) => ServerWsMessage::Board { board },
          Err(GenerationError::Cancelled) => ServerWsMessage::GenerationCancelled,
          Err(e) => ServerWsMessage::Error { message: e.to_string() },
        };
        // Receiver is gone if the socket closed meanwhile.
        let _ = tx.send(reply);
      });
      ServerWsMessage::GenerationStarted
    }

    ClientWsMessage::CancelGeneration => {
      state.cancel_generation();
      ServerWsMessage::GenerationCancelled
    }

    ClientWsMessage::RevealClue(r) => match reveal_clue(state, r.category, r.clue).await {
      Ok(clue) => ServerWsMessage::Clue { clue },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::ResolveClue(r) => match resolve_clue(state, r.category, r.clue, r.resolution, r.rejudge).await {
      Ok(resolved) => ServerWsMessage::Resolved(resolved.into()),
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::EditClue(e) => match edit_clue(state, e.category, e.clue, e.edit(), e.force).await {
      Ok(clue) => ServerWsMessage::Clue { clue },
      Err(err) => ServerWsMessage::Error { message: err.to_string() },
    },

    ClientWsMessage::EditCategory(e) => match edit_category_title(state, e.category, &e.title).await {
      Ok(category) => ServerWsMessage::Category { category },
      Err(err) => ServerWsMessage::Error { message: err.to_string() },
    },

    ClientWsMessage::Validate(v) => ServerWsMessage::Validation(validate_clue(&v.category, &v.clue, &v.answer)),

    ClientWsMessage::GetGuidance => ServerWsMessage::Guidance { text: current_guidance(state).await },

    ClientWsMessage::GetDifficulty => ServerWsMessage::Difficulty { adjustments: state.difficulty.read().await.clone() },

    ClientWsMessage::Wager(w) => ServerWsMessage::Wager { wager: clamp_wager(w.wager, w.score) },
  }
}
