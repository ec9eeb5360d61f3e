//! Application state: the live board, the difficulty store, persistence, the
//! optional LLM provider, prompts, and the generation epoch.
//!
//! Handlers share one `Arc<AppState>`. The board and difficulty store sit
//! behind `tokio::sync::RwLock`; when both are needed the board lock is always
//! taken first.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::{data_dir_from_env, load_agent_config_from_env, AgentConfig, GenerationSettings, Prompts};
use crate::difficulty::DifficultyStore;
use crate::domain::Board;
use crate::llm::{provider_from_env, LlmProvider};
use crate::seeds::default_board;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

/// `DATA_DIR` value that selects the in-memory store.
const IN_MEMORY_DATA_DIR: &str = ":memory:";

pub struct AppState {
    pub board: RwLock<Board>,
    pub difficulty: RwLock<DifficultyStore>,
    pub store: Arc<dyn KeyValueStore>,
    pub provider: Option<Arc<dyn LlmProvider>>,
    pub prompts: Prompts,
    pub generation: GenerationSettings,
    generation_epoch: AtomicU64,
}

impl AppState {
    /// Build state from env: load config, open the data directory, init the provider.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let data_dir = data_dir_from_env();
        let store: Arc<dyn KeyValueStore> = if data_dir.as_os_str() == IN_MEMORY_DATA_DIR {
            info!(target: "clueboard_backend", "Using in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        } else {
            info!(target: "clueboard_backend", data_dir = %data_dir.display(), "Using JSON file store");
            Arc::new(JsonFileStore::new(data_dir))
        };

        let provider = provider_from_env();
        if provider.is_none() {
            info!(target: "clueboard_backend", "LLM disabled (no LLM_API_KEY / OPENAI_API_KEY). Board generation unavailable.");
        }

        Self::with_parts(store, provider, cfg)
    }

    /// Assemble state from explicit collaborators. The starting board picks up
    /// any adjustments already stored for its categories.
    pub fn with_parts(
        store: Arc<dyn KeyValueStore>,
        provider: Option<Arc<dyn LlmProvider>>,
        cfg: AgentConfig,
    ) -> Self {
        let difficulty = DifficultyStore::load(store.as_ref());

        let mut board = default_board();
        for cat in board.categories.iter_mut() {
            if let Some((_, adj)) = difficulty.find_match(&cat.title) {
                cat.difficulty_adjustment = adj.clone();
            }
        }

        Self {
            board: RwLock::new(board),
            difficulty: RwLock::new(difficulty),
            store,
            provider,
            prompts: cfg.prompts,
            generation: cfg.generation,
            generation_epoch: AtomicU64::new(0),
        }
    }

    /// Ticket for a new generation request. Any older ticket becomes stale.
    pub fn begin_generation(&self) -> u64 {
        self.generation_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidates whatever generation is in flight.
    pub fn cancel_generation(&self) {
        let epoch = self.generation_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(target: "clueboard", epoch, "Generation cancelled");
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.generation_epoch.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DifficultyAdjustment;

    #[test]
    fn newer_ticket_or_cancel_makes_older_ticket_stale() {
        let state = AppState::with_parts(Arc::new(MemoryStore::new()), None, AgentConfig::default());
        let first = state.begin_generation();
        assert!(state.is_current(first));

        let second = state.begin_generation();
        assert!(!state.is_current(first));
        assert!(state.is_current(second));

        state.cancel_generation();
        assert!(!state.is_current(second));
    }

    #[tokio::test]
    async fn starting_board_applies_stored_adjustments() {
        let store = Arc::new(MemoryStore::new());
        let mut d = DifficultyStore::default();
        let mut adj = DifficultyAdjustment::default();
        adj.set(400, 1);
        d.merge("Science", adj.clone());
        d.save(store.as_ref()).expect("save");

        let state = AppState::with_parts(store, None, AgentConfig::default());
        let board = state.board.read().await;
        let science = board.categories.iter().find(|c| c.title == "Science").expect("science");
        assert_eq!(science.difficulty_adjustment, adj);
    }
}
