//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::difficulty::DifficultyStore;
use crate::domain::{Board, Category, Clue, DifficultyAdjustment, Rating};
use crate::logic::{ClueEdit, Resolved};
use crate::rating::Resolution;
use crate::validation::ValidationResult;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetBoard,
    GenerateBoard {
        #[serde(default, rename = "referenceText")]
        reference_text: String,
    },
    CancelGeneration,
    RevealClue(ClueRef),
    ResolveClue(ResolveIn),
    EditClue(EditClueIn),
    EditCategory(EditCategoryIn),
    Validate(ValidateIn),
    GetGuidance,
    GetDifficulty,
    Wager(WagerIn),
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Board {
        board: Board,
    },
    GenerationStarted,
    GenerationCancelled,
    Clue {
        clue: Clue,
    },
    Resolved(ResolveOut),
    Category {
        category: Category,
    },
    Validation(ValidationResult),
    Guidance {
        text: String,
    },
    Difficulty {
        adjustments: DifficultyStore,
    },
    Wager {
        wager: i64,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs (also embedded in WS messages)
//

#[derive(Debug, Deserialize)]
pub struct ClueRef {
    pub category: usize,
    pub clue: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default, rename = "referenceText")]
    pub reference_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveIn {
    pub category: usize,
    pub clue: usize,
    pub resolution: Resolution,
    /// Judge an already-answered clue again (adds another rating).
    #[serde(default)]
    pub rejudge: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOut {
    pub clue: Clue,
    pub rating: Option<Rating>,
    pub difficulty_adjustment: DifficultyAdjustment,
}

impl From<Resolved> for ResolveOut {
    fn from(r: Resolved) -> Self {
        Self { clue: r.clue, rating: r.rating, difficulty_adjustment: r.adjustment }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditClueIn {
    pub category: usize,
    pub clue: usize,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub daily_double: Option<bool>,
    /// Save even if the clue is flagged as too vague.
    #[serde(default)]
    pub force: bool,
}

impl EditClueIn {
    pub fn edit(&self) -> ClueEdit {
        ClueEdit { text: self.text.clone(), answer: self.answer.clone(), daily_double: self.daily_double }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditCategoryIn {
    pub category: usize,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateIn {
    pub category: String,
    pub clue: String,
    pub answer: String,
}

#[derive(Serialize)]
pub struct GuidanceOut {
    pub guidance: String,
}

#[derive(Debug, Deserialize)]
pub struct WagerIn {
    pub wager: i64,
    #[serde(default)]
    pub score: i64,
}
#[derive(Serialize)]
pub struct WagerOut {
    pub wager: i64,
}

#[derive(Serialize)]
pub struct ExportOut {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub ok: bool,
    pub message: String,
}
