//! Loading agent configuration (prompts + generation settings) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `GenerationSettings` for expected schema.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
}

/// Prompt text sent to the model. `board_template` accepts `{reference}`,
/// `{categories}` and `{guidance}` placeholders.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system_message: String,
  pub board_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system_message: DEFAULT_SYSTEM_MESSAGE.into(),
      board_template: DEFAULT_BOARD_TEMPLATE.into(),
    }
  }
}

/// Retry and sampling knobs for board generation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  /// Extra attempts after the first one, for transient provider errors only.
  pub max_retries: u32,
  pub initial_backoff_ms: u64,
  pub temperature: f32,
  pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self { max_retries: 4, initial_backoff_ms: 1000, temperature: 0.7, max_tokens: Some(4000) }
  }
}

/// Attempt to load `AgentConfig` from CLUEBOARD_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("CLUEBOARD_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "clueboard_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "clueboard_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "clueboard_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// DATA_DIR, default `./data`.
pub fn data_dir_from_env() -> PathBuf {
  std::env::var("DATA_DIR")
    .ok()
    .filter(|s| !s.trim().is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("./data"))
}

const DEFAULT_SYSTEM_MESSAGE: &str = "You are a Jeopardy! game creator tasked with generating well-structured, diverse Jeopardy! boards that follow the conventions and expectations of the game show. Your goal is to create categories, clues, and correct question-answer pairs that align with Jeopardy! standards.

The key principles are as follows:
* Clarity & Precision: Ensure that all clues and question-answer pairs are clear, precise, and avoid ambiguity. There should be no room for misinterpretation of the clue's intent.
* Specificity: Clues must lead to ONE unambiguous answer. Avoid vague clues that could reasonably accept multiple answers. Bad example: \"This East Asian country is known for its unique blend of traditional and modern culture\" - too vague, could be Japan, South Korea, China, etc. Good example: \"Home to Samsung and Hyundai, this East Asian country has Seoul as its capital\" - clearly points to South Korea only.
* Variety & Creativity: Strive for a high level of variance in categories and clues. Avoid predictable, overused references, and ensure diversity across subject areas, from literature to science, pop culture, history, and beyond.
* No Repetition: Each clue-question pair should be unique within the board. No duplication of answers or subjects should occur across categories.
* Ground Truth Only: All clues must reflect accurate, verifiable information. Double-check facts to ensure correctness, and do not leave any opportunity for controversial interpretations of the clues.
* Jeopardy! Rhetoric: Maintain the distinct Jeopardy! style in phrasing. Clues should be framed as statements, with the contestants providing the correct response in the form of a question.
* Progressive Difficulty: The difficulty of questions should gradually increase corresponding to their dollar values. $200 questions should be easier, while $1000 questions should be more challenging, with a smooth gradient of difficulty for $400, $600, and $800 questions.
* Avoid Redundancy in Themes: While categories may overlap in general topics (e.g., animals or countries), ensure the content within those categories does not repeat.
* Maintain Clue Integrity: Do not reveal the answer to the clue in its explicit language. Category titles should NOT contain the answer or give away the solution to any clue.
* STRICT WORD EXCLUSION RULE: The correct response/answer MUST NOT contain any words that appear in the clue or category. For example, if the clue mentions \"Greenwich Village\" then \"Greenwich Village\" cannot be part of the correct response. Ensure each answer refers to a specific, historically accurate entity or concept related to but not mentioned in the clue. Bad example: Category \"Neighborhoods\" with clue \"This Greenwich Village area was the epicenter of the Stonewall Riots\" and answer \"What is Greenwich Village?\" - this is incorrect because the answer repeats words from the clue. Good example: Category \"LGBTQ+ History\" with clue \"This 1969 uprising in Greenwich Village marked a turning point in the fight for gay rights\" and answer \"What are the Stonewall Riots?\" - this is correct because the answer doesn't repeat words from the clue.";

const DEFAULT_BOARD_TEMPLATE: &str = r#"Create a new Jeopardy game board with EXACTLY 6 creative categories.
Use the following reference content for creating specialized categories and questions: {reference}

The current board's categories are: {categories}. Create entirely new ones.

For each category, create 5 clues with values from $200 to $1000, ensuring they increase in difficulty.

Important:
- YOU MUST CREATE EXACTLY 6 CATEGORIES, no more and no less
- Create entirely new category titles that are clever and engaging
- Clues should be statements or facts, NOT questions
- Responses should always start with "What is" or "Who is" etc.
- Do not include the answer within the clue text
- Make sure clues don't give away the answer directly
- Include a balanced mix of topics and difficulty levels
- Mark EXACTLY 2 clues total as "dailyDouble: true" (these are special high-value clues)
- Do not add more than 2 Daily Doubles in total across all categories
{guidance}
Format your response as JSON with this exact structure:
{
  "categories": [
    {
      "title": "Category Name",
      "questions": [
        {
          "text": "The clue text that would be shown to contestants",
          "answer": "What is the correct response?",
          "value": 200,
          "dailyDouble": false
        },
        ... and so on for values 400, 600, 800, 1000
      ]
    },
    ... repeat for exactly 6 categories, numbered from 0 to 5
  ]
}

IMPORTANT REQUIREMENTS:
1. The response MUST include EXACTLY 6 categories in the "categories" array.
2. There MUST be EXACTLY 2 questions total marked as dailyDouble: true across all categories."#;
