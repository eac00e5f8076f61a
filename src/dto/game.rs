use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::GameEntity,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_rules},
    },
};

/// Full game record submitted by the add and edit forms.
///
/// Edits re-submit every field; there is no partial update.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GameInput {
    pub name: String,
    pub description: String,
    /// Selected labels, in selection order. Repeats are dropped, keeping the first.
    pub labels: Vec<String>,
    /// Ordered rule list.
    pub rules: Vec<String>,
}

impl GameInput {
    /// Labels without duplicates, first occurrence wins.
    pub fn normalized_labels(&self) -> Vec<String> {
        self.labels
            .iter()
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Validate for GameInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.name) {
            errors.add("name", e);
        }
        if let Err(e) = validate_not_blank(&self.description) {
            errors.add("description", e);
        }

        if self.labels.is_empty() {
            let mut err = ValidationError::new("labels_empty");
            err.message = Some("At least one label is required".into());
            errors.add("labels", err);
        } else if self.labels.iter().any(|label| label.trim().is_empty()) {
            let mut err = ValidationError::new("label_blank");
            err.message = Some("Labels must not be blank".into());
            errors.add("labels", err);
        }

        if let Err(e) = validate_rules(&self.rules) {
            errors.add("rules", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Card shown in the game list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameCard {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub labels: Vec<String>,
    pub stars: u32,
}

impl From<GameEntity> for GameCard {
    fn from(game: GameEntity) -> Self {
        Self {
            id: game.id,
            name: game.name,
            description: game.description,
            labels: game.labels,
            stars: game.stars,
        }
    }
}

/// Every field of one game, as shown by the detail view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub labels: Vec<String>,
    pub rules: Vec<String>,
    pub stars: u32,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl From<GameEntity> for GameDetail {
    fn from(game: GameEntity) -> Self {
        Self {
            id: game.id,
            name: game.name,
            description: game.description,
            labels: game.labels,
            rules: game.rules,
            stars: game.stars,
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
        }
    }
}

/// Ranked game list, with the quota banner when nothing could be shown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameListResponse {
    pub games: Vec<GameCard>,
    /// Present when the list is empty or failed to load; the two are not told apart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Outcome of a star toggle.
#[derive(Debug, Serialize, ToSchema)]
pub struct StarToggleResponse {
    pub game_id: Uuid,
    /// Whether the caller now stars the game.
    pub starred: bool,
    /// Aggregate star count after the toggle.
    pub stars: u32,
}

/// Games starred by the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct StarredGamesResponse {
    pub game_ids: Vec<Uuid>,
}
