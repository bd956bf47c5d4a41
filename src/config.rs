use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Planner knobs with validation.
///
/// The surrounding binary surfaces these as command-line flags; inside the
/// library they arrive through [`PlanningContext`](crate::query_planner::PlanningContext).
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum count of indexed vertices which provoke indexed lookup and
    /// then expand to existing, instead of a regular expand. Use -1 to turn
    /// the rule off.
    #[validate(range(min = -1, message = "Expand-existing threshold must be -1 or larger"))]
    pub vertex_count_to_expand_existing: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            vertex_count_to_expand_existing: 10,
        }
    }
}

impl PlannerConfig {
    pub fn expand_existing_enabled(&self) -> bool {
        self.vertex_count_to_expand_existing >= 0
    }

    /// Loads the defaults and applies any `PLANNER_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(value) = env::var("PLANNER_VERTEX_COUNT_TO_EXPAND_EXISTING") {
            config.vertex_count_to_expand_existing =
                value.parse().map_err(|source: std::num::ParseIntError| ConfigError::Parse {
                    field: "vertex_count_to_expand_existing".to_string(),
                    value,
                    source: Box::new(source),
                })?;
        }
        config.validate()?;
        Ok(config)
    }
}
