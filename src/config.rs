use std::str::FromStr;

use crate::error::RouteError;
use crate::routes::classifier::CategoryId;
use crate::routes::interaction::{parse_highlight, ThemeId};

const DEFAULT_ARC_STEPS: usize = 64;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// URL or file path of the capital records; the bundled set when unset.
    pub capitals_source: Option<String>,
    /// Segments per great-circle arc.
    pub arc_steps: usize,
    /// Starting origin; the first capital in the data when unset.
    pub default_origin: Option<String>,
    pub default_theme: ThemeId,
    /// Distance category highlighted at startup.
    pub default_highlight: Option<CategoryId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capitals_source: None,
            arc_steps: DEFAULT_ARC_STEPS,
            default_origin: None,
            default_theme: ThemeId::Positron,
            default_highlight: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, RouteError> {
        // A missing .env file is fine
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RouteError> {
        let defaults = Self::default();

        let arc_steps = match lookup("ARC_STEPS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(steps) if steps >= 1 => steps,
                _ => return Err(RouteError::Configuration(format!("ARC_STEPS must be a positive integer, got '{}'", raw))),
            },
            None => defaults.arc_steps,
        };

        let default_theme = match lookup("DEFAULT_THEME") {
            Some(raw) => ThemeId::from_str(raw.trim())
                .map_err(|_| RouteError::Configuration(format!("DEFAULT_THEME '{}' is not a known theme", raw)))?,
            None => defaults.default_theme,
        };

        Ok(Self {
            capitals_source: lookup("CAPITALS_SOURCE").filter(|s| !s.trim().is_empty()),
            arc_steps,
            default_origin: lookup("DEFAULT_ORIGIN").filter(|o| !o.trim().is_empty()),
            default_theme,
            default_highlight: lookup("DEFAULT_HIGHLIGHT").and_then(|raw| parse_highlight(&raw)),
        })
    }
}
