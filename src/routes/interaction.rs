use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

use super::classifier::CategoryId;

/// Basemap styles the map can be switched between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeId {
    Positron,
    DarkMatter,
    Voyager,
}

impl ThemeId {
    pub const ALL: [ThemeId; 3] = [ThemeId::Positron, ThemeId::DarkMatter, ThemeId::Voyager];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeId::Positron => "positron",
            ThemeId::DarkMatter => "dark-matter",
            ThemeId::Voyager => "voyager",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemeId::Positron => "Light",
            ThemeId::DarkMatter => "Dark",
            ThemeId::Voyager => "Voyager",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, ThemeId::DarkMatter)
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeId {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeId::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s)
            .ok_or_else(|| RouteError::NotFound(format!("theme '{}'", s)))
    }
}

/// Parses a highlight control value: a category id, or `none` to clear.
pub fn parse_highlight(value: &str) -> Option<CategoryId> {
    match value.trim() {
        "" | "none" => None,
        id => Some(CategoryId::new(id)),
    }
}

/// Theme and highlight the user currently has selected.
#[derive(Debug, Clone)]
pub struct InteractionState {
    theme: ThemeId,
    highlighted: Option<CategoryId>,
}

impl InteractionState {
    pub fn new(theme: ThemeId) -> Self {
        Self {
            theme,
            highlighted: None,
        }
    }

    pub fn theme(&self) -> ThemeId {
        self.theme
    }

    pub fn highlighted(&self) -> Option<&CategoryId> {
        self.highlighted.as_ref()
    }

    /// Returns `false` when `theme` is already selected.
    pub fn set_theme(&mut self, theme: ThemeId) -> bool {
        if self.theme == theme {
            return false;
        }
        self.theme = theme;
        true
    }

    /// Returns `false` when the highlight is unchanged.
    pub fn set_highlight(&mut self, category: Option<CategoryId>) -> bool {
        if self.highlighted == category {
            return false;
        }
        self.highlighted = category;
        true
    }
}
