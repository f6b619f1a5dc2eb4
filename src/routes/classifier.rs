use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

use super::features::{PaintExpression, PaintValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub width: f32,
    pub color: Rgb,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceCategory {
    pub id: CategoryId,
    pub label: String,
    pub min_km: f64,
    /// Exclusive upper bound, `None` for the last category.
    pub max_km: Option<f64>,
    pub style: LineStyle,
}

impl DistanceCategory {
    pub fn contains(&self, distance_km: f64) -> bool {
        distance_km >= self.min_km && self.max_km.map_or(true, |max| distance_km < max)
    }
}

/// Paint values a renderer applies to the route layer for the current highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightPaint {
    pub opacity: PaintExpression,
    pub width: PaintExpression,
}

// Opacity for routes outside the highlighted category
const DIMMED_OPACITY: f64 = 0.12;
const HIGHLIGHT_WIDTH_FACTOR: f64 = 1.6;

/// Buckets great-circle distances into an ordered partition of `[0, inf)`.
#[derive(Debug, Clone)]
pub struct DistanceClassifier {
    categories: Vec<DistanceCategory>,
}

impl Default for DistanceClassifier {
    fn default() -> Self {
        Self {
            categories: standard_categories(),
        }
    }
}

impl DistanceClassifier {
    /// Validates that `categories` partition `[0, inf)` without gaps or overlaps.
    pub fn new(categories: Vec<DistanceCategory>) -> Result<Self, RouteError> {
        let Some(first) = categories.first() else {
            return Err(RouteError::Configuration("no distance categories".into()));
        };
        if first.min_km != 0.0 {
            return Err(RouteError::Configuration(format!(
                "first category '{}' starts at {} km instead of 0",
                first.id, first.min_km
            )));
        }

        let last = categories.len() - 1;
        for (i, category) in categories.iter().enumerate() {
            match category.max_km {
                None if i != last => {
                    return Err(RouteError::Configuration(format!(
                        "category '{}' is unbounded but is not the last one",
                        category.id
                    )));
                }
                None => {}
                Some(_) if i == last => {
                    return Err(RouteError::Configuration(format!(
                        "last category '{}' must be unbounded",
                        category.id
                    )));
                }
                Some(max) => {
                    if !(max > category.min_km) {
                        return Err(RouteError::Configuration(format!(
                            "category '{}' has an empty range [{}, {})",
                            category.id, category.min_km, max
                        )));
                    }
                    let next = &categories[i + 1];
                    if next.min_km != max {
                        return Err(RouteError::Configuration(format!(
                            "categories '{}' and '{}' do not meet ({} km vs {} km)",
                            category.id, next.id, max, next.min_km
                        )));
                    }
                }
            }
            if categories[..i].iter().any(|c| c.id == category.id) {
                return Err(RouteError::Configuration(format!("duplicate category id '{}'", category.id)));
            }
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[DistanceCategory] {
        &self.categories
    }

    pub fn category(&self, id: &CategoryId) -> Result<&DistanceCategory, RouteError> {
        self.categories
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| RouteError::NotFound(format!("distance category '{}'", id)))
    }

    pub fn classify(&self, distance_km: f64) -> Result<&DistanceCategory, RouteError> {
        if !(distance_km >= 0.0) {
            return Err(RouteError::InvalidArgument(format!("distance must be non-negative, got {}", distance_km)));
        }
        // Categories are contiguous, so the match is the last one starting at or below the distance
        let index = self.categories.partition_point(|c| c.min_km <= distance_km);
        Ok(&self.categories[index - 1])
    }

    pub fn style_for(&self, category: &DistanceCategory) -> LineStyle {
        category.style
    }

    /// Opacity and width expressions for the route layer.
    ///
    /// With no highlight, every route uses its own computed style. With a
    /// highlight, routes of that category are widened and everything else is
    /// dimmed.
    pub fn highlight_expression_for(&self, category: Option<&DistanceCategory>) -> HighlightPaint {
        match category {
            None => HighlightPaint {
                opacity: PaintExpression::get("opacity"),
                width: PaintExpression::get("width"),
            },
            Some(category) => HighlightPaint {
                opacity: PaintExpression::match_category(
                    &category.id,
                    PaintExpression::Literal(PaintValue::Number(1.0)),
                    PaintExpression::Literal(PaintValue::Number(DIMMED_OPACITY)),
                ),
                width: PaintExpression::match_category(
                    &category.id,
                    PaintExpression::Literal(PaintValue::Number(category.style.width as f64 * HIGHLIGHT_WIDTH_FACTOR)),
                    PaintExpression::get("width"),
                ),
            },
        }
    }
}

fn standard_categories() -> Vec<DistanceCategory> {
    let category = |id: &str, label: &str, min_km: f64, max_km: Option<f64>, width: f32, color: Rgb| DistanceCategory {
        id: CategoryId::new(id),
        label: label.to_string(),
        min_km,
        max_km,
        style: LineStyle {
            width,
            color,
            opacity: 0.8,
        },
    };

    vec![
        category("short", "Short (< 2,000 km)", 0.0, Some(2_000.0), 1.5, Rgb::new(0x2a, 0x9d, 0x8f)),
        category("medium", "Medium (2,000 - 6,000 km)", 2_000.0, Some(6_000.0), 2.0, Rgb::new(0xe9, 0xc4, 0x6a)),
        category("long", "Long (6,000 - 12,000 km)", 6_000.0, Some(12_000.0), 2.5, Rgb::new(0xf4, 0xa2, 0x61)),
        category("ultra-long", "Ultra long (> 12,000 km)", 12_000.0, None, 3.0, Rgb::new(0xe7, 0x6f, 0x51)),
    ]
}
