use tokio::sync::oneshot;

use crate::routes::features::{FeatureCollection, PaintExpression};
use crate::routes::interaction::ThemeId;

pub const ORIGIN_SOURCE: &str = "origin";
pub const ROUTE_SOURCE: &str = "route";
pub const CAPITALS_SOURCE: &str = "capitals";

pub const ROUTE_LAYER: &str = "route-lines";
pub const CAPITALS_LAYER: &str = "capital-points";
pub const ORIGIN_LAYER: &str = "origin-point";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Line,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintProperty {
    LineColor,
    LineWidth,
    LineOpacity,
    CircleColor,
    CircleRadius,
    CircleOpacity,
}

/// A drawable layer bound to one source.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
    pub paint: Vec<(PaintProperty, PaintExpression)>,
}

impl LayerSpec {
    pub fn new(id: &str, source: &str, kind: LayerKind) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            kind,
            paint: Vec::new(),
        }
    }

    pub fn paint(mut self, property: PaintProperty, expression: PaintExpression) -> Self {
        self.set_paint(property, expression);
        self
    }

    pub fn set_paint(&mut self, property: PaintProperty, expression: PaintExpression) {
        match self.paint.iter_mut().find(|(p, _)| *p == property) {
            Some((_, existing)) => *existing = expression,
            None => self.paint.push((property, expression)),
        }
    }

    pub fn paint_for(&self, property: PaintProperty) -> Option<&PaintExpression> {
        self.paint.iter().find(|(p, _)| *p == property).map(|(_, e)| e)
    }
}

/// What the route layer needs from a map renderer.
///
/// Interaction events (capital clicks, theme and highlight picks) reach the
/// controller through its event channel; the only per-call listener is the
/// one-shot style-ready signal returned by [`MapWidget::set_style`].
pub trait MapWidget {
    /// Adds or replaces the named geometry source.
    fn set_source(&mut self, id: &str, data: FeatureCollection);

    /// Data currently attached to a source, if any.
    fn source_data(&self, id: &str) -> Option<FeatureCollection>;

    /// Adds a layer, replacing any layer with the same id.
    fn add_layer(&mut self, layer: LayerSpec);

    /// Updates one paint property of an existing layer. Unknown layers are ignored.
    fn set_paint_property(&mut self, layer: &str, property: PaintProperty, expression: PaintExpression);

    /// Starts a full style swap. Sources and layers are discarded; the
    /// receiver resolves once the new style is ready for data again.
    fn set_style(&mut self, theme: ThemeId) -> oneshot::Receiver<()>;
}
