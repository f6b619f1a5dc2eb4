use std::collections::HashMap;

use egui::epaint::{Color32, Pos2, Rect, Shape, Stroke};
use egui::{pos2, Response, Sense, Ui, Vec2, Widget};
use log::debug;
use tokio::sync::oneshot;

use crate::geo::coordinate::Coordinate;
use crate::maps_api::map_widget::{LayerKind, LayerSpec, MapWidget, PaintProperty, CAPITALS_SOURCE};
use crate::routes::features::{Feature, FeatureCollection, Geometry, PaintExpression, PaintValue};
use crate::routes::interaction::ThemeId;

// Pointer distance (px) within which a capital marker counts as hit
const PICK_RADIUS: f32 = 8.0;
const MAX_ZOOM: f32 = 6.0;

/// Pan and zoom of one map widget. Kept in egui temp memory, not persisted.
#[derive(Clone, Copy, Debug)]
pub struct MapState {
    center: Coordinate,
    zoom: f32,
    dragging: bool,
    drag_start: Option<Pos2>,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            center: Coordinate::new(20.0, 0.0),
            zoom: 0.0,
            dragging: false,
            drag_start: None,
        }
    }
}

impl MapState {
    pub fn load(ctx: &egui::Context, id: egui::Id) -> Self {
        ctx.data_mut(|d| d.get_temp::<Self>(id).unwrap_or_default())
    }

    pub fn store(self, ctx: &egui::Context, id: egui::Id) {
        ctx.data_mut(|d| d.insert_temp(id, self));
    }

    fn pixels_per_degree(&self, viewport: Rect) -> f32 {
        viewport.width() / 360.0 * 2.0f32.powf(self.zoom)
    }

    /// Equirectangular projection of `coordinate` into `viewport`.
    fn project(&self, viewport: Rect, coordinate: &Coordinate) -> Pos2 {
        let ppd = self.pixels_per_degree(viewport);
        let center = viewport.center();
        pos2(
            center.x + (coordinate.longitude() - self.center.longitude()) as f32 * ppd,
            center.y - (coordinate.latitude() - self.center.latitude()) as f32 * ppd,
        )
    }
}

/// Retained map contents: what the route controller attached, drawn by [`Map`].
pub struct MapView {
    theme: ThemeId,
    sources: HashMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    pending_style: Option<(ThemeId, oneshot::Sender<()>)>,
}

impl MapView {
    pub fn new(theme: ThemeId) -> Self {
        Self {
            theme,
            sources: HashMap::new(),
            layers: Vec::new(),
            pending_style: None,
        }
    }

    pub fn theme(&self) -> ThemeId {
        self.theme
    }

    pub fn is_loading_style(&self) -> bool {
        self.pending_style.is_some()
    }

    /// Signals that a requested style is ready for data. Called once per frame,
    /// so a swap always completes on the frame after it was requested.
    pub fn finish_style_load(&mut self) {
        if let Some((theme, ready)) = self.pending_style.take() {
            debug!("Style {} loaded", theme);
            if ready.send(()).is_err() {
                debug!("Nobody is waiting for style {}", theme);
            }
        }
    }

    fn capital_at(&self, state: &MapState, viewport: Rect, pointer: Pos2) -> Option<&Feature> {
        let capitals = self.sources.get(CAPITALS_SOURCE)?;
        capitals
            .features
            .iter()
            .filter_map(|feature| match &feature.geometry {
                Geometry::Point(point) => Some((feature, state.project(viewport, point).distance(pointer))),
                _ => None,
            })
            .filter(|(_, distance)| *distance <= PICK_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(feature, _)| feature)
    }
}

impl MapWidget for MapView {
    fn set_source(&mut self, id: &str, data: FeatureCollection) {
        self.sources.insert(id.to_string(), data);
    }

    fn source_data(&self, id: &str) -> Option<FeatureCollection> {
        self.sources.get(id).cloned()
    }

    fn add_layer(&mut self, layer: LayerSpec) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    fn set_paint_property(&mut self, layer: &str, property: PaintProperty, expression: PaintExpression) {
        match self.layers.iter_mut().find(|l| l.id == layer) {
            Some(layer) => layer.set_paint(property, expression),
            None => debug!("No layer {} to paint", layer),
        }
    }

    fn set_style(&mut self, theme: ThemeId) -> oneshot::Receiver<()> {
        // A new style drops everything attached to the old one
        self.theme = theme;
        self.sources.clear();
        self.layers.clear();

        let (ready, receiver) = oneshot::channel();
        if let Some((previous, _)) = self.pending_style.replace((theme, ready)) {
            debug!("Style {} superseded by {}", previous, theme);
        }
        receiver
    }
}

pub struct Map<'a> {
    id: egui::Id,
    view: &'a MapView,
    viewport_size: Vec2,
    clicked: &'a mut Option<String>,
}

impl<'a> Widget for Map<'a> {
    fn ui(self, ui: &mut Ui) -> Response {
        let Map {
            id,
            view,
            viewport_size,
            clicked,
        } = self;
        let mut state = MapState::load(ui.ctx(), id);

        let (rect, response) = ui.allocate_exact_size(viewport_size, Sense::click_and_drag());

        let palette = Palette::for_theme(view.theme);
        ui.painter().rect(rect, 0.0, palette.background, Stroke::new(1.0, palette.border));

        let map_painter = ui.painter().with_clip_rect(rect);

        // Handle interactions
        if response.dragged() {
            if !state.dragging {
                state.drag_start = response.hover_pos();
                state.dragging = true;
            }
            if let (Some(current_pos), Some(start_pos)) = (response.hover_pos(), state.drag_start) {
                let delta = current_pos - start_pos;
                let ppd = state.pixels_per_degree(rect) as f64;
                state.center = state.center + Coordinate::new(delta.y as f64 / ppd, -delta.x as f64 / ppd);
                state.center = Coordinate::new(
                    state.center.latitude().clamp(-85.0, 85.0),
                    state.center.longitude().clamp(-180.0, 180.0),
                );
                state.drag_start = Some(current_pos);
            }
        } else if state.dragging {
            state.dragging = false;
            state.drag_start = None;
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta).y;
            if scroll.abs() > f32::EPSILON {
                // Normalize scroll using tanh
                state.zoom = (state.zoom + (scroll / 10.0).tanh() * 0.25).clamp(0.0, MAX_ZOOM);
            }
        }

        // Graticule every 30 degrees
        let grid = Stroke::new(0.5, palette.grid);
        for lon in (-180..=180).step_by(30) {
            let lon = lon as f64;
            let top = state.project(rect, &Coordinate::new(90.0, lon));
            let bottom = state.project(rect, &Coordinate::new(-90.0, lon));
            map_painter.line_segment([top, bottom], grid);
        }
        for lat in (-90..=90).step_by(30) {
            let lat = lat as f64;
            let west = state.project(rect, &Coordinate::new(lat, -180.0));
            let east = state.project(rect, &Coordinate::new(lat, 180.0));
            map_painter.line_segment([west, east], grid);
        }

        for layer in &view.layers {
            let Some(source) = view.sources.get(&layer.source) else {
                continue;
            };
            for feature in &source.features {
                match layer.kind {
                    LayerKind::Line => {
                        let color = paint_color(layer, PaintProperty::LineColor, feature, palette.border);
                        let opacity = paint_number(layer, PaintProperty::LineOpacity, feature, 1.0);
                        let width = paint_number(layer, PaintProperty::LineWidth, feature, 1.0);
                        let stroke = Stroke::new(width, color.gamma_multiply(opacity));
                        for line in feature.geometry.lines() {
                            let points: Vec<Pos2> = line.iter().map(|c| state.project(rect, c)).collect();
                            if points.len() >= 2 {
                                map_painter.add(Shape::line(points, stroke));
                            }
                        }
                    }
                    LayerKind::Circle => {
                        if let Geometry::Point(point) = &feature.geometry {
                            let color = paint_color(layer, PaintProperty::CircleColor, feature, palette.border);
                            let opacity = paint_number(layer, PaintProperty::CircleOpacity, feature, 1.0);
                            let radius = paint_number(layer, PaintProperty::CircleRadius, feature, 3.0);
                            map_painter.circle_filled(state.project(rect, point), radius, color.gamma_multiply(opacity));
                        }
                    }
                }
            }
        }

        if response.clicked() {
            if let Some(pointer) = response.interact_pointer_pos() {
                if let Some(capital) = view.capital_at(&state, rect, pointer) {
                    *clicked = Some(capital.get_name().to_string());
                }
            }
        }

        let hovered = response
            .hover_pos()
            .and_then(|pointer| view.capital_at(&state, rect, pointer))
            .map(|capital| format!("{}\n{}", capital.get_name(), capital.get_string("description").unwrap_or_default()));

        // Store updated state
        state.store(ui.ctx(), id);

        match hovered {
            Some(text) => response.on_hover_text_at_pointer(text),
            None => response,
        }
    }
}

impl<'a> Map<'a> {
    pub fn new(id_source: impl std::hash::Hash, view: &'a MapView, clicked: &'a mut Option<String>) -> Self {
        Self {
            id: egui::Id::new(id_source),
            view,
            viewport_size: Vec2::new(1024.0, 512.0),
            clicked,
        }
    }

    pub fn viewport_size(mut self, size: Vec2) -> Self {
        self.viewport_size = size;
        self
    }
}

struct Palette {
    background: Color32,
    border: Color32,
    grid: Color32,
}

impl Palette {
    fn for_theme(theme: ThemeId) -> Self {
        match theme {
            ThemeId::Positron => Self {
                background: Color32::from_rgb(0xf2, 0xf0, 0xeb),
                border: Color32::from_gray(160),
                grid: Color32::from_gray(215),
            },
            ThemeId::DarkMatter => Self {
                background: Color32::from_rgb(0x16, 0x18, 0x1c),
                border: Color32::from_gray(90),
                grid: Color32::from_gray(45),
            },
            ThemeId::Voyager => Self {
                background: Color32::from_rgb(0xd4, 0xe6, 0xef),
                border: Color32::from_gray(140),
                grid: Color32::from_rgb(0xb8, 0xcf, 0xdb),
            },
        }
    }
}

fn paint_color(layer: &LayerSpec, property: PaintProperty, feature: &Feature, fallback: Color32) -> Color32 {
    match layer.paint_for(property).and_then(|e| e.evaluate(&feature.properties)) {
        Some(PaintValue::Color(c)) => Color32::from_rgb(c.r, c.g, c.b),
        _ => fallback,
    }
}

fn paint_number(layer: &LayerSpec, property: PaintProperty, feature: &Feature, fallback: f32) -> f32 {
    layer
        .paint_for(property)
        .and_then(|e| e.evaluate(&feature.properties))
        .and_then(|v| v.as_number())
        .map_or(fallback, |n| n as f32)
}
