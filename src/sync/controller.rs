use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::maps_api::map_widget::{
    LayerKind, LayerSpec, MapWidget, PaintProperty, CAPITALS_LAYER, CAPITALS_SOURCE, ORIGIN_LAYER, ORIGIN_SOURCE,
    ROUTE_LAYER, ROUTE_SOURCE,
};
use crate::routes::classifier::{CategoryId, DistanceClassifier, Rgb};
use crate::routes::features::{FeatureCollection, PaintExpression, PaintValue};
use crate::routes::interaction::{InteractionState, ThemeId};
use crate::routes::route_model::{route_feature, RouteModel};

/// User intents the controller reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    SelectOrigin(String),
    SelectTheme(ThemeId),
    SelectHighlight(Option<CategoryId>),
}

#[derive(Debug)]
enum ThemeAxis {
    Idle,
    Changing {
        seq: u64,
        theme: ThemeId,
        /// Route data as rendered before the first swap of this change.
        snapshot: FeatureCollection,
    },
}

// Resolves to the request sequence number, or None if the widget dropped the request
type StyleReady = BoxFuture<'static, Option<u64>>;

/// Keeps a [`MapWidget`] in step with the route model and the user's selections.
///
/// Origin changes push geometry only, highlight changes push paint only, and a
/// theme change waits for the widget's style-ready signal before reattaching
/// everything. Origin and highlight changes made while a theme change is in
/// flight are applied once it completes.
pub struct MapSyncController<W: MapWidget> {
    widget: W,
    routes: RouteModel,
    interaction: InteractionState,
    theme_axis: ThemeAxis,
    theme_seq: u64,
    deferred_origin: Option<String>,
    pending_styles: FuturesUnordered<StyleReady>,
}

impl<W: MapWidget> MapSyncController<W> {
    pub fn new(widget: W, routes: RouteModel, theme: ThemeId) -> Self {
        Self {
            widget,
            routes,
            interaction: InteractionState::new(theme),
            theme_axis: ThemeAxis::Idle,
            theme_seq: 0,
            deferred_origin: None,
            pending_styles: FuturesUnordered::new(),
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn routes(&self) -> &RouteModel {
        &self.routes
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn is_restyling(&self) -> bool {
        matches!(self.theme_axis, ThemeAxis::Changing { .. })
    }

    /// Initial attachment once the widget has loaded its first style.
    pub fn attach(&mut self) {
        let routes = self.routes.arc_feature_collection();
        self.attach_all(routes);
        self.apply_highlight();
    }

    pub fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::SelectOrigin(name) => {
                self.select_origin(&name);
            }
            ControlEvent::SelectTheme(theme) => {
                self.select_theme(theme);
            }
            ControlEvent::SelectHighlight(category) => {
                self.select_highlight(category);
            }
        }
    }

    /// Returns `true` when new route geometry was pushed to the widget.
    pub fn select_origin(&mut self, name: &str) -> bool {
        if self.is_restyling() {
            if let Err(e) = self.routes.catalog().find(name) {
                warn!("Ignoring origin selection: {}", e);
                return false;
            }
            debug!("Deferring origin {} until the style swap completes", name);
            self.deferred_origin = Some(name.to_string());
            return false;
        }

        match self.routes.set_origin(name) {
            Ok(true) => {
                self.widget.set_source(ROUTE_SOURCE, self.routes.arc_feature_collection());
                self.widget.set_source(ORIGIN_SOURCE, self.routes.origin_feature_collection());
                self.widget.set_source(CAPITALS_SOURCE, self.routes.capital_feature_collection());
                true
            }
            Ok(false) => false,
            Err(e) => {
                // Usually a stale click racing a state change
                warn!("Ignoring origin selection: {}", e);
                false
            }
        }
    }

    /// Starts a style swap; returns `false` if `theme` is already selected.
    ///
    /// A request made while another swap is pending supersedes it. The older
    /// style-ready signal is then ignored when it arrives.
    pub fn select_theme(&mut self, theme: ThemeId) -> bool {
        if !self.interaction.set_theme(theme) {
            debug!("Theme {} already selected", theme);
            return false;
        }

        self.theme_seq += 1;
        let seq = self.theme_seq;
        let snapshot = match std::mem::replace(&mut self.theme_axis, ThemeAxis::Idle) {
            ThemeAxis::Changing { snapshot, theme: previous, .. } => {
                info!("Theme change to {} supersedes pending change to {}", theme, previous);
                snapshot
            }
            ThemeAxis::Idle => self
                .widget
                .source_data(ROUTE_SOURCE)
                .unwrap_or_else(|| self.routes.arc_feature_collection()),
        };
        self.theme_axis = ThemeAxis::Changing { seq, theme, snapshot };

        info!("Switching theme to {} (request {})", theme, seq);
        let ready = self.widget.set_style(theme);
        self.pending_styles.push(async move { ready.await.ok().map(|_| seq) }.boxed());
        true
    }

    /// Returns `true` when the highlight changed. The paint update is held
    /// back while a theme change is in flight.
    pub fn select_highlight(&mut self, category: Option<CategoryId>) -> bool {
        if let Some(id) = &category {
            if let Err(e) = self.routes.classifier().category(id) {
                warn!("Ignoring highlight selection: {}", e);
                return false;
            }
        }
        if !self.interaction.set_highlight(category) {
            return false;
        }
        if self.is_restyling() {
            debug!("Deferring highlight until the style swap completes");
        } else {
            self.apply_highlight();
        }
        true
    }

    /// Finishes the theme change numbered `seq`. Stale numbers are ignored.
    pub fn complete_restyle(&mut self, seq: u64) -> bool {
        let snapshot = match std::mem::replace(&mut self.theme_axis, ThemeAxis::Idle) {
            ThemeAxis::Changing {
                seq: current,
                theme,
                snapshot,
            } if current == seq => {
                info!("Style {} ready, reattaching routes", theme);
                snapshot
            }
            other => {
                debug!("Ignoring stale style-ready signal {}", seq);
                self.theme_axis = other;
                return false;
            }
        };

        let routes = restyle_routes(&snapshot, self.routes.classifier());
        self.attach_all(routes);

        if let Some(origin) = self.deferred_origin.take() {
            self.select_origin(&origin);
        }
        self.apply_highlight();
        true
    }

    /// Applies every style-ready signal that has already fired, without blocking.
    pub fn poll_restyles(&mut self) -> usize {
        let mut applied = 0;
        while let Some(Some(ready)) = self.pending_styles.next().now_or_never() {
            if let Some(seq) = ready {
                if self.complete_restyle(seq) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Waits for the next style-ready signal and applies it.
    ///
    /// Returns `false` if nothing was pending or the signal was stale. Never
    /// times out on its own; wrap it in `tokio::time::timeout` if the widget
    /// may fail to signal.
    pub async fn wait_for_restyle(&mut self) -> bool {
        match self.pending_styles.next().await {
            Some(Some(seq)) => self.complete_restyle(seq),
            _ => false,
        }
    }

    /// Drives the controller from an event channel until it closes, then waits
    /// for any style swap still in flight so the widget is left attached.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ControlEvent>) -> Self {
        loop {
            tokio::select! {
                biased;

                Some(ready) = self.pending_styles.next() => {
                    if let Some(seq) = ready {
                        self.complete_restyle(seq);
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        while !self.pending_styles.is_empty() {
            self.wait_for_restyle().await;
        }
        self
    }

    fn attach_all(&mut self, routes: FeatureCollection) {
        let theme = self.interaction.theme();
        self.widget.set_source(ROUTE_SOURCE, routes);
        self.widget.set_source(CAPITALS_SOURCE, self.routes.capital_feature_collection());
        self.widget.set_source(ORIGIN_SOURCE, self.routes.origin_feature_collection());
        for layer in layers(theme) {
            self.widget.add_layer(layer);
        }
    }

    fn apply_highlight(&mut self) {
        let classifier = self.routes.classifier();
        let category = self
            .interaction
            .highlighted()
            .and_then(|id| classifier.category(id).ok());
        let paint = classifier.highlight_expression_for(category);
        self.widget.set_paint_property(ROUTE_LAYER, PaintProperty::LineOpacity, paint.opacity);
        self.widget.set_paint_property(ROUTE_LAYER, PaintProperty::LineWidth, paint.width);
    }
}

/// Recomputes per-route style properties from the distances in `snapshot`.
fn restyle_routes(snapshot: &FeatureCollection, classifier: &DistanceClassifier) -> FeatureCollection {
    let features = snapshot
        .features
        .iter()
        .map(|feature| {
            let Some(distance) = feature.get_double("distance_km") else {
                warn!("Route without distance in snapshot, keeping it unstyled");
                return feature.clone();
            };
            match classifier.classify(distance) {
                Ok(category) => route_feature(
                    feature.geometry.clone(),
                    feature.get_string("origin").unwrap_or_default(),
                    feature.get_string("destination").unwrap_or_default(),
                    distance,
                    category,
                    classifier.style_for(category),
                ),
                Err(e) => {
                    warn!("Could not restyle route: {}", e);
                    feature.clone()
                }
            }
        })
        .collect();
    FeatureCollection::new(features)
}

fn layers(theme: ThemeId) -> Vec<LayerSpec> {
    let marker = if theme.is_dark() { Rgb::new(0xf1, 0xfa, 0xee) } else { Rgb::new(0x26, 0x46, 0x53) };
    let number = |n: f64| PaintExpression::Literal(PaintValue::Number(n));

    vec![
        LayerSpec::new(ROUTE_LAYER, ROUTE_SOURCE, LayerKind::Line)
            .paint(PaintProperty::LineColor, PaintExpression::get("color"))
            .paint(PaintProperty::LineWidth, PaintExpression::get("width"))
            .paint(PaintProperty::LineOpacity, PaintExpression::get("opacity")),
        LayerSpec::new(CAPITALS_LAYER, CAPITALS_SOURCE, LayerKind::Circle)
            .paint(PaintProperty::CircleColor, PaintExpression::Literal(PaintValue::Color(marker)))
            .paint(PaintProperty::CircleRadius, number(3.5))
            .paint(PaintProperty::CircleOpacity, number(0.9)),
        LayerSpec::new(ORIGIN_LAYER, ORIGIN_SOURCE, LayerKind::Circle)
            .paint(PaintProperty::CircleColor, PaintExpression::Literal(PaintValue::Color(Rgb::new(0xd6, 0x28, 0x28))))
            .paint(PaintProperty::CircleRadius, number(7.0))
            .paint(PaintProperty::CircleOpacity, number(1.0)),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::oneshot;

    use super::*;
    use crate::geo::coordinate::Coordinate;
    use crate::routes::catalog::{Capital, CapitalCatalog};
    use crate::routes::features::FeatureValue;

    /// Map widget fake that records what was attached under which style.
    #[derive(Default)]
    struct RecordingWidget {
        theme: Option<ThemeId>,
        sources: HashMap<String, FeatureCollection>,
        layers: Vec<LayerSpec>,
        writes: Vec<(Option<ThemeId>, String)>,
        paint_calls: usize,
        pending: Vec<oneshot::Sender<()>>,
        ready_immediately: bool,
        ready_from_task: bool,
    }

    impl RecordingWidget {
        fn resolve(&mut self, index: usize) {
            let sender = self.pending.remove(index);
            sender.send(()).unwrap();
        }

        fn layer(&self, id: &str) -> Option<&LayerSpec> {
            self.layers.iter().find(|l| l.id == id)
        }
    }

    impl MapWidget for RecordingWidget {
        fn set_source(&mut self, id: &str, data: FeatureCollection) {
            self.writes.push((self.theme, id.to_string()));
            self.sources.insert(id.to_string(), data);
        }

        fn source_data(&self, id: &str) -> Option<FeatureCollection> {
            self.sources.get(id).cloned()
        }

        fn add_layer(&mut self, layer: LayerSpec) {
            self.layers.retain(|l| l.id != layer.id);
            self.layers.push(layer);
        }

        fn set_paint_property(&mut self, layer: &str, property: PaintProperty, expression: PaintExpression) {
            self.paint_calls += 1;
            if let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer) {
                layer.set_paint(property, expression);
            }
        }

        fn set_style(&mut self, theme: ThemeId) -> oneshot::Receiver<()> {
            self.theme = Some(theme);
            self.sources.clear();
            self.layers.clear();
            let (sender, receiver) = oneshot::channel();
            if self.ready_immediately {
                sender.send(()).unwrap();
            } else if self.ready_from_task {
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    let _ = sender.send(());
                });
            } else {
                self.pending.push(sender);
            }
            receiver
        }
    }

    fn capital(name: &str, lat: f64, lon: f64) -> Capital {
        Capital {
            name: name.to_string(),
            coordinate: Coordinate::new(lat, lon),
            description: format!("{name} description"),
        }
    }

    fn controller(widget: RecordingWidget) -> MapSyncController<RecordingWidget> {
        let catalog = CapitalCatalog::new(vec![
            capital("Paris", 48.85, 2.35),
            capital("Tokyo", 35.68, 139.69),
            capital("Lima", -12.05, -77.04),
            capital("Brussels", 50.85, 4.35),
        ])
        .unwrap();
        let routes = RouteModel::new(Arc::new(catalog), Arc::new(DistanceClassifier::default()), "Paris", 16).unwrap();
        let mut controller = MapSyncController::new(widget, routes, ThemeId::Positron);
        controller.attach();
        controller
    }

    fn long() -> CategoryId {
        CategoryId::new("long")
    }

    fn route_origin(widget: &RecordingWidget) -> Option<String> {
        widget.sources[ROUTE_SOURCE].features[0].get_string("origin").map(str::to_string)
    }

    #[test]
    fn attach_pushes_sources_layers_and_paint() {
        let controller = controller(RecordingWidget::default());
        let widget = controller.widget();
        assert_eq!(widget.sources[ROUTE_SOURCE].len(), 3);
        assert_eq!(widget.sources[CAPITALS_SOURCE].len(), 4);
        assert_eq!(widget.sources[ORIGIN_SOURCE].features[0].get_name(), "Paris");
        assert_eq!(widget.layers.len(), 3);
        assert_eq!(
            widget.layer(ROUTE_LAYER).unwrap().paint_for(PaintProperty::LineOpacity),
            Some(&PaintExpression::get("opacity"))
        );
    }

    #[test]
    fn origin_change_only_touches_geometry() {
        let mut controller = controller(RecordingWidget::default());
        let paint_calls = controller.widget().paint_calls;
        let writes = controller.widget().writes.len();

        assert!(controller.select_origin("Tokyo"));
        assert_eq!(route_origin(controller.widget()).as_deref(), Some("Tokyo"));
        assert_eq!(controller.widget().paint_calls, paint_calls);

        // Same origin and stale names do nothing
        let writes_after = controller.widget().writes.len();
        assert!(writes_after > writes);
        assert!(!controller.select_origin("Tokyo"));
        assert!(!controller.select_origin("Atlantis"));
        assert_eq!(controller.widget().writes.len(), writes_after);
    }

    #[test]
    fn highlight_updates_paint_without_geometry() {
        let mut controller = controller(RecordingWidget::default());
        let writes = controller.widget().writes.len();

        assert!(controller.select_highlight(Some(long())));
        assert!(!controller.select_highlight(Some(long())));
        assert!(!controller.select_highlight(Some(CategoryId::new("orbital"))));
        assert_eq!(controller.widget().writes.len(), writes);

        let classifier = DistanceClassifier::default();
        let expected = classifier.highlight_expression_for(classifier.category(&long()).ok());
        let layer = controller.widget().layer(ROUTE_LAYER).unwrap();
        assert_eq!(layer.paint_for(PaintProperty::LineOpacity), Some(&expected.opacity));
        assert_eq!(layer.paint_for(PaintProperty::LineWidth), Some(&expected.width));

        assert!(controller.select_highlight(None));
        let layer = controller.widget().layer(ROUTE_LAYER).unwrap();
        assert_eq!(layer.paint_for(PaintProperty::LineOpacity), Some(&PaintExpression::get("opacity")));
    }

    #[tokio::test]
    async fn theme_change_reattaches_after_style_ready() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_highlight(Some(long()));

        assert!(controller.select_theme(ThemeId::DarkMatter));
        assert!(!controller.select_theme(ThemeId::DarkMatter));
        assert!(controller.is_restyling());
        assert!(controller.widget().sources.is_empty());

        controller.widget_mut().resolve(0);
        assert!(controller.wait_for_restyle().await);
        assert!(!controller.is_restyling());

        let widget = controller.widget();
        assert_eq!(widget.sources[ROUTE_SOURCE].len(), 3);
        assert_eq!(widget.sources[CAPITALS_SOURCE].len(), 4);
        assert_eq!(widget.layers.len(), 3);
        let route = &widget.sources[ROUTE_SOURCE].features[0];
        assert!(route.get_string("color").is_some());
        assert!(route.get_double("width").is_some());

        // Highlight survives the swap
        let opacity = widget.layer(ROUTE_LAYER).unwrap().paint_for(PaintProperty::LineOpacity).unwrap();
        assert_ne!(opacity, &PaintExpression::get("opacity"));
    }

    #[tokio::test]
    async fn superseded_theme_change_is_ignored() {
        let mut controller = controller(RecordingWidget::default());
        assert!(controller.select_theme(ThemeId::DarkMatter));
        assert!(controller.select_theme(ThemeId::Voyager));
        let requested_at = controller.widget().writes.len();

        // Both signals fire; only the Voyager one may reattach data
        controller.widget_mut().resolve(0);
        controller.widget_mut().resolve(0);
        let first = controller.wait_for_restyle().await;
        let second = controller.wait_for_restyle().await;
        assert!(first ^ second);
        assert!(!controller.wait_for_restyle().await);

        let widget = controller.widget();
        assert_eq!(widget.theme, Some(ThemeId::Voyager));
        assert_eq!(controller.interaction().theme(), ThemeId::Voyager);
        let reattached = &widget.writes[requested_at..];
        assert_eq!(reattached.len(), 3);
        assert!(reattached.iter().all(|(theme, _)| *theme == Some(ThemeId::Voyager)));
        assert_eq!(widget.sources[ROUTE_SOURCE].len(), 3);
    }

    #[tokio::test]
    async fn stale_signal_after_completion_changes_nothing() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_theme(ThemeId::DarkMatter);
        controller.select_theme(ThemeId::Voyager);

        controller.widget_mut().resolve(1);
        assert!(controller.wait_for_restyle().await);
        let writes = controller.widget().writes.len();

        controller.widget_mut().resolve(0);
        assert!(!controller.wait_for_restyle().await);
        assert_eq!(controller.widget().writes.len(), writes);
        assert!(!controller.is_restyling());
    }

    #[tokio::test]
    async fn origin_during_restyle_is_deferred() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_theme(ThemeId::DarkMatter);

        assert!(!controller.select_origin("Lima"));
        assert!(!controller.select_origin("Atlantis"));
        assert_eq!(controller.routes().origin().name, "Paris");

        controller.widget_mut().resolve(0);
        assert!(controller.wait_for_restyle().await);
        assert_eq!(controller.routes().origin().name, "Lima");
        assert_eq!(route_origin(controller.widget()).as_deref(), Some("Lima"));
        assert_eq!(controller.widget().sources[ORIGIN_SOURCE].features[0].get_name(), "Lima");
    }

    #[tokio::test]
    async fn highlight_during_restyle_is_applied_afterwards() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_theme(ThemeId::Voyager);
        let paint_calls = controller.widget().paint_calls;

        assert!(controller.select_highlight(Some(long())));
        assert_eq!(controller.widget().paint_calls, paint_calls);

        controller.widget_mut().resolve(0);
        controller.wait_for_restyle().await;
        let layer = controller.widget().layer(ROUTE_LAYER).unwrap();
        match layer.paint_for(PaintProperty::LineOpacity) {
            Some(PaintExpression::Match { cases, .. }) => assert_eq!(cases[0].0, "long"),
            other => panic!("unexpected opacity paint {other:?}"),
        }
    }

    #[test]
    fn poll_applies_ready_restyles_without_blocking() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_theme(ThemeId::DarkMatter);
        assert_eq!(controller.poll_restyles(), 0);
        assert!(controller.is_restyling());

        controller.widget_mut().resolve(0);
        assert_eq!(controller.poll_restyles(), 1);
        assert!(!controller.is_restyling());
    }

    #[test]
    fn dropped_style_request_never_completes() {
        let mut controller = controller(RecordingWidget::default());
        controller.select_theme(ThemeId::DarkMatter);
        controller.widget_mut().pending.clear();
        assert_eq!(controller.poll_restyles(), 0);
        assert!(controller.is_restyling());
    }

    #[test]
    fn restyle_recomputes_style_from_distance() {
        let classifier = DistanceClassifier::default();
        let snapshot = FeatureCollection::new(vec![crate::routes::features::Feature::new(
            crate::routes::features::Geometry::LineString(vec![Coordinate::new(50.85, 4.35), Coordinate::new(48.85, 2.35)]),
        )
        .with("origin", FeatureValue::String("Brussels".into()))
        .with("destination", FeatureValue::String("Paris".into()))
        .with("distance_km", FeatureValue::Double(264.0))]);

        let restyled = restyle_routes(&snapshot, &classifier);
        let route = &restyled.features[0];
        assert_eq!(route.get_string("category"), Some("short"));
        assert_eq!(route.get_string("color"), Some("#2a9d8f"));
        assert_eq!(route.get_double("width"), Some(1.5));
        assert_eq!(route.geometry, snapshot.features[0].geometry);
    }

    #[tokio::test]
    async fn run_loop_processes_events_in_order() {
        let widget = RecordingWidget {
            ready_immediately: true,
            ..Default::default()
        };
        let controller = controller(widget);

        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(ControlEvent::SelectOrigin("Tokyo".into())).unwrap();
        sender.send(ControlEvent::SelectTheme(ThemeId::DarkMatter)).unwrap();
        sender.send(ControlEvent::SelectHighlight(Some(long()))).unwrap();
        drop(sender);

        let controller = controller.run(receiver).await;
        assert!(!controller.is_restyling());
        assert_eq!(controller.interaction().theme(), ThemeId::DarkMatter);
        assert_eq!(controller.interaction().highlighted(), Some(&long()));
        assert_eq!(route_origin(controller.widget()).as_deref(), Some("Tokyo"));
        assert_eq!(controller.widget().layers.len(), 3);
    }

    #[tokio::test]
    async fn run_loop_finishes_restyle_after_events_close() {
        let widget = RecordingWidget {
            ready_from_task: true,
            ..Default::default()
        };
        let controller = controller(widget);

        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(ControlEvent::SelectTheme(ThemeId::DarkMatter)).unwrap();
        drop(sender);

        let controller = controller.run(receiver).await;
        assert!(!controller.is_restyling());
        assert_eq!(controller.widget().theme, Some(ThemeId::DarkMatter));
        assert_eq!(controller.widget().sources[ROUTE_SOURCE].len(), 3);
        assert_eq!(route_origin(controller.widget()).as_deref(), Some("Paris"));
        assert_eq!(controller.widget().layers.len(), 3);
    }
}
