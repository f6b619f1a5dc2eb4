use std::sync::Arc;

use eframe::egui;
use egui::{Color32, Sense, Style};
use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::error::RouteError;
use crate::map::map::{Map, MapView};
use crate::maps_api::capital_source::ConfiguredSource;
use crate::routes::catalog::CapitalCatalog;
use crate::routes::classifier::{CategoryId, DistanceClassifier};
use crate::routes::interaction::ThemeId;
use crate::routes::route_model::RouteModel;
use crate::sync::controller::{ControlEvent, MapSyncController};

pub struct MyApp {
    config: AppConfig,
    classifier: Arc<DistanceClassifier>,
    controller: Option<MapSyncController<MapView>>,
    load_error: Option<String>,
    applied_theme: Option<ThemeId>,
    receiver: mpsc::UnboundedReceiver<Result<CapitalCatalog, RouteError>>,
    // Owns the loader task; dropped with the app
    _runtime: tokio::runtime::Runtime,
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Process the finished catalog load
        while let Ok(result) = self.receiver.try_recv() {
            match result.and_then(|catalog| self.build_controller(catalog)) {
                Ok(controller) => self.controller = Some(controller),
                Err(e) => {
                    error!("Could not load capitals: {}", e);
                    self.load_error = Some(e.to_string());
                }
            }
        }

        let mut events = Vec::new();

        if let Some(controller) = self.controller.as_mut() {
            controller.poll_restyles();
        }

        let theme = self
            .controller
            .as_ref()
            .map_or(self.config.default_theme, |c| c.widget().theme());
        if self.applied_theme != Some(theme) {
            ctx.set_style(Self::style_for_theme(ctx, theme));
            self.applied_theme = Some(theme);
        }

        egui::SidePanel::left("controls")
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Capital Routes");
                ui.separator();
                match &self.controller {
                    Some(controller) => Self::controls(ui, controller, &mut events),
                    None => match &self.load_error {
                        Some(message) => {
                            ui.colored_label(Color32::from_rgb(0xe0, 0x4f, 0x4f), "Failed to load capitals");
                            ui.label(message);
                        }
                        None => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label("Loading capitals…");
                            });
                        }
                    },
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(controller) = &self.controller {
                let mut clicked = None;
                let size = ui.available_size();
                ui.add(Map::new("routes_map", controller.widget(), &mut clicked).viewport_size(size));
                if let Some(name) = clicked {
                    events.push(ControlEvent::SelectOrigin(name));
                }
            }
        });

        if let Some(controller) = self.controller.as_mut() {
            // A style requested last frame has now been drawn as loading
            controller.widget_mut().finish_style_load();
            for event in events {
                controller.handle(event);
            }
            if controller.is_restyling() {
                ctx.request_repaint();
            }
        }
    }
}

impl MyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, runtime: tokio::runtime::Runtime) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let source = ConfiguredSource::from_config(config.capitals_source.as_deref());
        let requester = cc.egui_ctx.clone();
        runtime.spawn(async move {
            let result = CapitalCatalog::load(&source).await;
            if sender.send(result).is_err() {
                warn!("App closed before capitals finished loading");
            }
            requester.request_repaint();
        });

        Self {
            config,
            classifier: Arc::new(DistanceClassifier::default()),
            controller: None,
            load_error: None,
            applied_theme: None,
            receiver,
            _runtime: runtime,
        }
    }

    fn build_controller(&self, catalog: CapitalCatalog) -> Result<MapSyncController<MapView>, RouteError> {
        let origin = match &self.config.default_origin {
            Some(name) if catalog.find(name).is_ok() => name.clone(),
            Some(name) => {
                warn!("Default origin {} is not in the catalog, using {}", name, catalog.first().name);
                catalog.first().name.clone()
            }
            None => catalog.first().name.clone(),
        };

        let routes = RouteModel::new(Arc::new(catalog), Arc::clone(&self.classifier), &origin, self.config.arc_steps)?;
        let theme = self.config.default_theme;
        let mut controller = MapSyncController::new(MapView::new(theme), routes, theme);
        controller.attach();
        if let Some(category) = self.config.default_highlight.clone() {
            controller.select_highlight(Some(category));
        }
        info!("Map ready with origin {}", origin);
        Ok(controller)
    }

    fn controls(ui: &mut egui::Ui, controller: &MapSyncController<MapView>, events: &mut Vec<ControlEvent>) {
        let routes = controller.routes();
        let interaction = controller.interaction();

        let current_origin = routes.origin().name.clone();
        let mut origin = current_origin.clone();
        egui::ComboBox::from_label("Origin")
            .selected_text(origin.clone())
            .show_ui(ui, |ui| {
                for capital in routes.catalog().iter() {
                    ui.selectable_value(&mut origin, capital.name.clone(), capital.name.as_str());
                }
            });
        if origin != current_origin {
            events.push(ControlEvent::SelectOrigin(origin));
        }
        if !routes.origin().description.is_empty() {
            ui.small(routes.origin().description.as_str());
        }

        ui.add_space(8.0);
        let mut theme = interaction.theme();
        egui::ComboBox::from_label("Theme")
            .selected_text(theme.label())
            .show_ui(ui, |ui| {
                for option in ThemeId::ALL {
                    ui.selectable_value(&mut theme, option, option.label());
                }
            });
        if theme != interaction.theme() {
            events.push(ControlEvent::SelectTheme(theme));
        }
        if controller.widget().is_loading_style() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading style…");
            });
        }

        ui.add_space(8.0);
        ui.label("Highlight");
        let current_highlight: Option<CategoryId> = interaction.highlighted().cloned();
        let mut highlight = current_highlight.clone();
        ui.radio_value(&mut highlight, None, "None");
        for category in routes.classifier().categories() {
            let count = routes.arcs().iter().filter(|a| a.category == category.id).count();
            ui.horizontal(|ui| {
                let style = category.style;
                let (swatch, _) = ui.allocate_exact_size(egui::vec2(18.0, 6.0), Sense::hover());
                ui.painter()
                    .rect_filled(swatch, 1.0, Color32::from_rgb(style.color.r, style.color.g, style.color.b));
                ui.radio_value(&mut highlight, Some(category.id.clone()), format!("{} ({})", category.label, count));
            });
        }
        if highlight != current_highlight {
            events.push(ControlEvent::SelectHighlight(highlight));
        }

        ui.separator();
        ui.label(format!("{} routes from {}", routes.arcs().len(), routes.origin().name));
        ui.small("Click a capital on the map to fly from there.");
    }

    pub fn style_for_theme(ctx: &egui::Context, theme: ThemeId) -> Style {
        use egui::{style::Visuals, FontFamily, FontId, Rounding, Stroke, TextStyle};

        let mut style = (*ctx.style()).clone();

        // Set text styles
        style.text_styles = [
            (TextStyle::Heading, FontId::new(22.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
            (TextStyle::Button, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Small, FontId::new(13.0, FontFamily::Proportional)),
        ]
        .into();

        if theme.is_dark() {
            // Primary background color
            let primary_bg_color = Color32::from_rgb(32, 33, 36);
            style.visuals = Visuals::dark();
            style.visuals.override_text_color = Some(Color32::LIGHT_GRAY);
            style.visuals.window_fill = primary_bg_color;
            style.visuals.panel_fill = primary_bg_color;
            style.visuals.window_stroke = Stroke::new(1.0, Color32::from_gray(60));
        } else {
            style.visuals = Visuals::light();
        }

        // Window settings
        style.visuals.window_rounding = Rounding::same(6.0);
        style.spacing.button_padding = egui::vec2(4.0, 2.0);

        style
    }
}
