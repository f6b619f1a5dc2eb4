#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use capital_routes::config::AppConfig;
use capital_routes::ui::my_app::MyApp;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("capital-loader")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Unable to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(1440.0, 820.0))
            .with_min_inner_size(egui::vec2(640.0, 360.0))
            .with_title("Capital Routes")
            .with_resizable(true)
            .with_decorations(true),
        ..Default::default()
    };

    eframe::run_native(
        "Capital Routes",
        native_options,
        Box::new(move |cc| Ok(Box::new(MyApp::new(cc, config, runtime)))),
    )
}
