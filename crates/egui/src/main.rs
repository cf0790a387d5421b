mod app;
mod config;
mod gateway;
mod input;
mod platform;

use app::WayvibesApp;
use config::Config;
use eframe::egui;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(err) = config_error {
        tracing::warn!("ignoring config file: {err:#}");
    }
    tracing::info!(backend = %config.backend_command, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("wayvibes-worker")
        .build()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([440.0, 680.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Wayvibes",
        options,
        Box::new(move |cc| Ok(Box::new(WayvibesApp::new(cc, runtime, config)?))),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))
}
