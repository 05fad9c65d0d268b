mod api;
mod app;
mod config;
mod domain;
mod features;
mod infrastructure;
mod model;
mod pipeline;
mod preprocessing;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ResolvedPaths::prepare(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::InferenceApp::initialize(config, paths, shutdown).await?;
    app.run().await
}
