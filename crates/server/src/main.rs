mod config;
mod model_loader;
mod routes;

use std::process;

use clap::Parser;

use crate::config::Config;
use crate::routes::AppState;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new();
    let app = routes::router(state.clone(), config.body_limit_bytes());

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    log::info!("  GET  /health       - readiness and device");
    log::info!("  POST /detect       - single image detection");
    log::info!("  POST /detect_batch - batch image detection");

    tokio::spawn(state.initialize(move || {
        log::info!("Initializing models...");
        model_loader::load_context(&config).map_err(|e| e.to_string())
    }));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
