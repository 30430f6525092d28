//! access-facade demo service.
//!
//! - config path: first CLI argument, default `access-facade.yaml`
//! - audit middleware + authz guard in front of the sample routes
//! - periodic outbox replay
//! - Ctrl-C: mark draining, stop accepting, drain audit workers

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use access_facade_core::error::Result;
use access_facade_demo::{app_state::AppState, config, consumer, router};

const DEFAULT_CONFIG: &str = "access-facade.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.client_code().as_str(), "access-facade-demo failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.service.listen_addr()?;
    tracing::info!(config = %path, service = %cfg.service.name, env = %cfg.service.env, "config loaded");

    let state = AppState::new(cfg)?;
    let log_consumer = state.cfg().demo.log_consumer.then(|| {
        consumer::spawn_log_consumer(state.bus(), &state.cfg().audit.sink.destination)
    });
    state.audit().spawn_replay();

    let app = router::build_router(state.clone());
    tracing::info!(%listen, "access-facade-demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state.clone()))
    .await?;

    state.audit().shutdown().await;
    if let Some(task) = log_consumer {
        task.abort();
    }
    tracing::info!("access-facade-demo stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c listener unavailable, running until killed");
        std::future::pending::<()>().await;
    }
    state.set_draining();
    tracing::info!("shutdown signal received, draining");
}
