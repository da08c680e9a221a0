use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use frecency_federated::core;
use frecency_federated::server;
use frecency_federated::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    let mut sync_handle = state
        .runtime
        .as_ref()
        .map(|runtime| runtime.synchronizer.clone().spawn());

    let bind_addr = format!("{}:{}", state.settings.host, state.settings.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("FRECENCY_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    if let Some(handle) = sync_handle.as_mut() {
        handle.stop().await;
    }

    Ok(())
}
