use progress_dashboard::{open_backend, router, AppState, Config, ProgressSync};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    let backend = open_backend(&config.backend, &config.people).await?;
    let sync = Arc::new(ProgressSync::start(backend).await);
    let app = router(AppState::new(config.title.as_str(), Arc::clone(&sync)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    sync.shutdown().await;
    Ok(())
}
