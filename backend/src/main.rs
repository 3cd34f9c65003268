use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use rise_over_run::{AppState, config::ScoringConfig, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rise_over_run=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var_os("ROUTE_CONFIG").map(PathBuf::from);
    let config = ScoringConfig::load(config_path.as_deref()).expect("load scoring config");
    config.validate().expect("valid scoring config");

    let elevation = config.open_dem().expect("load elevation data");
    tracing::info!(
        "loaded {} elevation sources, resampling every {} m",
        elevation.len(),
        config.resample_step_m
    );

    let state = AppState {
        elevation: Arc::new(elevation),
        config: Arc::new(config),
    };
    let app = create_router(state);

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let addr: SocketAddr = bind.parse().expect("valid socket address");
    tracing::info!("starting backend on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}
