use std::sync::Arc;

use plan_collab::config::Config;
use plan_collab::services::identity;
use plan_collab::state::AppState;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plan_collab=debug,tower_http=info,info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");
    let verifier = identity::from_source(&config.auth).expect("identity verifier init failed");
    let state = AppState::new(config, Arc::clone(&verifier));
    let addr = state.config.bind_addr();
    let server = state.server.clone();

    let app = plan_collab::routes::app(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "plan-collab listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server failed");

    server.shutdown();
}
