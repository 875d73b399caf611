//! `swea-server`: HTTP API, realtime channel and agent runner.

pub mod channel;
pub mod error;
pub mod logging;
pub mod routes;
pub mod runner;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState, cors_origins: &[String]) -> Router {
    Router::new()
        // Server
        .route("/api/status", get(routes::status::get_status))
        .route("/api/data", get(routes::status::get_data))
        // Projects
        .route("/api/create-project", post(routes::projects::create_project))
        .route("/api/delete-project", post(routes::projects::delete_project))
        .route("/api/get-messages", post(routes::projects::get_messages))
        // Messages
        .route("/api/messages", post(routes::messages::post_message))
        // Agent state
        .route("/api/is-agent-active", post(routes::agent::is_agent_active))
        .route("/api/get-agent-state", post(routes::agent::get_agent_state))
        .route("/api/stop-agent", post(routes::agent::stop_agent))
        .route(
            "/api/get-browser-session",
            get(routes::agent::get_browser_session),
        )
        .route(
            "/api/get-terminal-session",
            get(routes::agent::get_terminal_session),
        )
        .route("/api/token-usage", get(routes::agent::get_token_usage))
        // Settings and logs
        .route(
            "/api/settings",
            get(routes::settings::get_settings).post(routes::settings::update_settings),
        )
        .route("/api/logs", get(routes::logs::get_logs))
        // Realtime
        .route("/api/events", get(routes::events::sse_events))
        .route("/api/socket", get(routes::socket::ws_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// `*` in the origin list allows any origin; invalid entries are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Start the swea server. `host`/`port` override the configured address.
pub async fn serve(root: PathBuf, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let app_state = state::AppState::new(root)?;
    let (addr, origins) = {
        let config = app_state.config.read().await;
        let host = host.unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        (format!("{host}:{port}"), config.server.cors_origins.clone())
    };
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener, &origins).await
}

/// Serve on a pre-bound listener, so callers binding port 0 can read the
/// actual port first.
pub async fn serve_on(
    app_state: state::AppState,
    listener: tokio::net::TcpListener,
    cors_origins: &[String],
) -> anyhow::Result<()> {
    let actual = listener.local_addr()?;
    let app = build_router(app_state, cors_origins);

    tracing::info!("swea server listening on http://{actual}");

    axum::serve(listener, app).await?;
    Ok(())
}
