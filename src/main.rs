mod app;
mod auth;
mod config;
mod error;
mod state;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "meeting_transcriber=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    tracing::info!(
        project = %app_state.config.project_name,
        version = %app_state.config.version,
        prefix = %app_state.config.api_prefix,
        "starting"
    );

    let addr = app_state.config.bind_addr;
    let app = app::build_app(app_state);
    app::serve(app, addr).await
}
