use std::time::Duration;

mod app;
mod auth;
mod clock;
mod config;
mod error;
mod jobs;
mod notify;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "applytrack=debug,axum=info,tower_http=info".to_string());
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
    tracing::info!(production = app_state.config.production, "configuration loaded");
    if app_state.config.jwt.is_dev_secret() {
        tracing::warn!("JWT_SECRET not set; signing with the development placeholder");
    }

    // Run migrations if present
    if let Some(db) = &app_state.db {
        if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
    }

    let sweep_secs = app_state.config.reset.sweep_secs;
    if sweep_secs > 0 {
        app_state
            .auth
            .resets()
            .spawn_sweeper(Duration::from_secs(sweep_secs));
    }

    let reminder_secs = app_state.config.reminder_interval_secs;
    if reminder_secs > 0 {
        jobs::reminders::spawn_reminder_loop(app_state.clone(), Duration::from_secs(reminder_secs));
    }

    app::serve(app::build_app(app_state)).await
}
