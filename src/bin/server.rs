//! agentic-ifs HTTP server binary.
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP port (default: 8080)
//! - `CORS_ORIGINS`: Comma-separated allowed origins (default: any)
//! - `RUST_LOG`: Tracing filter (default: "info,agentic_ifs=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use agentic_ifs::server::{app_router, AppState};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agentic_ifs=debug".into()),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);

    let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    if cors_origins.is_empty() {
        tracing::info!("CORS: any origin");
    } else {
        tracing::info!("CORS: {}", cors_origins.join(", "));
    }

    let state = AppState::new().with_cors_origins(cors_origins);
    let app = app_router(state);

    tracing::info!("agentic-ifs server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health  liveness probe");
    tracing::info!("  *    /api/v1/sessions  session API");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
