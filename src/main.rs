//! LingoQuest · content backend
//!
//! - Axum HTTP API serving topics, questions, locations and leaderboards
//! - Optional OpenAI integration (via environment variables); without it all
//!   content comes from the local fallback synthesizer
//! - Versioned JSON cache persisted to disk
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   OPENAI_API_KEY    : enables OpenAI integration if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4o-mini"
//!   AGENT_CONFIG_PATH : path to TOML config (prompts, cache, generation)
//!   CACHE_PATH        : overrides the cache file location
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod ids;
mod cache;
mod schema;
mod fallback;
mod model;
mod generator;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config, cache, OpenAI client, generation client).
  let state = Arc::new(AppState::from_env().await);

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "lingoquest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

/// Resolve on Ctrl+C so in-flight cache writes finish before exit.
async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!(target: "lingoquest", "Shutdown signal received");
  }
}
