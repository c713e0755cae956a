//! ESG investor profiler · conversational survey backend
//!
//! - Axum HTTP + WebSocket API driving a fixed question/news/questionnaire flow
//! - OpenAI-compatible LLM (Groq by default) to judge answers, ask follow-ups
//!   and score the final ESG + risk profile
//! - Result rows appended to Google Sheets (or a local JSONL file)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (also read from .env):
//!   PORT                      : u16 (default 3000)
//!   LLM_API_KEY               : required (GROQ_API_KEY accepted as fallback)
//!   LLM_BASE_URL              : default "https://api.groq.com/openai/v1"
//!   LLM_MODEL                 : default "gemma2-9b-it"
//!   LLM_TEMPERATURE           : default 0
//!   LLM_MAX_RETRIES           : default 2
//!   LLM_TIMEOUT_SECS          : default 30
//!   SURVEY_CONFIG_PATH        : path to TOML config (prompts, survey, policy, sheet)
//!   GCP_SERVICE_ACCOUNT_JSON  : service-account key (inline JSON)
//!   GCP_SERVICE_ACCOUNT_PATH  : service-account key file, if the inline one is unset
//!   RESPONSES_FALLBACK_PATH   : JSONL file used without a credential (default ./responses.jsonl)
//!   SESSION_IDLE_SECS         : idle sessions are evicted after this long (default 3600)
//!   LOG_LEVEL                 : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod seeds;
mod questionnaire;
mod openai;
mod evaluator;
mod scorer;
mod survey;
mod sink;
mod sheets;
mod state;
mod logic;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let dotenv_result = dotenv::dotenv();
  telemetry::init_tracing();
  if let Err(e) = dotenv_result {
    warn!(target: "esg_profiler", error = %e, "No .env loaded");
  }

  // Shared state: survey content, prompts, LLM client, sink, session store.
  let state = Arc::new(AppState::from_env()?);
  let _sweeper = state.spawn_idle_sweeper();

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "esg_profiler", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "esg_profiler", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "esg_profiler", "Shutdown signal received");
}
