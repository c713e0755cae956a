//! Persistence sink: where finished survey rows are appended.
//!
//! The Google Sheets sink is used when a service-account credential is
//! configured; otherwise rows go to a local JSON-lines file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::SheetCfg;
use crate::error::{ConfigError, SinkError};
use crate::sheets::{ServiceAccountKey, SheetsSink};

#[async_trait]
pub trait PersistenceSink: Send + Sync {
  /// Append one row. Column order is positional.
  async fn append_row(&self, values: &[String]) -> Result<(), SinkError>;
}

/// Appends each row as a JSON array on its own line.
pub struct JsonlSink {
  path: PathBuf,
  // Serializes writers so lines never interleave.
  lock: Mutex<()>,
}

impl JsonlSink {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), lock: Mutex::new(()) }
  }
}

#[async_trait]
impl PersistenceSink for JsonlSink {
  #[instrument(level = "info", skip(self, values), fields(path = %self.path.display(), columns = values.len()))]
  async fn append_row(&self, values: &[String]) -> Result<(), SinkError> {
    let mut line = serde_json::to_string(values).map_err(|e| SinkError::Transport(e.to_string()))?;
    line.push('\n');
    let _guard = self.lock.lock().await;
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    info!(target: "survey", "Row appended to local file");
    Ok(())
  }
}

/// Pick the sink from the environment:
/// GCP_SERVICE_ACCOUNT_JSON (inline key) or GCP_SERVICE_ACCOUNT_PATH (key file)
/// selects Google Sheets; otherwise RESPONSES_FALLBACK_PATH (default ./responses.jsonl).
pub fn sink_from_env(sheet: &SheetCfg) -> Result<Arc<dyn PersistenceSink>, ConfigError> {
  let key_json = match std::env::var("GCP_SERVICE_ACCOUNT_JSON") {
    Ok(s) => Some(s),
    Err(_) => match std::env::var("GCP_SERVICE_ACCOUNT_PATH") {
      Ok(path) => Some(
        std::fs::read_to_string(&path).map_err(|e| ConfigError::ServiceAccount(format!("{path}: {e}")))?,
      ),
      Err(_) => None,
    },
  };

  if let Some(json) = key_json {
    let key = ServiceAccountKey::from_json(&json)?;
    info!(target: "esg_profiler", client_email = %key.client_email, spreadsheet = %sheet.spreadsheet_name, "Google Sheets sink enabled.");
    return Ok(Arc::new(SheetsSink::new(key, sheet.clone())?));
  }

  let path = std::env::var("RESPONSES_FALLBACK_PATH").unwrap_or_else(|_| "./responses.jsonl".into());
  warn!(target: "esg_profiler", %path, "No service-account credential; appending rows to a local file.");
  Ok(Arc::new(JsonlSink::new(path)))
}
