//! Application state: survey content, prompts, LLM gateway, persistence sink
//! and the in-memory session store.
//!
//! Sessions live only in memory: created on first interaction, dropped on
//! delete, WebSocket disconnect or after sitting idle longer than
//! `SESSION_IDLE_SECS`. Each one sits behind its own mutex so turns of a
//! session are processed one at a time.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{load_agent_config_from_env, AgentConfig, FlowPolicy, Prompts, SurveyCfg};
use crate::error::{ConfigError, SurveyError};
use crate::openai::{env_or, LlmGateway, OpenAI};
use crate::sink::{sink_from_env, PersistenceSink};
use crate::survey::Session;

pub type SessionHandle = Arc<Mutex<Session>>;

const DEFAULT_IDLE_SECS: u64 = 3600;
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub struct SessionEntry {
    pub handle: SessionHandle,
    /// Last time a request looked the session up.
    pub touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    /// Sessions untouched for this long are evicted by the sweeper.
    pub idle_ttl: Duration,
    pub llm: Arc<dyn LlmGateway>,
    pub sink: Arc<dyn PersistenceSink>,
    pub prompts: Prompts,
    pub survey: Arc<SurveyCfg>,
    pub policy: FlowPolicy,
}

impl AppState {
    /// Build state from env: load TOML config, init the LLM client and pick the sink.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env()?;
        info!(target: "esg_profiler", base_url = %openai.base_url, model = %openai.model, max_retries = openai.max_retries, "LLM client ready.");

        let sink = sink_from_env(&cfg.sheet)?;
        let idle_ttl = Duration::from_secs(env_or("SESSION_IDLE_SECS", DEFAULT_IDLE_SECS)?);
        Ok(Self { idle_ttl, ..Self::new(cfg, Arc::new(openai), sink) })
    }

    pub fn new(cfg: AgentConfig, llm: Arc<dyn LlmGateway>, sink: Arc<dyn PersistenceSink>) -> Self {
        info!(
            target: "esg_profiler",
            general_questions = cfg.survey.general_questions.len(),
            news_items = cfg.survey.news.len(),
            max_follow_ups = cfg.policy.max_follow_ups,
            ambiguous_verdict = ?cfg.policy.ambiguous_verdict,
            "Survey configured"
        );
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl: Duration::from_secs(DEFAULT_IDLE_SECS),
            llm,
            sink,
            prompts: cfg.prompts,
            survey: Arc::new(cfg.survey),
            policy: cfg.policy,
        }
    }

    /// Start a session; the first question is already in its transcript.
    #[instrument(level = "info", skip(self))]
    pub async fn create_session(&self) -> SessionHandle {
        let id = Uuid::new_v4().to_string();
        // A fresh session only asks its first question; no effects to run.
        let (session, _effects) = Session::new(id.clone(), self.survey.clone(), self.policy.clone());
        let handle = Arc::new(Mutex::new(session));
        let entry = SessionEntry { handle: handle.clone(), touched: Instant::now() };
        self.sessions.write().await.insert(id.clone(), entry);
        info!(target: "survey", session_id = %id, "Session created");
        handle
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: &str) -> Result<SessionHandle, SurveyError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SurveyError::UnknownSession(id.to_string()))?;
        entry.touched = Instant::now();
        Ok(entry.handle.clone())
    }

    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(target: "survey", session_id = %id, "Session discarded");
        }
        removed
    }

    /// Drop every session idle for at least `max_idle`; returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.touched.elapsed() < max_idle;
            if !keep {
                info!(target: "survey", session_id = %id, "Idle session evicted");
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically evict sessions idle longer than `idle_ttl`.
    pub fn spawn_idle_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = state.idle_ttl.min(MAX_SWEEP_PERIOD).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            info!(target: "survey", ?period, idle_ttl = ?state.idle_ttl, "Idle session sweeper started");
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle(state.idle_ttl).await;
                debug!(target: "survey", evicted, "Idle sweep done");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::openai::testing::ScriptedLlm;
    use crate::sink::testing::MemorySink;

    fn state() -> AppState {
        AppState::new(AgentConfig::default(), Arc::new(ScriptedLlm::default()), Arc::new(MemorySink::default()))
    }

    async fn id_of(handle: &SessionHandle) -> String {
        handle.lock().await.id().to_string()
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let state = state();
        let a = id_of(&state.create_session().await).await;
        let b = id_of(&state.create_session().await).await;
        assert_eq!(state.evict_idle(Duration::from_secs(3600)).await, 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        // Looking `a` up refreshes it; `b` stays idle.
        state.get_session(&a).await.unwrap();
        assert_eq!(state.evict_idle(Duration::from_millis(30)).await, 1);

        assert!(state.get_session(&a).await.is_ok());
        assert!(matches!(state.get_session(&b).await, Err(SurveyError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn sweeper_evicts_without_requests() {
        let state = AppState { idle_ttl: Duration::from_millis(1), ..state() };
        state.create_session().await;
        let sweeper = state.spawn_idle_sweeper();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(state.sessions.read().await.is_empty());
        sweeper.abort();
    }
}
