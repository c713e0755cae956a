//! WebSocket upgrade + message loop. One survey session per connection; it is
//! created on connect and discarded on disconnect. Each client message is
//! parsed as JSON and forwarded to core logic; we reply with a single JSON
//! message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::run_event;
use crate::protocol::{to_out, ClientWsMessage, ServerWsMessage};
use crate::state::{AppState, SessionHandle};
use crate::survey::Event;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "esg_profiler", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "esg_profiler", error = %e, "WS send error");
    return false;
  }
  true
}

/// The survey session bound to one connection.
struct WsSession {
  id: String,
  handle: SessionHandle,
}

impl WsSession {
  async fn open(state: &AppState) -> Self {
    let handle = state.create_session().await;
    let id = handle.lock().await.id().to_string();
    Self { id, handle }
  }

  async fn snapshot(&self) -> ServerWsMessage {
    let session = self.handle.lock().await;
    ServerWsMessage::Session { session: to_out(&session) }
  }

  /// Handle one text frame. Every frame gets exactly one reply.
  async fn reply(&mut self, state: &AppState, txt: &str) -> ServerWsMessage {
    match serde_json::from_str::<ClientWsMessage>(txt) {
      Ok(ClientWsMessage::Reset) => {
        state.remove_session(&self.id).await;
        *self = Self::open(state).await;
        info!(target: "survey", session_id = %self.id, "WS session reset");
        self.snapshot().await
      }
      Ok(incoming) => {
        debug!(target: "esg_profiler", "WS received: {:?}", &incoming);
        handle_client_ws(incoming, state, &self.handle).await
      }
      Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
    }
  }

  async fn close(self, state: &AppState) {
    state.remove_session(&self.id).await;
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut session = WsSession::open(&state).await;
  info!(target: "esg_profiler", session_id = %session.id, "WebSocket connected");

  // Greet with the first question.
  if send(&mut socket, &session.snapshot().await).await {
    while let Some(Ok(msg)) = socket.recv().await {
      match msg {
        Message::Text(txt) => {
          let reply_msg = session.reply(&state, &txt).await;
          if !send(&mut socket, &reply_msg).await {
            break;
          }
        }
        Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
        Message::Close(_) => break,
        _ => {}
      }
    }
  }

  let session_id = session.id.clone();
  session.close(&state).await;
  info!(target: "esg_profiler", %session_id, "WebSocket disconnected");
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, handle: &SessionHandle) -> ServerWsMessage {
  let event = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,
    ClientWsMessage::Reset => {
      let session = handle.lock().await;
      return ServerWsMessage::Session { session: to_out(&session) };
    }
    ClientWsMessage::Message { text } => Event::UserMessage(text),
    ClientWsMessage::SubmitQuestionnaire { answers } => Event::Submit(answers),
    ClientWsMessage::RetryProfile => Event::RetryProfile,
  };

  let mut session = handle.lock().await;
  match run_event(state, &mut session, event).await {
    Ok(()) => ServerWsMessage::Session { session: to_out(&session) },
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::config::AgentConfig;
  use crate::openai::testing::ScriptedLlm;
  use crate::sink::testing::MemorySink;
  use crate::survey::Phase;

  fn state(llm: ScriptedLlm) -> AppState {
    AppState::new(AgentConfig::default(), Arc::new(llm), Arc::new(MemorySink::default()))
  }

  fn session_of(msg: ServerWsMessage) -> crate::protocol::SessionOut {
    match msg {
      ServerWsMessage::Session { session } => session,
      other => panic!("expected a session snapshot, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn each_frame_gets_one_reply() {
    let state = state(ScriptedLlm::default());
    let mut ws = WsSession::open(&state).await;

    assert!(matches!(ws.reply(&state, r#"{"type":"ping"}"#).await, ServerWsMessage::Pong));
    assert!(matches!(ws.reply(&state, "not json").await, ServerWsMessage::Error { .. }));

    let out = session_of(ws.reply(&state, r#"{"type":"message","text":"crecer"}"#).await);
    assert_eq!(out.id, ws.id);
    assert_eq!(out.phase, Phase::GeneralQuestions);
    assert_eq!(out.turns.len(), 3);

    // Wrong phase for a questionnaire: an error reply, session unchanged.
    let reply = ws.reply(&state, r#"{"type":"submit_questionnaire","answers":{}}"#).await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));
    assert_eq!(session_of(ws.snapshot().await).turns.len(), 3);
  }

  #[tokio::test]
  async fn reset_replaces_the_session() {
    let state = state(ScriptedLlm::default());
    let mut ws = WsSession::open(&state).await;
    let old_id = ws.id.clone();
    ws.reply(&state, r#"{"type":"message","text":"crecer"}"#).await;

    let out = session_of(ws.reply(&state, r#"{"type":"reset"}"#).await);
    assert_ne!(out.id, old_id);
    assert_eq!(out.id, ws.id);
    assert_eq!(out.turns.len(), 1);
    assert!(state.get_session(&old_id).await.is_err());
    assert!(state.get_session(&ws.id).await.is_ok());
    assert_eq!(state.sessions.read().await.len(), 1);
  }

  #[tokio::test]
  async fn closing_discards_the_session() {
    let state = state(ScriptedLlm::default());
    let ws = WsSession::open(&state).await;
    let id = ws.id.clone();
    assert!(state.get_session(&id).await.is_ok());

    ws.close(&state).await;
    assert!(state.sessions.read().await.is_empty());
  }
}
