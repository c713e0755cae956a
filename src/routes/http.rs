//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the session id and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::error::SurveyError;
use crate::logic::run_event;
use crate::protocol::*;
use crate::questionnaire::form;
use crate::state::AppState;
use crate::survey::Event;

impl IntoResponse for SurveyError {
  fn into_response(self) -> Response {
    let status = match &self {
      SurveyError::UnknownSession(_) => StatusCode::NOT_FOUND,
      SurveyError::UnexpectedInput(_)
      | SurveyError::UnexpectedEvent { .. }
      | SurveyError::ProfileAlreadyComputed
      | SurveyError::AlreadySubmitted => StatusCode::CONFLICT,
      SurveyError::Questionnaire(_) => StatusCode::UNPROCESSABLE_ENTITY,
      SurveyError::Llm(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

/// Run one event against a stored session and return its new snapshot.
async fn apply(state: &AppState, id: &str, event: Event) -> Result<Json<SessionOut>, SurveyError> {
  let handle = state.get_session(id).await?;
  let mut session = handle.lock().await;
  run_event(state, &mut session, event).await?;
  Ok(Json(to_out(&session)))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_questionnaire() -> impl IntoResponse {
  Json(QuestionnaireFormOut { fields: form() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let handle = state.create_session().await;
  let session = handle.lock().await;
  info!(target: "survey", session_id = %session.id(), "HTTP session created");
  (StatusCode::CREATED, Json(to_out(&session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, SurveyError> {
  let handle = state.get_session(&id).await?;
  let session = handle.lock().await;
  Ok(Json(to_out(&session)))
}

#[instrument(level = "info", skip(state, body), fields(%id, text_len = body.text.len()))]
pub async fn http_post_message(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<MessageIn>,
) -> Result<Json<SessionOut>, SurveyError> {
  let out = apply(&state, &id, Event::UserMessage(body.text)).await?;
  info!(target: "survey", session_id = %id, phase = ?out.phase, "HTTP message handled");
  Ok(out)
}

#[instrument(level = "info", skip(state, body), fields(%id, answered = body.answers.0.len()))]
pub async fn http_post_questionnaire(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<QuestionnaireIn>,
) -> Result<Json<SessionOut>, SurveyError> {
  let out = apply(&state, &id, Event::Submit(body.answers)).await?;
  info!(target: "survey", session_id = %id, submitted = out.submitted, "HTTP questionnaire handled");
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_retry_profile(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, SurveyError> {
  apply(&state, &id, Event::RetryProfile).await
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, SurveyError> {
  if state.remove_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(SurveyError::UnknownSession(id))
  }
}
