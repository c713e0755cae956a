//! Core behavior shared by both HTTP and WebSocket handlers: run one client
//! event through the state machine and perform the effects it asks for.
//!
//! A request is all-or-nothing for conversational calls: if evaluating an
//! answer or writing its follow-up fails, or the request is cancelled midway,
//! the session stays as it was before the request, so the user can resend.
//! Scoring and saving failures are fed back to the session instead, which keeps
//! the retry in the session's hands.

use std::collections::VecDeque;

use tracing::{error, info, instrument};

use crate::evaluator::{evaluate, follow_up_question};
use crate::error::SurveyError;
use crate::scorer::score;
use crate::state::AppState;
use crate::survey::{Effect, Event, Session};

#[instrument(level = "info", skip(state, session, event), fields(session_id = %session.id(), phase = ?session.phase()))]
pub async fn run_event(state: &AppState, session: &mut Session, event: Event) -> Result<(), SurveyError> {
  // The stored session is only replaced once the whole turn went through, so a
  // dropped request future leaves it as it was.
  let mut work = session.clone();
  match drive(state, &mut work, event).await {
    Ok(()) => {
      *session = work;
      info!(target: "survey", phase = ?session.phase(), turns = session.turns().len(), reactions = session.reactions().len(), "Turn processed");
      Ok(())
    }
    Err(e) => {
      error!(target: "survey", error = %e, "Turn failed; session left unchanged");
      Err(e)
    }
  }
}

async fn drive(state: &AppState, session: &mut Session, event: Event) -> Result<(), SurveyError> {
  let mut pending: VecDeque<Effect> = session.handle(event)?.into();
  while let Some(effect) = pending.pop_front() {
    let outcome = perform(state, effect).await?;
    pending.extend(session.handle(outcome)?);
  }
  Ok(())
}

/// Execute one effect and translate its result into the next event.
async fn perform(state: &AppState, effect: Effect) -> Result<Event, SurveyError> {
  let llm = state.llm.as_ref();
  Ok(match effect {
    Effect::EvaluateAnswer(text) => Event::Verdict(evaluate(llm, &state.prompts, &text).await?),
    Effect::GenerateFollowUp(text) => Event::FollowUp(follow_up_question(llm, &state.prompts, &text).await?),
    Effect::ScoreProfile(reactions) => match score(llm, &state.prompts, &reactions).await {
      Ok(profile) => Event::ProfileReady(profile),
      Err(e) => {
        error!(target: "survey", error = %e, "Profile scoring failed");
        Event::ProfileFailed(format!("No se pudo generar el perfil: {e}"))
      }
    },
    Effect::AppendRow(row) => match state.sink.append_row(&row).await {
      Ok(()) => Event::Persisted,
      Err(e) => {
        error!(target: "survey", error = %e, "Saving the result row failed");
        Event::PersistFailed(format!("Error al guardar datos: {e}"))
      }
    },
  })
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use super::*;
  use crate::config::AgentConfig;
  use crate::error::LlmError;
  use crate::openai::testing::ScriptedLlm;
  use crate::questionnaire::QuestionnaireAnswers;
  use crate::sink::testing::MemorySink;
  use crate::survey::Phase;

  fn app(llm: Arc<ScriptedLlm>, sink: Arc<MemorySink>) -> AppState {
    AppState::new(AgentConfig::default(), llm, sink)
  }

  async fn answer(state: &AppState, s: &mut Session, text: &str) -> Result<(), SurveyError> {
    run_event(state, s, Event::UserMessage(text.into())).await
  }

  #[tokio::test]
  async fn full_session_appends_one_row() {
    // 5 news evaluations; the second news item needs one follow-up; then the profile.
    let llm = Arc::new(ScriptedLlm::new([
      "True",
      "False",
      "¿Qué opinas de la responsabilidad social de Amancio Ortega?",
      "True",
      "maybe",
      "TRUE",
      "Perfil equilibrado.\nAmbiental: 75, Social: 60, Gobernanza: 55, Riesgo: 30",
    ]));
    let sink = Arc::new(MemorySink::default());
    let state = app(llm.clone(), sink.clone());
    let handle = state.create_session().await;
    let mut s = handle.lock().await;

    for i in 0..5 {
      answer(&state, &mut s, &format!("general {i}")).await.expect("general");
    }
    assert_eq!(llm.calls(), 0);

    answer(&state, &mut s, "Repsol contamina").await.expect("news 0");
    answer(&state, &mut s, "bien").await.expect("news 1");
    assert!(s.follow_up_pending());
    answer(&state, &mut s, "Creo que ayuda a los afectados").await.expect("follow-up answer");
    answer(&state, &mut s, "despidos preocupantes").await.expect("news 2");
    answer(&state, &mut s, "incertidumbre").await.expect("news 3");
    answer(&state, &mut s, "cripto arriesgado").await.expect("news 4");

    assert_eq!(s.phase(), Phase::Questionnaire);
    assert_eq!(llm.calls(), 7);
    let reactions = s.reactions().to_vec();
    assert_eq!(reactions.len(), 10);
    assert_eq!(reactions[6], "Creo que ayuda a los afectados");

    let answers: QuestionnaireAnswers =
      serde_json::from_str(r#"{"productos": ["Acciones", "Criptomonedas"], "fondo_clima": "Sí"}"#).unwrap();
    run_event(&state, &mut s, Event::Submit(answers)).await.expect("submit");
    assert_eq!(s.phase(), Phase::Done);

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.len(), 26);
    assert_eq!(&row[..10], reactions.as_slice());
    assert_eq!(&row[10..14], &["75", "60", "55", "30"]);
    assert_eq!(row[16], "Acciones, Criptomonedas");
    assert_eq!(row[24], "Sí");
  }

  #[tokio::test]
  async fn evaluator_failure_restores_the_session() {
    let llm = Arc::new(ScriptedLlm::default());
    llm.push_err(LlmError::Http { status: 401, message: "bad key".into() });
    let state = app(llm.clone(), Arc::new(MemorySink::default()));
    let handle = state.create_session().await;
    let mut s = handle.lock().await;
    for i in 0..5 {
      answer(&state, &mut s, &format!("g{i}")).await.unwrap();
    }
    let before = s.turns().len();

    let err = answer(&state, &mut s, "opinión").await.unwrap_err();
    assert!(matches!(err, SurveyError::Llm(LlmError::Http { status: 401, .. })));
    assert_eq!(s.turns().len(), before);
    assert_eq!(s.phase(), Phase::NewsReaction);

    // Resending works once the model answers.
    llm.push("True");
    answer(&state, &mut s, "opinión").await.expect("resend");
    assert_eq!(s.reactions().len(), 6);
  }

  /// A model that never answers.
  struct Silent;

  #[async_trait::async_trait]
  impl crate::openai::LlmGateway for Silent {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
      std::future::pending().await
    }
  }

  #[tokio::test]
  async fn cancelled_turn_leaves_the_session_untouched() {
    let state = AppState::new(AgentConfig::default(), Arc::new(Silent), Arc::new(MemorySink::default()));
    let handle = state.create_session().await;
    let mut s = handle.lock().await;
    for i in 0..5 {
      answer(&state, &mut s, &format!("g{i}")).await.unwrap();
    }
    let before = s.turns().len();

    let cut = tokio::time::timeout(Duration::from_millis(50), answer(&state, &mut s, "opinión")).await;
    assert!(cut.is_err());
    assert_eq!(s.turns().len(), before);
    assert!(!s.is_busy());
    assert_eq!(s.phase(), Phase::NewsReaction);

    // The same answer is accepted again once a model responds.
    let state = AppState { llm: Arc::new(ScriptedLlm::new(["True"])), ..state };
    answer(&state, &mut s, "opinión").await.expect("resend");
    assert_eq!(s.reactions().len(), 6);
  }

  #[tokio::test]
  async fn unparseable_profile_waits_for_a_retry() {
    let cfg = AgentConfig {
      survey: crate::config::SurveyCfg { news: vec![], ..Default::default() },
      ..Default::default()
    };
    let llm = Arc::new(ScriptedLlm::new(["Ambiental: 10, Social: 20"]));
    let state = AppState::new(cfg, llm.clone(), Arc::new(MemorySink::default()));
    let handle = state.create_session().await;
    let mut s = handle.lock().await;
    for i in 0..5 {
      answer(&state, &mut s, &format!("g{i}")).await.expect("turn succeeds even if scoring fails");
    }
    assert_eq!(s.phase(), Phase::ProfileGeneration);
    assert!(s.can_retry_profile());
    assert!(s.last_error().unwrap().contains("Gobernanza"));
    assert!(s.profile().is_none());

    llm.push("Ambiental: 10, Social: 20, Gobernanza: 30, Riesgo: 40");
    run_event(&state, &mut s, Event::RetryProfile).await.expect("retry");
    assert_eq!(s.phase(), Phase::Questionnaire);
    assert_eq!(s.profile().map(|p| p.risk), Some(40));
  }

  #[tokio::test]
  async fn failed_save_can_be_resubmitted() {
    let cfg = AgentConfig {
      survey: crate::config::SurveyCfg { news: vec![], ..Default::default() },
      ..Default::default()
    };
    let llm = Arc::new(ScriptedLlm::new(["Ambiental: 1, Social: 2, Gobernanza: 3, Riesgo: 4"]));
    let sink = Arc::new(MemorySink::default());
    *sink.fail_next.lock().unwrap() = 1;
    let state = AppState::new(cfg, llm, sink.clone());
    let handle = state.create_session().await;
    let mut s = handle.lock().await;
    for i in 0..5 {
      answer(&state, &mut s, &format!("g{i}")).await.unwrap();
    }

    run_event(&state, &mut s, Event::Submit(QuestionnaireAnswers::default())).await.expect("handled");
    assert!(!s.submitted());
    assert!(s.last_error().unwrap().starts_with("Error al guardar datos"));
    assert!(sink.rows.lock().unwrap().is_empty());

    run_event(&state, &mut s, Event::Submit(QuestionnaireAnswers::default())).await.expect("resubmit");
    assert!(s.submitted());
    {
      let rows = sink.rows.lock().unwrap();
      assert_eq!(rows.len(), 1);
      assert_eq!(rows[0].len(), 5 + 4 + 12);
    }

    let again = run_event(&state, &mut s, Event::Submit(QuestionnaireAnswers::default())).await;
    assert!(matches!(again, Err(SurveyError::AlreadySubmitted)));
    assert_eq!(sink.rows.lock().unwrap().len(), 1);
  }
}
