//! Error kinds surfaced by the gateway, scorer, sink and state machine.

use thiserror::Error;

use crate::survey::Phase;

/// Failures talking to the hosted language model.
#[derive(Debug, Error)]
pub enum LlmError {
  #[error("LLM transport error: {0}")]
  Transport(String),
  #[error("LLM HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("LLM returned an empty completion")]
  Empty,
}

/// Failures turning the profile completion into four scores.
#[derive(Debug, Error)]
pub enum ScoreError {
  #[error(transparent)]
  Llm(#[from] LlmError),
  #[error("profile output has no '{0}: <number>' entry")]
  MissingLabel(&'static str),
  #[error("profile score for '{label}' is {value}, outside 0..=100")]
  OutOfRange { label: &'static str, value: u32 },
}

/// Failures appending the result row.
#[derive(Debug, Error)]
pub enum SinkError {
  #[error("credential error: {0}")]
  Credential(String),
  #[error("spreadsheet '{0}' not found or not shared with the service account")]
  SpreadsheetNotFound(String),
  #[error("spreadsheet has no worksheets")]
  NoWorksheet,
  #[error("sheets HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("sink transport error: {0}")]
  Transport(String),
  #[error("sink io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionnaireError {
  #[error("unknown questionnaire field '{0}'")]
  UnknownField(String),
  #[error("'{value}' is not an option of '{field}'")]
  InvalidAnswer { field: String, value: String },
  #[error("field '{0}' accepts a single answer")]
  NotMultiple(String),
}

/// Everything a client request can fail with.
#[derive(Debug, Error)]
pub enum SurveyError {
  #[error("session '{0}' not found")]
  UnknownSession(String),
  #[error("input not accepted while in phase {0:?}")]
  UnexpectedInput(Phase),
  #[error("internal event {event} not expected while in phase {phase:?}")]
  UnexpectedEvent { event: &'static str, phase: Phase },
  #[error("profile already computed for this session")]
  ProfileAlreadyComputed,
  #[error("questionnaire already submitted")]
  AlreadySubmitted,
  #[error(transparent)]
  Questionnaire(#[from] QuestionnaireError),
  #[error(transparent)]
  Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("missing environment variable {0}")]
  MissingEnv(&'static str),
  #[error("invalid value for {name}: {value}")]
  InvalidEnv { name: &'static str, value: String },
  #[error("http client: {0}")]
  Client(String),
  #[error("service account: {0}")]
  ServiceAccount(String),
}
