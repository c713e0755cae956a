//! Conversation state machine.
//!
//! `Session::handle` is a pure transition: it mutates the session and returns
//! the effects (model calls, row append) the caller must perform. Each effect's
//! outcome comes back as another `Event`. Rendering reads the session.
//!
//! Phases run strictly in order:
//! GeneralQuestions -> NewsReaction -> ProfileGeneration -> Questionnaire -> Done.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{AmbiguousVerdict, FlowPolicy, SurveyCfg};
use crate::domain::{ProfileScore, Turn};
use crate::error::SurveyError;
use crate::evaluator::Verdict;
use crate::questionnaire::QuestionnaireAnswers;
use crate::seeds::{CLOSING_MESSAGE, SAVED_MESSAGE};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  GeneralQuestions,
  NewsReaction,
  ProfileGeneration,
  Questionnaire,
  Done,
}

/// Inputs to the state machine: client actions and effect outcomes.
#[derive(Clone, Debug)]
pub enum Event {
  UserMessage(String),
  Verdict(Verdict),
  FollowUp(String),
  ProfileReady(ProfileScore),
  ProfileFailed(String),
  RetryProfile,
  Submit(QuestionnaireAnswers),
  Persisted,
  PersistFailed(String),
}

impl Event {
  fn name(&self) -> &'static str {
    match self {
      Event::UserMessage(_) => "user_message",
      Event::Verdict(_) => "verdict",
      Event::FollowUp(_) => "follow_up",
      Event::ProfileReady(_) => "profile_ready",
      Event::ProfileFailed(_) => "profile_failed",
      Event::RetryProfile => "retry_profile",
      Event::Submit(_) => "submit",
      Event::Persisted => "persisted",
      Event::PersistFailed(_) => "persist_failed",
    }
  }
}

/// Work the caller must do before the session can move on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
  EvaluateAnswer(String),
  GenerateFollowUp(String),
  ScoreProfile(Vec<String>),
  AppendRow(Vec<String>),
}

/// What the session is blocked on.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Awaiting {
  User,
  Verdict(String),
  FollowUpQuestion(String),
  Profile,
  ProfileRetry,
  Submission,
  Persist,
  Nothing,
}

#[derive(Clone, Debug)]
pub struct Session {
  id: String,
  survey: Arc<SurveyCfg>,
  policy: FlowPolicy,

  phase: Phase,
  awaiting: Awaiting,
  turns: Vec<Turn>,
  general_idx: usize,
  news_idx: usize,
  // Current question/news item already shown.
  prompted: bool,
  follow_up_pending: bool,
  follow_up_rounds: u32,
  reactions: Vec<String>,
  profile: Option<ProfileScore>,
  answers: Option<QuestionnaireAnswers>,
  submitted: bool,
  last_error: Option<String>,
}

impl Session {
  /// New session; the first question is already in the transcript.
  pub fn new(id: impl Into<String>, survey: Arc<SurveyCfg>, policy: FlowPolicy) -> (Self, Vec<Effect>) {
    let mut s = Self {
      id: id.into(),
      survey,
      policy,
      phase: Phase::GeneralQuestions,
      awaiting: Awaiting::Nothing,
      turns: Vec::new(),
      general_idx: 0,
      news_idx: 0,
      prompted: false,
      follow_up_pending: false,
      follow_up_rounds: 0,
      reactions: Vec::new(),
      profile: None,
      answers: None,
      submitted: false,
      last_error: None,
    };
    let effects = s.advance();
    (s, effects)
  }

  pub fn id(&self) -> &str { &self.id }
  pub fn phase(&self) -> Phase { self.phase }
  pub fn turns(&self) -> &[Turn] { &self.turns }
  pub fn reactions(&self) -> &[String] { &self.reactions }
  pub fn profile(&self) -> Option<&ProfileScore> { self.profile.as_ref() }
  pub fn answers(&self) -> Option<&QuestionnaireAnswers> { self.answers.as_ref() }
  pub fn submitted(&self) -> bool { self.submitted }
  pub fn follow_up_pending(&self) -> bool { self.follow_up_pending }
  pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

  /// True while a model call or row append is outstanding.
  pub fn is_busy(&self) -> bool {
    matches!(self.awaiting, Awaiting::Verdict(_) | Awaiting::FollowUpQuestion(_) | Awaiting::Profile | Awaiting::Persist)
  }

  /// True when scoring failed and a retry is possible.
  pub fn can_retry_profile(&self) -> bool {
    self.awaiting == Awaiting::ProfileRetry
  }

  /// Number of columns every persisted row has for this survey.
  pub fn row_len(&self) -> usize {
    self.survey.general_questions.len() + self.survey.news.len() + 4 + crate::seeds::QUESTIONNAIRE.len()
  }

  pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, SurveyError> {
    let name = event.name();
    match event {
      Event::UserMessage(text) => self.on_user_message(text),
      Event::Verdict(v) => self.on_verdict(v, name),
      Event::FollowUp(q) => self.on_follow_up(q, name),
      Event::ProfileReady(p) => self.on_profile_ready(p, name),
      Event::ProfileFailed(reason) => {
        self.expect(Awaiting::Profile, name)?;
        self.awaiting = Awaiting::ProfileRetry;
        self.last_error = Some(reason);
        Ok(vec![])
      }
      Event::RetryProfile => self.on_retry_profile(),
      Event::Submit(answers) => self.on_submit(answers),
      Event::Persisted => {
        self.expect(Awaiting::Persist, name)?;
        self.submitted = true;
        self.turns.push(Turn::bot(SAVED_MESSAGE));
        self.turns.push(Turn::bot(CLOSING_MESSAGE));
        self.phase = Phase::Done;
        Ok(self.advance())
      }
      Event::PersistFailed(reason) => {
        self.expect(Awaiting::Persist, name)?;
        self.awaiting = Awaiting::Submission;
        self.last_error = Some(reason);
        Ok(vec![])
      }
    }
  }

  fn expect(&self, awaiting: Awaiting, event: &'static str) -> Result<(), SurveyError> {
    if self.awaiting == awaiting {
      Ok(())
    } else {
      Err(SurveyError::UnexpectedEvent { event, phase: self.phase })
    }
  }

  /// Show the current prompt (once) or move to the next phase when the
  /// current one is exhausted.
  fn advance(&mut self) -> Vec<Effect> {
    loop {
      match self.phase {
        Phase::GeneralQuestions => {
          if let Some(q) = self.survey.general_questions.get(self.general_idx) {
            if !self.prompted {
              self.turns.push(Turn::bot(q.clone()));
              self.prompted = true;
            }
            self.awaiting = Awaiting::User;
            return vec![];
          }
          self.phase = Phase::NewsReaction;
          self.prompted = false;
        }
        Phase::NewsReaction => {
          if let Some(prompt) = self.survey.news_prompt(self.news_idx) {
            if !self.prompted {
              self.turns.push(Turn::bot(prompt));
              self.prompted = true;
            }
            self.awaiting = Awaiting::User;
            return vec![];
          }
          self.phase = Phase::ProfileGeneration;
        }
        Phase::ProfileGeneration => {
          self.awaiting = Awaiting::Profile;
          return vec![Effect::ScoreProfile(self.reactions.clone())];
        }
        Phase::Questionnaire => {
          self.awaiting = Awaiting::Submission;
          return vec![];
        }
        Phase::Done => {
          self.awaiting = Awaiting::Nothing;
          return vec![];
        }
      }
    }
  }

  fn on_user_message(&mut self, text: String) -> Result<Vec<Effect>, SurveyError> {
    if self.awaiting != Awaiting::User {
      return Err(SurveyError::UnexpectedInput(self.phase));
    }
    self.last_error = None;
    self.turns.push(Turn::user(text.clone()));
    match self.phase {
      Phase::GeneralQuestions => {
        self.reactions.push(text);
        self.general_idx += 1;
        self.prompted = false;
        Ok(self.advance())
      }
      Phase::NewsReaction => {
        if self.follow_up_pending && self.follow_up_rounds >= self.policy.max_follow_ups {
          return Ok(self.resolve_news(text));
        }
        self.awaiting = Awaiting::Verdict(text.clone());
        Ok(vec![Effect::EvaluateAnswer(text)])
      }
      // Awaiting::User only occurs in the two phases above.
      other => Err(SurveyError::UnexpectedInput(other)),
    }
  }

  fn on_verdict(&mut self, verdict: Verdict, name: &'static str) -> Result<Vec<Effect>, SurveyError> {
    let Awaiting::Verdict(answer) = self.awaiting.clone() else {
      return Err(SurveyError::UnexpectedEvent { event: name, phase: self.phase });
    };
    let wants_follow_up = match &verdict {
      Verdict::Ambiguous(_) => self.policy.ambiguous_verdict == AmbiguousVerdict::FollowUp,
      v if !v.is_sufficient() => true,
      _ => self.policy.always_follow_up && self.follow_up_rounds == 0,
    };
    if wants_follow_up && self.follow_up_rounds < self.policy.max_follow_ups {
      self.awaiting = Awaiting::FollowUpQuestion(answer.clone());
      return Ok(vec![Effect::GenerateFollowUp(answer)]);
    }
    Ok(self.resolve_news(answer))
  }

  fn on_follow_up(&mut self, question: String, name: &'static str) -> Result<Vec<Effect>, SurveyError> {
    if !matches!(self.awaiting, Awaiting::FollowUpQuestion(_)) {
      return Err(SurveyError::UnexpectedEvent { event: name, phase: self.phase });
    }
    self.turns.push(Turn::bot(question));
    self.follow_up_pending = true;
    self.follow_up_rounds += 1;
    self.awaiting = Awaiting::User;
    Ok(vec![])
  }

  fn resolve_news(&mut self, answer: String) -> Vec<Effect> {
    self.reactions.push(answer);
    self.news_idx += 1;
    self.follow_up_pending = false;
    self.follow_up_rounds = 0;
    self.prompted = false;
    self.advance()
  }

  fn on_profile_ready(&mut self, profile: ProfileScore, name: &'static str) -> Result<Vec<Effect>, SurveyError> {
    if self.profile.is_some() {
      return Err(SurveyError::ProfileAlreadyComputed);
    }
    self.expect(Awaiting::Profile, name)?;
    self.turns.push(Turn::bot(profile.summary()));
    self.profile = Some(profile);
    self.phase = Phase::Questionnaire;
    Ok(self.advance())
  }

  fn on_retry_profile(&mut self) -> Result<Vec<Effect>, SurveyError> {
    if self.profile.is_some() {
      return Err(SurveyError::ProfileAlreadyComputed);
    }
    if self.awaiting != Awaiting::ProfileRetry {
      return Err(SurveyError::UnexpectedInput(self.phase));
    }
    self.last_error = None;
    self.awaiting = Awaiting::Profile;
    Ok(vec![Effect::ScoreProfile(self.reactions.clone())])
  }

  fn on_submit(&mut self, answers: QuestionnaireAnswers) -> Result<Vec<Effect>, SurveyError> {
    if self.submitted {
      return Err(SurveyError::AlreadySubmitted);
    }
    if self.awaiting != Awaiting::Submission {
      return Err(SurveyError::UnexpectedInput(self.phase));
    }
    answers.validate()?;
    self.last_error = None;

    let mut row = self.reactions.clone();
    row.extend(self.profile.map(|p| p.to_columns()).unwrap_or_else(|| vec![String::new(); 4]));
    row.extend(answers.to_columns());
    debug_assert_eq!(row.len(), self.row_len());

    self.answers = Some(answers);
    self.awaiting = Awaiting::Persist;
    Ok(vec![Effect::AppendRow(row)])
  }
}
