//! Response evaluator: asks the model whether a news reaction is detailed
//! enough, and writes the follow-up question when it is not.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::Prompts;
use crate::error::LlmError;
use crate::openai::LlmGateway;
use crate::util::{fill_template, strip_wrapping_quotes, trunc_for_log};

/// The model's judgement on one answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "raw", rename_all = "snake_case")]
pub enum Verdict {
  Sufficient,
  Insufficient,
  /// Anything but "true"/"false"; carries the raw model output.
  Ambiguous(String),
}

impl Verdict {
  /// Classify raw model output. Case, surrounding whitespace, one layer of
  /// quotes and a trailing period are ignored.
  pub fn parse(raw: &str) -> Self {
    let outer = raw.trim().trim_end_matches('.');
    let norm = strip_wrapping_quotes(outer).trim_end_matches('.').trim().to_lowercase();
    match norm.as_str() {
      "true" => Verdict::Sufficient,
      "false" => Verdict::Insufficient,
      _ => Verdict::Ambiguous(raw.to_string()),
    }
  }

  /// Only an explicit "false" means the answer needs elaboration.
  pub fn is_sufficient(&self) -> bool {
    !matches!(self, Verdict::Insufficient)
  }
}

#[instrument(level = "info", skip(llm, prompts, answer), fields(answer_len = answer.len()))]
pub async fn evaluate(llm: &dyn LlmGateway, prompts: &Prompts, answer: &str) -> Result<Verdict, LlmError> {
  let prompt = fill_template(&prompts.evaluation_template, &[("respuesta", answer)]);
  let raw = llm.complete(&prompts.evaluation_system, &prompt).await?;
  let verdict = Verdict::parse(&raw);
  match &verdict {
    Verdict::Ambiguous(raw) => {
      warn!(target: "survey", raw = %trunc_for_log(raw, 80), "Evaluator output is neither True nor False");
    }
    v => debug!(target: "survey", verdict = ?v, "Answer evaluated"),
  }
  Ok(verdict)
}

#[instrument(level = "info", skip(llm, prompts, reaction), fields(reaction_len = reaction.len()))]
pub async fn follow_up_question(llm: &dyn LlmGateway, prompts: &Prompts, reaction: &str) -> Result<String, LlmError> {
  let prompt = fill_template(&prompts.follow_up_template, &[("reaccion", reaction)]);
  let raw = llm.complete(&prompts.follow_up_system, &prompt).await?;
  let question = strip_wrapping_quotes(&raw).to_string();
  if question.is_empty() {
    return Err(LlmError::Empty);
  }
  Ok(question)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::openai::testing::ScriptedLlm;

  #[test]
  fn parse_is_case_and_whitespace_tolerant() {
    assert_eq!(Verdict::parse("False"), Verdict::Insufficient);
    assert_eq!(Verdict::parse("FALSE "), Verdict::Insufficient);
    assert_eq!(Verdict::parse("\"False\"."), Verdict::Insufficient);
    assert_eq!(Verdict::parse(" true\n"), Verdict::Sufficient);
  }

  #[test]
  fn anything_else_is_ambiguous_but_passes() {
    let v = Verdict::parse("maybe");
    assert_eq!(v, Verdict::Ambiguous("maybe".into()));
    assert!(v.is_sufficient());
    assert!(Verdict::parse("").is_sufficient());
    assert!(!Verdict::parse("false").is_sufficient());
  }

  #[tokio::test]
  async fn evaluate_fills_the_template_with_the_raw_answer() {
    let llm = ScriptedLlm::new(["False"]);
    let v = evaluate(&llm, &Prompts::default(), "bien").await.expect("verdict");
    assert_eq!(v, Verdict::Insufficient);
    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Respuesta del usuario: bien"));
  }

  #[tokio::test]
  async fn follow_up_strips_quotes() {
    let llm = ScriptedLlm::new(["\"¿Por qué crees que Repsol debería cambiar?\""]);
    let q = follow_up_question(&llm, &Prompts::default(), "mal").await.expect("question");
    assert_eq!(q, "¿Por qué crees que Repsol debería cambiar?");
    assert!(llm.prompts.lock().unwrap()[0].contains("Reacción del inversor: mal"));
  }
}
