//! Profile scorer: one model call over all reactions, then four
//! `Label: number` captures turned into a `ProfileScore`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument};

use crate::config::Prompts;
use crate::domain::{ProfileScore, SCORE_LABELS};
use crate::error::ScoreError;
use crate::openai::LlmGateway;
use crate::util::{fill_template, trunc_for_log};

static LABEL_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
  SCORE_LABELS.map(|label| {
    Regex::new(&format!(r"{label}:\s*(\d+)")).expect("static score pattern")
  })
});

/// Extract the four scores. All must be present and within 0..=100.
pub fn parse_profile(text: &str) -> Result<ProfileScore, ScoreError> {
  let mut values = [0u32; 4];
  for (i, re) in LABEL_PATTERNS.iter().enumerate() {
    let label = SCORE_LABELS[i];
    let digits = re
      .captures(text)
      .and_then(|c| c.get(1))
      .ok_or(ScoreError::MissingLabel(label))?
      .as_str();
    // Digit runs too long for u32 are out of range by definition.
    let value = digits.parse::<u32>().unwrap_or(u32::MAX);
    if value > 100 {
      return Err(ScoreError::OutOfRange { label, value });
    }
    values[i] = value;
  }
  Ok(ProfileScore { environmental: values[0], social: values[1], governance: values[2], risk: values[3] })
}

#[instrument(level = "info", skip(llm, prompts, reactions), fields(reactions = reactions.len()))]
pub async fn score(llm: &dyn LlmGateway, prompts: &Prompts, reactions: &[String]) -> Result<ProfileScore, ScoreError> {
  let analysis = reactions.join("\n");
  let prompt = fill_template(&prompts.profile_template, &[("analisis", &analysis)]);
  let raw = llm.complete(&prompts.profile_system, &prompt).await?;
  debug!(target: "survey", raw = %trunc_for_log(&raw, 200), "Profile completion");
  let profile = parse_profile(&raw)?;
  info!(target: "survey", ?profile, "Profile scored");
  Ok(profile)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::openai::testing::ScriptedLlm;

  #[test]
  fn parses_the_requested_format() {
    let p = parse_profile("Ambiental: 80, Social: 65, Gobernanza: 40, Riesgo: 70").expect("profile");
    assert_eq!(p, ProfileScore { environmental: 80, social: 65, governance: 40, risk: 70 });
  }

  #[test]
  fn tolerates_prose_and_line_breaks_around_the_scores() {
    let text = "El inversor muestra gran preocupación ambiental.\n\nAmbiental: 90\nSocial:55\nGobernanza:  30\nRiesgo: 0\n";
    let p = parse_profile(text).expect("profile");
    assert_eq!(p.entries().map(|(_, v)| v), [90, 55, 30, 0]);
  }

  #[test]
  fn missing_label_is_an_error() {
    let err = parse_profile("Ambiental: 80, Social: 65, Riesgo: 70").unwrap_err();
    assert!(matches!(err, ScoreError::MissingLabel("Gobernanza")));
    let err = parse_profile("Ambiental: alto, Social: 65, Gobernanza: 1, Riesgo: 2").unwrap_err();
    assert!(matches!(err, ScoreError::MissingLabel("Ambiental")));
  }

  #[test]
  fn out_of_range_is_an_error() {
    let err = parse_profile("Ambiental: 80, Social: 165, Gobernanza: 40, Riesgo: 70").unwrap_err();
    assert!(matches!(err, ScoreError::OutOfRange { label: "Social", value: 165 }));
  }

  #[tokio::test]
  async fn score_sends_all_reactions_joined_by_newlines_in_one_call() {
    let reactions: Vec<String> = vec![
      "Me preocupa el cambio climático".into(),
      "Prefiero baja volatilidad".into(),
      "Largo plazo".into(),
      "Sí".into(),
      "Es grave".into(),
      "Repsol debe cambiar".into(),
      "Buena iniciativa".into(),
      "Mala gestión".into(),
      "Incertidumbre".into(),
      "Demasiado riesgo".into(),
    ];
    let llm = ScriptedLlm::new(["Perfil...\nAmbiental: 85, Social: 60, Gobernanza: 50, Riesgo: 75"]);
    let p = score(&llm, &Prompts::default(), &reactions).await.expect("profile");
    assert_eq!(p.risk, 75);
    assert_eq!(llm.calls(), 1);
    let prompt = llm.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains(&reactions.join("\n")));
  }
}
