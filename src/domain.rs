//! Domain models: conversation turns and the ESG + risk profile score.

use serde::{Deserialize, Serialize};

/// Who authored a turn of the transcript.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Bot,
  User,
}

/// One line of the chat transcript. Appended, never edited.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
  pub role: Role,
  pub text: String,
}

impl Turn {
  pub fn bot(text: impl Into<String>) -> Self {
    Self { role: Role::Bot, text: text.into() }
  }

  pub fn user(text: impl Into<String>) -> Self {
    Self { role: Role::User, text: text.into() }
  }
}

/// Labels the profile template asks the model to emit, in row order.
pub const SCORE_LABELS: [&str; 4] = ["Ambiental", "Social", "Gobernanza", "Riesgo"];

/// Four independent scores in 0..=100. Built all at once by the scorer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileScore {
  pub environmental: u32,
  pub social: u32,
  pub governance: u32,
  pub risk: u32,
}

impl ProfileScore {
  /// (label, value) pairs in the order they are shown and persisted.
  pub fn entries(&self) -> [(&'static str, u32); 4] {
    [
      (SCORE_LABELS[0], self.environmental),
      (SCORE_LABELS[1], self.social),
      (SCORE_LABELS[2], self.governance),
      (SCORE_LABELS[3], self.risk),
    ]
  }

  /// Summary line shown to the user once the profile is ready.
  pub fn summary(&self) -> String {
    let parts: Vec<String> = self
      .entries()
      .iter()
      .map(|(label, value)| format!("{label}: {value}"))
      .collect();
    format!("**Perfil del inversor:** {}", parts.join(", "))
  }

  pub fn to_columns(&self) -> Vec<String> {
    self.entries().iter().map(|(_, v)| v.to_string()).collect()
  }
}
