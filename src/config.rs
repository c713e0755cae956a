//! Loading the survey configuration (prompts, survey content, follow-up policy,
//! spreadsheet target) from TOML.
//!
//! Every section is optional; missing ones fall back to the built-in defaults.

use serde::Deserialize;
use tracing::{error, info};

use crate::seeds::{default_general_questions, default_news_items, DEFAULT_NEWS_PROMPT_PREFIX};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub survey: SurveyCfg,
  #[serde(default)]
  pub policy: FlowPolicy,
  #[serde(default)]
  pub sheet: SheetCfg,
}

/// Prompt templates sent to the model. Each has a single `{slot}`.
/// The `*_system` prompts are sent as a system message when non-empty.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub evaluation_system: String,
  /// Slot: `{respuesta}`.
  pub evaluation_template: String,
  pub follow_up_system: String,
  /// Slot: `{reaccion}`.
  pub follow_up_template: String,
  pub profile_system: String,
  /// Slot: `{analisis}`.
  pub profile_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      evaluation_system: String::new(),
      evaluation_template: r#"
Evalúa si esta respuesta del usuario es suficientemente detallada para un análisis ESG.
Criterios:
- Claridad de la opinión
- Especificidad respecto a la noticia
- Mención de aspectos ESG (ambiental, social, gobernanza o riesgo)
- Identificación de preocupaciones o riesgos

Respuesta del usuario: {respuesta}

Si es vaga o superficial, responde "False".
Si contiene opinión sustancial y analizable, responde "True".

Solo responde "True" o "False".
"#
      .into(),
      follow_up_system: String::new(),
      follow_up_template: r#"
Reacción del inversor: {reaccion}
Genera ÚNICAMENTE una pregunta de seguimiento enfocada en profundizar en su opinión.
Ejemplo:
"¿Consideras que la existencia de mecanismos robustos de control interno y transparencia podría mitigar tu preocupación por la gobernanza corporativa en esta empresa?"
"#
      .into(),
      profile_system: String::new(),
      profile_template: r#"
Análisis de respuestas: {analisis}
Genera un perfil detallado del inversor basado en sus respuestas, enfocándote en los pilares ESG (Ambiental, Social y Gobernanza) y su aversión al riesgo.
Asigna una puntuación de 0 a 100 para cada pilar ESG y para el riesgo, donde 0 indica ninguna preocupación y 100 máxima preocupación o aversión.
Devuelve las 4 puntuaciones en formato: Ambiental: [puntuación], Social: [puntuación], Gobernanza: [puntuación], Riesgo: [puntuación]
"#
      .into(),
    }
  }
}

/// What the chatbot asks.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SurveyCfg {
  pub general_questions: Vec<String>,
  pub news: Vec<String>,
  pub news_prompt_prefix: String,
}

impl Default for SurveyCfg {
  fn default() -> Self {
    Self {
      general_questions: default_general_questions(),
      news: default_news_items(),
      news_prompt_prefix: DEFAULT_NEWS_PROMPT_PREFIX.into(),
    }
  }
}

impl SurveyCfg {
  pub fn news_prompt(&self, idx: usize) -> Option<String> {
    self.news.get(idx).map(|item| format!("{} {}", self.news_prompt_prefix, item))
  }
}

/// What to do when the evaluator answers neither "true" nor "false".
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousVerdict {
  /// Treat as detailed enough (historical behavior).
  #[default]
  Accept,
  /// Ask a follow-up question, like an explicit "false".
  FollowUp,
}

/// Follow-up loop knobs for the news phase.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FlowPolicy {
  /// Follow-up rounds allowed per news item; the answer after the last one
  /// resolves the item whatever it says.
  pub max_follow_ups: u32,
  pub ambiguous_verdict: AmbiguousVerdict,
  /// Ask one follow-up even when the first answer was judged sufficient.
  pub always_follow_up: bool,
}

impl Default for FlowPolicy {
  fn default() -> Self {
    Self { max_follow_ups: 1, ambiguous_verdict: AmbiguousVerdict::Accept, always_follow_up: false }
  }
}

/// Where result rows go.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SheetCfg {
  /// Looked up through the Drive API when `spreadsheet_id` is not set.
  pub spreadsheet_name: String,
  pub spreadsheet_id: Option<String>,
  /// First worksheet when unset.
  pub worksheet: Option<String>,
}

impl Default for SheetCfg {
  fn default() -> Self {
    Self { spreadsheet_name: "BBDD_RESPUESTAS".into(), spreadsheet_id: None, worksheet: None }
  }
}

/// Attempt to load `AgentConfig` from SURVEY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("SURVEY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "esg_profiler", %path, "Loaded survey config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "esg_profiler", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "esg_profiler", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
