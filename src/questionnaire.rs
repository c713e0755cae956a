//! The traditional profiling questionnaire: answer set, validation and the
//! 12 row columns it contributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuestionnaireError;
use crate::seeds::{FieldSeed, QUESTIONNAIRE};

/// A single- or multi-choice answer as sent by the client.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnswerValue {
  One(String),
  Many(Vec<String>),
}

/// Answers keyed by field name. Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct QuestionnaireAnswers(pub BTreeMap<String, Option<AnswerValue>>);

pub fn form() -> &'static [FieldSeed] {
  &QUESTIONNAIRE
}

fn field(key: &str) -> Option<&'static FieldSeed> {
  QUESTIONNAIRE.iter().find(|f| f.key == key)
}

impl QuestionnaireAnswers {
  /// Rejects unknown fields and values that are not among a field's options.
  /// Blank answers are always fine.
  pub fn validate(&self) -> Result<(), QuestionnaireError> {
    for (key, value) in &self.0 {
      let f = field(key).ok_or_else(|| QuestionnaireError::UnknownField(key.clone()))?;
      let picked: Vec<&str> = match value {
        None => continue,
        Some(AnswerValue::One(s)) => vec![s.as_str()],
        Some(AnswerValue::Many(v)) => {
          if !f.multiple && v.len() > 1 {
            return Err(QuestionnaireError::NotMultiple(key.clone()));
          }
          v.iter().map(String::as_str).collect()
        }
      };
      for p in picked.into_iter().filter(|p| !p.is_empty()) {
        if !f.options.contains(&p) {
          return Err(QuestionnaireError::InvalidAnswer { field: key.clone(), value: p.to_string() });
        }
      }
    }
    Ok(())
  }

  /// One column per field in form order; multi-choice answers are joined with ", ".
  pub fn to_columns(&self) -> Vec<String> {
    QUESTIONNAIRE
      .iter()
      .map(|f| match self.0.get(f.key) {
        Some(Some(AnswerValue::One(s))) => s.clone(),
        Some(Some(AnswerValue::Many(v))) => v.join(", "),
        _ => String::new(),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> QuestionnaireAnswers {
    serde_json::from_str(json).expect("answers json")
  }

  #[test]
  fn empty_submission_yields_twelve_blank_columns() {
    let a = QuestionnaireAnswers::default();
    assert!(a.validate().is_ok());
    let cols = a.to_columns();
    assert_eq!(cols.len(), 12);
    assert!(cols.iter().all(|c| c.is_empty()));
  }

  #[test]
  fn columns_follow_form_order_and_join_products() {
    let a = parse(r#"{
      "importancia": "Alta",
      "objetivo": "Obtener rentabilidad moderada",
      "productos": ["Acciones", "Bonos"],
      "horizonte": null
    }"#);
    a.validate().expect("valid");
    let cols = a.to_columns();
    assert_eq!(cols[0], "Obtener rentabilidad moderada");
    assert_eq!(cols[1], "");
    assert_eq!(cols[2], "Acciones, Bonos");
    assert_eq!(cols[11], "Alta");
  }

  #[test]
  fn rejects_values_outside_the_options() {
    let a = parse(r#"{ "fondo_clima": "Quizás" }"#);
    assert_eq!(
      a.validate(),
      Err(QuestionnaireError::InvalidAnswer { field: "fondo_clima".into(), value: "Quizás".into() })
    );
    let a = parse(r#"{ "color": "azul" }"#);
    assert_eq!(a.validate(), Err(QuestionnaireError::UnknownField("color".into())));
  }

  #[test]
  fn single_choice_fields_refuse_several_answers() {
    let a = parse(r#"{ "importancia": ["Alta", "Baja"] }"#);
    assert_eq!(a.validate(), Err(QuestionnaireError::NotMultiple("importancia".into())));
  }
}
