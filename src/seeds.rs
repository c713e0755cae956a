//! Built-in survey content: investor questions, news items and the
//! traditional profiling questionnaire. TOML config may replace the first two.

use serde::Serialize;

/// Opening questions, asked in order before any news item.
pub fn default_general_questions() -> Vec<String> {
  [
    "¿Cuál es tu objetivo principal al invertir?",
    "¿Cuál es tu horizonte temporal de inversión?",
    "¿Tienes experiencia previa invirtiendo en activos de mayor riesgo como acciones, criptomonedas o fondos alternativos?",
    "¿Estás dispuesto a sacrificar parte de la rentabilidad potencial a cambio de un impacto social o ambiental positivo?",
    "¿Qué opinas sobre el cambio climático?",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

/// Headlines the user reacts to.
pub fn default_news_items() -> Vec<String> {
  [
    "Repsol, entre las 50 empresas que más responsabilidad histórica tienen en el calentamiento global",
    "Amancio Ortega crea un fondo de 100 millones de euros para los afectados de la dana",
    "Freshly Cosmetics despide a 52 empleados en Reus, el 18% de la plantilla",
    "Wall Street y los mercados globales caen ante la incertidumbre por la guerra comercial y el temor a una recesión",
    "El mercado de criptomonedas se desploma: Bitcoin cae a 80.000 dólares, las altcoins se hunden en medio de una frenética liquidación",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

pub const DEFAULT_NEWS_PROMPT_PREFIX: &str = "¿Qué opinas sobre esta noticia?";

pub const SAVED_MESSAGE: &str = "Respuestas enviadas y guardadas exitosamente";
pub const CLOSING_MESSAGE: &str = "¡Gracias por completar tu perfil de inversor!";

/// One question of the final questionnaire.
#[derive(Debug, Serialize)]
pub struct FieldSeed {
  pub key: &'static str,
  pub label: &'static str,
  pub options: &'static [&'static str],
  pub multiple: bool,
}

/// The 12 questionnaire fields, in row order.
pub const QUESTIONNAIRE: [FieldSeed; 12] = [
  FieldSeed {
    key: "objetivo",
    label: "2.1. ¿Cuál es tu objetivo principal al invertir?",
    options: &["Preservar el capital (bajo riesgo)", "Obtener rentabilidad moderada", "Maximizar la rentabilidad (alto riesgo)"],
    multiple: false,
  },
  FieldSeed {
    key: "horizonte",
    label: "2.2. ¿Cuál es tu horizonte temporal de inversión?",
    options: &["Menos de 1 año", "Entre 1 y 5 años", "Más de 5 años"],
    multiple: false,
  },
  FieldSeed {
    key: "productos",
    label: "3.1. ¿Qué productos financieros conoces o has utilizado?",
    options: &["Cuentas de ahorro", "Fondos de inversión", "Acciones", "Bonos", "Derivados (futuros, opciones, CFD)", "Criptomonedas"],
    multiple: true,
  },
  FieldSeed {
    key: "volatilidad",
    label: "3.2. ¿Qué significa que una inversión tenga alta volatilidad?",
    options: &["Que tiene una rentabilidad garantizada", "Que su valor puede subir o bajar de forma significativa", "Que no se puede vender fácilmente"],
    multiple: false,
  },
  FieldSeed {
    key: "largo_plazo",
    label: "3.3. ¿Qué ocurre si mantienes una inversión en renta variable durante un largo periodo?",
    options: &["Siempre pierdes dinero", "Se reduce el riesgo en comparación con el corto plazo", "No afecta en nada al riesgo"],
    multiple: false,
  },
  FieldSeed {
    key: "frecuencia",
    label: "4.1. ¿Con qué frecuencia realizas inversiones?",
    options: &["Nunca", "Ocasionalmente (1 vez al año)", "Regularmente (varias veces al año)"],
    multiple: false,
  },
  FieldSeed {
    key: "experiencia",
    label: "4.2. ¿Cuántos años llevas invirtiendo en productos financieros complejos?",
    options: &["Ninguno", "Menos de 2 años", "Más de 2 años"],
    multiple: false,
  },
  FieldSeed {
    key: "reaccion_20",
    label: "5.1. ¿Qué harías si tu inversión pierde un 20% en un mes?",
    options: &["Vendería todo inmediatamente", "Esperaría a ver si se recupera", "Invertiría más, aprovechando la caída"],
    multiple: false,
  },
  FieldSeed {
    key: "combinacion",
    label: "5.2. ¿Cuál de las siguientes combinaciones preferirías?",
    options: &["Rentabilidad esperada 2%, riesgo muy bajo", "Rentabilidad esperada 5%, riesgo moderado", "Rentabilidad esperada 10%, riesgo alto"],
    multiple: false,
  },
  FieldSeed {
    key: "sostenibilidad",
    label: "6.1. ¿Te interesa que tus inversiones consideren criterios de sostenibilidad?",
    options: &["Sí", "No", "No lo sé"],
    multiple: false,
  },
  FieldSeed {
    key: "fondo_clima",
    label: "6.2. ¿Preferirías un fondo que invierte en empresas contra el cambio climático aunque la rentabilidad sea menor?",
    options: &["Sí", "No"],
    multiple: false,
  },
  FieldSeed {
    key: "importancia",
    label: "6.3. ¿Qué importancia das a no financiar sectores controvertidos?",
    options: &["Alta", "Media", "Baja"],
    multiple: false,
  },
];
