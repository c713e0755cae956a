//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ProfileScore, Turn};
use crate::questionnaire::{form, QuestionnaireAnswers};
use crate::seeds::FieldSeed;
use crate::survey::{Phase, Session};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Message {
        text: String,
    },
    SubmitQuestionnaire {
        answers: QuestionnaireAnswers,
    },
    RetryProfile,
    /// Drop the current session and start over.
    Reset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    Error {
        message: String,
    },
}

/// One bar of the profile chart.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BarOut {
    pub label: &'static str,
    pub value: u32,
}

/// Chart data; drawing is left to the client.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChartOut {
    pub title: &'static str,
    pub y_label: &'static str,
    pub y_max: u32,
    pub bars: Vec<BarOut>,
}

#[derive(Debug, Serialize)]
pub struct ProfileOut {
    pub scores: ProfileScore,
    pub chart: ChartOut,
}

impl From<&ProfileScore> for ProfileOut {
    fn from(p: &ProfileScore) -> Self {
        Self {
            scores: *p,
            chart: ChartOut {
                title: "Perfil del Inversor",
                y_label: "Puntuación (0-100)",
                y_max: 100,
                bars: p.entries().iter().map(|&(label, value)| BarOut { label, value }).collect(),
            },
        }
    }
}

/// DTO used by both WS and HTTP: everything a client needs to render a session.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub id: String,
    pub phase: Phase,
    pub turns: Vec<Turn>,
    /// A model call or save is in flight.
    pub busy: bool,
    pub follow_up_pending: bool,
    pub profile: Option<ProfileOut>,
    pub can_retry_profile: bool,
    /// Present while the questionnaire is open.
    pub questionnaire: Option<&'static [FieldSeed]>,
    pub submitted: bool,
    /// Answers of the last accepted submission.
    pub answers: Option<QuestionnaireAnswers>,
    pub last_error: Option<String>,
}

/// Convert a session (internal) to the public DTO.
pub fn to_out(s: &Session) -> SessionOut {
    SessionOut {
        id: s.id().to_string(),
        phase: s.phase(),
        turns: s.turns().to_vec(),
        busy: s.is_busy(),
        follow_up_pending: s.follow_up_pending(),
        profile: s.profile().map(ProfileOut::from),
        can_retry_profile: s.can_retry_profile(),
        questionnaire: (s.phase() == Phase::Questionnaire && !s.submitted()).then(form),
        submitted: s.submitted(),
        answers: s.answers().cloned(),
        last_error: s.last_error().map(str::to_string),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct MessageIn {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionnaireIn {
    #[serde(default)]
    pub answers: QuestionnaireAnswers,
}

#[derive(Serialize)]
pub struct QuestionnaireFormOut {
    pub fields: &'static [FieldSeed],
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"message","text":"hola"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Message { text } if text == "hola"));
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"submit_questionnaire","answers":{"importancia":"Alta"}}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SubmitQuestionnaire { .. }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"retry_profile"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::RetryProfile));
    }

    #[test]
    fn profile_chart_has_four_bars_in_label_order() {
        let p = ProfileScore { environmental: 1, social: 2, governance: 3, risk: 4 };
        let out = ProfileOut::from(&p);
        let labels: Vec<&str> = out.chart.bars.iter().map(|b| b.label).collect();
        assert_eq!(labels, ["Ambiental", "Social", "Gobernanza", "Riesgo"]);
        assert_eq!(out.chart.bars[3].value, 4);
    }
}
