use serde::{Deserialize, Serialize};

use super::leaderboard::Leaderboard;
use super::payout::PayoutReceipt;
use super::quiz::{Question, Quiz, QuizMode};
use crate::game::SessionPhase;

/// Question as players see it: no correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub index: u32,
    pub text: String,
    pub options: Vec<String>,
}

impl PublicQuestion {
    pub fn from_question(index: u32, question: &Question) -> Self {
        Self {
            index,
            text: question.text.clone(),
            options: question.options.to_vec(),
        }
    }
}

/// Player-facing view of a quiz session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub quiz_code: String,
    pub mode: QuizMode,
    pub title: String,
    pub phase: SessionPhase,
    pub current_question: u32,
    pub question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<PublicQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<i64>,
}

impl SessionSnapshot {
    pub fn from_quiz(mode: QuizMode, quiz: &Quiz) -> Self {
        let phase = quiz.phase();
        let question = match phase {
            SessionPhase::Live { question } => quiz
                .question(question)
                .map(|q| PublicQuestion::from_question(question, q)),
            _ => None,
        };

        Self {
            quiz_code: quiz.quiz_code.clone(),
            mode,
            title: quiz.title.clone(),
            phase,
            current_question: phase.flags().current_question,
            question_count: quiz.question_count(),
            question,
            question_started_at: quiz.question_started_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostActionRequest {
    pub host_id: String,
}

/// Result of a host transition. `payout` is set when finishing a paid quiz
/// paid out its rewards; `payout_error` when that attempt failed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostActionResponse {
    pub session: SessionSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<PayoutReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionUpdate(SessionSnapshot),
    LeaderboardUpdate(Leaderboard),
    SessionClosed(SessionClosed),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosed {
    pub quiz_code: String,
    pub message: String,
}

impl SessionEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::SessionUpdate(_) => "session-update",
            SessionEvent::LeaderboardUpdate(_) => "leaderboard-update",
            SessionEvent::SessionClosed(_) => "session-closed",
        }
    }
}
