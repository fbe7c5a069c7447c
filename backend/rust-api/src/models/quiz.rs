use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::errors::GameError;
use crate::game::{LegacyFlags, SessionPhase};

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const MAX_QUESTIONS: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    Free,
    Paid,
}

impl QuizMode {
    pub fn prefix(self) -> &'static str {
        match self {
            QuizMode::Free => "TBF",
            QuizMode::Paid => "TBP",
        }
    }

    /// Root of the quiz documents for this mode.
    pub fn namespace(self) -> &'static str {
        match self {
            QuizMode::Free => "quizzes",
            QuizMode::Paid => "paid_quizzes",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Free => "free",
            QuizMode::Paid => "paid",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "TBF" => Some(QuizMode::Free),
            "TBP" => Some(QuizMode::Paid),
            _ => None,
        }
    }
}

/// Session key: `TBF`/`TBP` followed by five upper-case alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode {
    code: String,
    mode: QuizMode,
}

impl InviteCode {
    pub const LEN: usize = 8;
    pub const SUFFIX_LEN: usize = 5;

    /// Trims and upper-cases, then checks prefix and suffix.
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != Self::LEN || !code.is_ascii() {
            return Err(GameError::InvalidInviteCode);
        }

        let (prefix, suffix) = code.split_at(3);
        let mode = QuizMode::from_prefix(prefix).ok_or(GameError::InvalidInviteCode)?;
        if !suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(GameError::InvalidInviteCode);
        }

        Ok(Self { code, mode })
    }

    /// Builds a code from a suffix already drawn from an upper-case
    /// alphanumeric alphabet.
    pub(crate) fn from_suffix(mode: QuizMode, suffix: &str) -> Self {
        Self {
            code: format!("{}{}", mode.prefix(), suffix),
            mode,
        }
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }
}

impl FromStr for InviteCode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.code
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub correct_answer: Option<u8>,
}

impl Question {
    pub fn is_correct(&self, answer: u8) -> bool {
        self.correct_answer == Some(answer)
    }

    pub fn correct_option(&self) -> &str {
        self.correct_answer
            .and_then(|i| self.options.get(usize::from(i)))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Quiz document at `{quizzes|paid_quizzes}/{code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    // Empty lists are not stored, so a quiz without questions has no key.
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(rename = "quizCode")]
    pub quiz_code: String,
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    pub timestamp: i64,
    #[serde(default)]
    pub game_start: bool,
    #[serde(default)]
    pub quiz_checker: bool,
    #[serde(default)]
    pub current_question: u32,
    #[serde(default)]
    pub next_question: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<SessionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Quiz {
    pub fn question_count(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }

    /// Explicit phase, or the one implied by the legacy flags.
    pub fn phase(&self) -> SessionPhase {
        self.phase.unwrap_or_else(|| {
            SessionPhase::from_flags(
                LegacyFlags {
                    game_start: self.game_start,
                    quiz_checker: self.quiz_checker,
                    current_question: self.current_question,
                    next_question: self.next_question,
                },
                self.question_count(),
            )
        })
    }

    pub fn question(&self, index: u32) -> Option<&Question> {
        self.questions.get(usize::try_from(index).ok()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    pub mode: QuizMode,
    #[validate(length(max = 200, message = "Title must be at most 200 characters."))]
    pub title: String,
    #[validate(length(max = 99, message = "A quiz can have at most 99 questions."))]
    pub questions: Vec<QuestionInput>,
    pub wallet_address: Option<String>,
    #[validate(email(message = "Please enter a valid email."))]
    pub email: Option<String>,
}

impl From<&Question> for QuestionInput {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text.clone(),
            options: question.options.to_vec(),
            correct_answer: question.correct_answer,
        }
    }
}

/// Question set stored at `templates/{template}` that prefills authoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizTemplate {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveTemplateRequest {
    pub title: String,
    pub questions: Vec<QuestionInput>,
}

/// Publishes a free quiz from a template. Title and questions default to
/// the template's; any edits made in the form replace them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFromTemplateRequest {
    pub title: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
    pub wallet_address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizResponse {
    pub quiz_code: String,
    pub mode: QuizMode,
    pub creator: String,
    pub question_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorQuiz {
    pub creator: String,
    pub quiz_code: String,
    pub mode: QuizMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = InviteCode::parse("  tbf1a2b3 ").unwrap();
        assert_eq!(code.as_str(), "TBF1A2B3");
        assert_eq!(code.mode(), QuizMode::Free);
        assert_eq!(InviteCode::parse("TBPZZ9Q0").unwrap().mode(), QuizMode::Paid);
    }

    #[test]
    fn parse_rejects_bad_codes() {
        for raw in ["", "TBF1234", "TBF123456", "ABC12345", "TBF12-45", "TBF1234é"] {
            assert!(InviteCode::parse(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn legacy_quiz_without_phase_infers_it_from_flags() {
        let quiz: Quiz = serde_json::from_value(serde_json::json!({
            "title": "t",
            "questions": [{ "text": "q", "options": ["a", "b", "c", "d"], "correctAnswer": 0 }],
            "quizCode": "TBF12345",
            "walletAddress": "NW-ABC",
            "timestamp": 1,
            "game_start": true,
            "quiz_checker": true,
            "current_question": 0
        }))
        .unwrap();

        assert_eq!(quiz.phase(), SessionPhase::Live { question: 0 });
        assert_eq!(quiz.question(0).unwrap().correct_option(), "a");
    }
}
