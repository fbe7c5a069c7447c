use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// `current_question` value written when a session ends. Readers treat any
/// index at or past it as "go to the final leaderboard".
pub const FINISHED_SENTINEL: u32 = 100;

/// Where a quiz session is. Stored next to the legacy flags under `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Live { question: u32 },
    BetweenQuestions { question: u32 },
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("Quiz has no questions")]
    NoQuestions,

    #[error("Quiz has already started")]
    AlreadyStarted,

    #[error("Quiz has not started yet")]
    NotStarted,

    #[error("No question is live")]
    NoLiveQuestion,

    #[error("Quiz has already finished")]
    AlreadyFinished,

    #[error("The session moved on before this action was applied")]
    Superseded,
}

/// Flag view of a phase, as written for readers that predate `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyFlags {
    pub game_start: bool,
    pub quiz_checker: bool,
    pub current_question: u32,
    pub next_question: bool,
}

impl LegacyFlags {
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("game_start".into(), json!(self.game_start));
        fields.insert("quiz_checker".into(), json!(self.quiz_checker));
        fields.insert("current_question".into(), json!(self.current_question));
        fields.insert("next_question".into(), json!(self.next_question));
        fields
    }
}

impl SessionPhase {
    /// Idle -> Live(0).
    pub fn start(self, question_count: u32) -> Result<Self, PhaseError> {
        match self {
            SessionPhase::Idle if question_count == 0 => Err(PhaseError::NoQuestions),
            SessionPhase::Idle => Ok(SessionPhase::Live { question: 0 }),
            SessionPhase::Finished => Err(PhaseError::AlreadyFinished),
            _ => Err(PhaseError::AlreadyStarted),
        }
    }

    /// Live(i) -> BetweenQuestions(i).
    pub fn close_question(self) -> Result<Self, PhaseError> {
        match self {
            SessionPhase::Live { question } => Ok(SessionPhase::BetweenQuestions { question }),
            SessionPhase::Idle => Err(PhaseError::NotStarted),
            SessionPhase::BetweenQuestions { .. } => Err(PhaseError::NoLiveQuestion),
            SessionPhase::Finished => Err(PhaseError::AlreadyFinished),
        }
    }

    /// Live(i) | BetweenQuestions(i) -> Live(i + 1), or Finished after the
    /// last question.
    pub fn advance(self, question_count: u32) -> Result<Self, PhaseError> {
        match self {
            SessionPhase::Live { question } | SessionPhase::BetweenQuestions { question } => {
                let next = question + 1;
                if next >= question_count {
                    Ok(SessionPhase::Finished)
                } else {
                    Ok(SessionPhase::Live { question: next })
                }
            }
            SessionPhase::Idle => Err(PhaseError::NotStarted),
            SessionPhase::Finished => Err(PhaseError::AlreadyFinished),
        }
    }

    pub fn finish(self) -> Result<Self, PhaseError> {
        match self {
            SessionPhase::Finished => Err(PhaseError::AlreadyFinished),
            _ => Ok(SessionPhase::Finished),
        }
    }

    pub fn question(self) -> Option<u32> {
        match self {
            SessionPhase::Live { question } | SessionPhase::BetweenQuestions { question } => {
                Some(question)
            }
            _ => None,
        }
    }

    pub fn is_accepting(self, index: u32) -> bool {
        self == SessionPhase::Live { question: index }
    }

    pub fn is_finished(self) -> bool {
        self == SessionPhase::Finished
    }

    pub fn flags(self) -> LegacyFlags {
        match self {
            SessionPhase::Idle => LegacyFlags {
                game_start: false,
                quiz_checker: false,
                current_question: 0,
                next_question: false,
            },
            SessionPhase::Live { question } => LegacyFlags {
                game_start: true,
                quiz_checker: true,
                current_question: question,
                next_question: question > 0,
            },
            SessionPhase::BetweenQuestions { question } => LegacyFlags {
                game_start: true,
                quiz_checker: false,
                current_question: question,
                next_question: false,
            },
            SessionPhase::Finished => LegacyFlags {
                game_start: true,
                quiz_checker: false,
                current_question: FINISHED_SENTINEL,
                next_question: false,
            },
        }
    }

    /// Reconstructs the phase of a record written with flags only.
    pub fn from_flags(flags: LegacyFlags, question_count: u32) -> Self {
        if !flags.game_start {
            return SessionPhase::Idle;
        }
        let question = flags.current_question;
        if question >= FINISHED_SENTINEL || question >= question_count {
            SessionPhase::Finished
        } else if flags.quiz_checker {
            SessionPhase::Live { question }
        } else {
            SessionPhase::BetweenQuestions { question }
        }
    }

    /// Store fields for this phase: `phase` plus the mirrored legacy flags.
    pub fn to_fields(self) -> Map<String, Value> {
        let mut fields = self.flags().into_fields();
        fields.insert("phase".into(), json!(self));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_session_walk() {
        let phase = SessionPhase::Idle.start(2).unwrap();
        assert_eq!(phase, SessionPhase::Live { question: 0 });
        let phase = phase.close_question().unwrap();
        assert_eq!(phase, SessionPhase::BetweenQuestions { question: 0 });
        let phase = phase.advance(2).unwrap();
        assert_eq!(phase, SessionPhase::Live { question: 1 });
        assert_eq!(phase.advance(2).unwrap(), SessionPhase::Finished);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert_eq!(SessionPhase::Idle.start(0), Err(PhaseError::NoQuestions));
        assert_eq!(
            SessionPhase::Live { question: 0 }.start(3),
            Err(PhaseError::AlreadyStarted)
        );
        assert_eq!(SessionPhase::Idle.advance(3), Err(PhaseError::NotStarted));
        assert_eq!(
            SessionPhase::BetweenQuestions { question: 1 }.close_question(),
            Err(PhaseError::NoLiveQuestion)
        );
        assert_eq!(SessionPhase::Finished.finish(), Err(PhaseError::AlreadyFinished));
    }

    #[test]
    fn current_question_never_decreases() {
        let mut phase = SessionPhase::Idle.start(5).unwrap();
        let mut last = phase.flags().current_question;
        while !phase.is_finished() {
            phase = phase.advance(5).unwrap();
            let current = phase.flags().current_question;
            assert!(current > last);
            last = current;
        }
        assert_eq!(last, FINISHED_SENTINEL);
    }

    #[test]
    fn legacy_flags_round_trip() {
        for phase in [
            SessionPhase::Idle,
            SessionPhase::Live { question: 0 },
            SessionPhase::Live { question: 2 },
            SessionPhase::BetweenQuestions { question: 1 },
            SessionPhase::Finished,
        ] {
            assert_eq!(SessionPhase::from_flags(phase.flags(), 3), phase);
        }
    }

    #[test]
    fn phase_serializes_with_status_tag() {
        let value = serde_json::to_value(SessionPhase::Live { question: 3 }).unwrap();
        assert_eq!(value, json!({ "status": "live", "question": 3 }));
        let fields = SessionPhase::Finished.to_fields();
        assert_eq!(fields["current_question"], json!(100));
        assert_eq!(fields["phase"], json!({ "status": "finished" }));
    }
}
