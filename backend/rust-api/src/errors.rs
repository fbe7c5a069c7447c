use axum::http::StatusCode;

use crate::game::phase::PhaseError;
use crate::store::StoreError;

/// Failures of the quiz coordination operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("Quiz not found")]
    QuizNotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("This game has already started. You cannot join now.")]
    AlreadyStarted,

    #[error("This username is already taken in this game")]
    UsernameTaken,

    #[error("You can't use this name, please use another name")]
    UsernameNotAllowed,

    #[error("Please connect your wallet first")]
    WalletRequired,

    #[error("This wallet has already joined the game.")]
    WalletAlreadyJoined,

    #[error("Only the quiz host can do this")]
    NotHost,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("Question {0} is not accepting answers")]
    QuestionNotActive(u32),

    #[error("Answer already submitted for question {0}")]
    AlreadySubmitted(u32),

    #[error("Answer must be an option index between 0 and 3")]
    InvalidAnswer,

    #[error("{0} has already played this game")]
    AlreadyParticipated(String),

    #[error("Could not allocate a free invite code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GameError::Validation(_)
            | GameError::InvalidInviteCode
            | GameError::UsernameNotAllowed
            | GameError::WalletRequired
            | GameError::InvalidAnswer => StatusCode::BAD_REQUEST,
            GameError::QuizNotFound
            | GameError::TemplateNotFound
            | GameError::ParticipantNotFound => StatusCode::NOT_FOUND,
            GameError::NotHost => StatusCode::FORBIDDEN,
            GameError::AlreadyStarted
            | GameError::UsernameTaken
            | GameError::WalletAlreadyJoined
            | GameError::QuestionNotActive(_)
            | GameError::AlreadySubmitted(_)
            | GameError::AlreadyParticipated(_)
            | GameError::Phase(_) => StatusCode::CONFLICT,
            GameError::Payout(err) => err.status_code(),
            GameError::CodeSpaceExhausted(_)
            | GameError::CorruptRecord { .. }
            | GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn corrupt(path: impl ToString, err: serde_json::Error) -> Self {
        GameError::CorruptRecord {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for GameError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_values()
            .flatten()
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| format!("Validation error: {}", errors));
        GameError::Validation(message)
    }
}

/// Failures of the reward payout bridge.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    #[error("Payout endpoint is not configured")]
    NotConfigured,

    #[error("Only paid quizzes have rewards")]
    NotPaidQuiz,

    #[error("Rewards are paid once the quiz has finished")]
    NotFinished,

    #[error("No staking record for quiz {0}")]
    NoStakingRecord(String),

    #[error("No participant with a wallet to reward")]
    NoWinners,

    #[error("Payout for quiz {0} was already attempted")]
    AlreadyClaimed(String),

    #[error("Payout service rejected the transfer: {0}")]
    Rejected(String),

    #[error("Payout service unreachable: {0}")]
    Transport(String),

    #[error("Unexpected payout service response: {0}")]
    InvalidResponse(String),
}

impl PayoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PayoutError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            PayoutError::NotPaidQuiz => StatusCode::BAD_REQUEST,
            PayoutError::NoStakingRecord(_) => StatusCode::NOT_FOUND,
            PayoutError::NotFinished | PayoutError::NoWinners | PayoutError::AlreadyClaimed(_) => {
                StatusCode::CONFLICT
            }
            PayoutError::Rejected(_)
            | PayoutError::Transport(_)
            | PayoutError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for PayoutError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PayoutError::InvalidResponse(err.to_string())
        } else {
            PayoutError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(GameError::UsernameTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(GameError::QuizNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GameError::NotHost.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            GameError::Payout(PayoutError::Rejected("Transaction error".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GameError::Store(StoreError::Backend("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn join_errors_carry_user_facing_messages() {
        assert_eq!(
            GameError::AlreadyStarted.to_string(),
            "This game has already started. You cannot join now."
        );
        assert_eq!(
            GameError::WalletAlreadyJoined.to_string(),
            "This wallet has already joined the game."
        );
    }
}
