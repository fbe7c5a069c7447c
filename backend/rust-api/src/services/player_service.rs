use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use super::{encode, load_quiz};
use crate::config::Config;
use crate::errors::GameError;
use crate::game::scoring::{feedback, ScoringRule};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, DUPLICATE_SUBMISSIONS_TOTAL};
use crate::models::answer::{AnswerRecord, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::models::participant::sanitize_username;
use crate::models::quiz::{InviteCode, Quiz, QuizMode, OPTIONS_PER_QUESTION};
use crate::models::session::SessionSnapshot;
use crate::store::{paths, SessionStore};
use crate::utils::time::{elapsed_secs, now_millis};

/// Question countdowns, in seconds, per quiz mode.
#[derive(Debug, Clone, Copy)]
pub struct Countdowns {
    pub free: u32,
    pub paid: u32,
}

impl Countdowns {
    pub fn for_mode(self, mode: QuizMode) -> u32 {
        match mode {
            QuizMode::Free => self.free,
            QuizMode::Paid => self.paid,
        }
    }
}

impl From<&Config> for Countdowns {
    fn from(config: &Config) -> Self {
        Self {
            free: config.free_countdown_secs,
            paid: config.paid_countdown_secs,
        }
    }
}

pub struct PlayerService {
    store: Arc<dyn SessionStore>,
    countdowns: Countdowns,
}

impl PlayerService {
    pub fn new(store: Arc<dyn SessionStore>, countdowns: Countdowns) -> Self {
        Self { store, countdowns }
    }

    pub async fn snapshot(&self, raw_code: &str) -> Result<SessionSnapshot, GameError> {
        let code = InviteCode::parse(raw_code)?;
        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        Ok(SessionSnapshot::from_quiz(code.mode(), &quiz))
    }

    /// Snapshots whenever the player-visible session changes. `None` means
    /// the record vanished.
    pub async fn watch(
        &self,
        code: &InviteCode,
    ) -> Result<BoxStream<'static, Option<SessionSnapshot>>, GameError> {
        let mode = code.mode();
        let path = paths::quiz(code)?;
        let updates = self.store.subscribe(&path).await?;

        // Answers and embedded scores also live under the quiz record.
        let mut last: Option<SessionSnapshot> = None;
        Ok(updates
            .filter_map(move |value| {
                let item = match value {
                    None => Some(None),
                    Some(value) => match serde_json::from_value::<Quiz>(value) {
                        Ok(quiz) => {
                            let snapshot = SessionSnapshot::from_quiz(mode, &quiz);
                            if last.as_ref() == Some(&snapshot) {
                                None
                            } else {
                                last = Some(snapshot.clone());
                                Some(Some(snapshot))
                            }
                        }
                        Err(err) => {
                            tracing::warn!("Unreadable quiz record at {}: {}", path, err);
                            None
                        }
                    },
                };
                future::ready(item)
            })
            .boxed())
    }

    /// Scores and records one answer. The answer record is write-once, so a
    /// second submission for the same question is rejected without touching
    /// the score.
    pub async fn submit(
        &self,
        raw_code: &str,
        req: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, GameError> {
        let code = InviteCode::parse(raw_code)?;
        let mode = code.mode();
        if usize::from(req.answer) >= OPTIONS_PER_QUESTION {
            return Err(GameError::InvalidAnswer);
        }

        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        let index = req.question_index;
        if !quiz.phase().is_accepting(index) {
            return Err(GameError::QuestionNotActive(index));
        }
        let question = quiz
            .question(index)
            .ok_or(GameError::QuestionNotActive(index))?;

        let username = sanitize_username(&req.username);
        let participant_path = paths::game_participant(&code, &username)
            .map_err(|_| GameError::ParticipantNotFound)?;
        if self.store.read_once(&participant_path).await?.is_none() {
            return Err(GameError::ParticipantNotFound);
        }

        // Never credit more time than the question has actually had left.
        // The bound is at least the scoring window, so a short countdown
        // does not shave points off a prompt answer.
        let rule = ScoringRule::for_mode(mode);
        let window = self.countdowns.for_mode(mode).max(rule.window_secs());
        let elapsed = quiz
            .question_started_at
            .map(|started| elapsed_secs(started, now_millis()))
            .unwrap_or(0);
        let time_left = req.time_left.min(window.saturating_sub(elapsed));

        let correct = question.is_correct(req.answer);
        let points = rule.score(correct, time_left);

        let record = AnswerRecord {
            current_question: index,
            answer: req.answer,
            score: points,
            time_left,
            submitted: true,
        };
        let answer_path = paths::answer(&code, index, &username)?;
        if !self
            .store
            .create_if_absent(&answer_path, encode(&record)?)
            .await?
        {
            DUPLICATE_SUBMISSIONS_TOTAL
                .with_label_values(&[mode.as_str()])
                .inc();
            tracing::warn!(quiz_code = %code, question = index, "Duplicate answer from {}", username);
            return Err(GameError::AlreadySubmitted(index));
        }

        let total_score = match self
            .store
            .increment(&paths::participant_score(&code, &username)?, points)
            .await
        {
            Ok(total) => total,
            Err(err) => {
                // An answer without its points must not block a resubmit.
                if let Err(rollback) = self.store.write(&answer_path, Value::Null).await {
                    tracing::error!(
                        quiz_code = %code,
                        question = index,
                        "Failed to release answer of {}: {}",
                        username,
                        rollback
                    );
                }
                return Err(err.into());
            }
        };

        // The quiz-embedded copy is display-only; the score above is authoritative.
        let embedded = paths::quiz_participant(&code, &username)?.child("score")?;
        if let Err(err) = self.store.increment(&embedded, points).await {
            tracing::warn!(quiz_code = %code, "Failed to mirror score of {}: {}", username, err);
        }

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[mode.as_str(), if correct { "true" } else { "false" }])
            .inc();
        tracing::info!(
            quiz_code = %code,
            question = index,
            correct,
            points,
            time_left,
            "{} answered",
            username
        );

        Ok(SubmitAnswerResponse {
            correct,
            score_awarded: points,
            total_score,
            time_left,
            correct_answer: question.correct_answer.unwrap_or_default(),
            feedback: feedback(correct, points, question.correct_option()),
        })
    }
}
