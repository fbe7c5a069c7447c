use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

use super::authoring_service::validate_questions;
use super::leaderboard_service::rank;
use super::{decode, encode};
use crate::errors::GameError;
use crate::game::scoring::{feedback, ScoringRule};
use crate::models::answer::{AnswerRecord, SubmitAnswerResponse};
use crate::models::leaderboard::LeaderboardEntry;
use crate::models::participant::sanitize_username;
use crate::models::practice::{PracticeAnswerRequest, PracticePlayer, PracticeRegistration, PracticeScore};
use crate::models::quiz::{Question, QuestionInput, OPTIONS_PER_QUESTION};
use crate::models::session::PublicQuestion;
use crate::store::paths::{self, RESERVED_PRACTICE_GAMES};
use crate::store::{SessionStore, FORBIDDEN_KEY_CHARS};

/// Solo free game over a published question set. Scores accumulate in one
/// practice leaderboard shared by all games.
pub struct PracticeService {
    store: Arc<dyn SessionStore>,
}

impl PracticeService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn publish_questions(
        &self,
        game: &str,
        inputs: Vec<QuestionInput>,
    ) -> Result<usize, GameError> {
        let game = game_name(game)?;
        let questions = validate_questions(game, &inputs)?;
        self.store
            .write(&paths::practice_questions(game)?, encode(&questions)?)
            .await?;
        tracing::info!(game, count = questions.len(), "Practice questions published");
        Ok(questions.len())
    }

    pub async fn questions(&self, game: &str) -> Result<Vec<PublicQuestion>, GameError> {
        let questions = self.load_questions(game_name(game)?).await?;
        Ok(questions
            .iter()
            .zip(0u32..)
            .map(|(q, i)| PublicQuestion::from_question(i, q))
            .collect())
    }

    /// Uses the requested name, or draws a `TRB` name when none is given.
    pub async fn register(
        &self,
        game: &str,
        req: PracticeRegistration,
    ) -> Result<PracticePlayer, GameError> {
        let game = game_name(game)?;
        self.load_questions(game).await?;

        let username = match req.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => sanitize_username(name),
            _ => generated_name(),
        };
        self.ensure_not_participated(game, &username).await?;

        let bucket = PracticeScore {
            score: 0,
            username: username.clone(),
        };
        self.store
            .create_if_absent(&paths::practice_score(&username)?, encode(&bucket)?)
            .await?;

        tracing::info!(game, "{} registered for practice", username);
        Ok(PracticePlayer {
            game: game.to_string(),
            username,
        })
    }

    pub async fn submit(
        &self,
        game: &str,
        req: PracticeAnswerRequest,
    ) -> Result<SubmitAnswerResponse, GameError> {
        let game = game_name(game)?;
        if usize::from(req.answer) >= OPTIONS_PER_QUESTION {
            return Err(GameError::InvalidAnswer);
        }
        let username = sanitize_username(req.username.trim());
        self.ensure_not_participated(game, &username).await?;

        let questions = self.load_questions(game).await?;
        let index = req.question_index;
        let question = usize::try_from(index)
            .ok()
            .and_then(|i| questions.get(i))
            .ok_or(GameError::QuestionNotActive(index))?;

        let rule = ScoringRule::Linear;
        let time_left = req.time_left.min(rule.window_secs());
        let correct = question.is_correct(req.answer);
        let points = rule.score(correct, time_left);

        let record = AnswerRecord {
            current_question: index,
            answer: req.answer,
            score: points,
            time_left,
            submitted: true,
        };
        let answer_path = paths::practice_answer(game, &username, index)?;
        if !self
            .store
            .create_if_absent(&answer_path, encode(&record)?)
            .await?
        {
            return Err(GameError::AlreadySubmitted(index));
        }

        let score_path = paths::practice_score(&username)?;
        let total_score = match self.store.increment(&score_path.child("score")?, points).await {
            Ok(total) => total,
            Err(err) => {
                if let Err(rollback) = self.store.write(&answer_path, Value::Null).await {
                    tracing::error!(game, question = index, "Failed to release answer of {}: {}", username, rollback);
                }
                return Err(err.into());
            }
        };
        // Buckets created by an increment alone have no name.
        self.store
            .create_if_absent(&score_path.child("username")?, json!(username))
            .await?;

        tracing::debug!(game, question = index, points, "{} answered", username);
        Ok(SubmitAnswerResponse {
            correct,
            score_awarded: points,
            total_score,
            time_left,
            correct_answer: question.correct_answer.unwrap_or_default(),
            feedback: feedback(correct, points, question.correct_option()),
        })
    }

    /// Marks the game as played; the player cannot register for it again.
    pub async fn complete(&self, game: &str, username: &str) -> Result<(), GameError> {
        let game = game_name(game)?;
        let username = sanitize_username(username.trim());
        self.store
            .write(
                &paths::practice_participation(game, &username)?,
                json!({ "hasParticipated": true }),
            )
            .await?;
        tracing::info!(game, "{} completed practice", username);
        Ok(())
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, GameError> {
        let scores = self.store.read_once(&paths::practice_leaderboard()?).await?;
        Ok(rank("free_game", scores).entries)
    }

    async fn load_questions(&self, game: &str) -> Result<Vec<Question>, GameError> {
        let path = paths::practice_questions(game)?;
        let value = self
            .store
            .read_once(&path)
            .await?
            .ok_or(GameError::QuizNotFound)?;
        decode(&path, value)
    }

    async fn ensure_not_participated(&self, game: &str, username: &str) -> Result<(), GameError> {
        let marker = paths::practice_participation(game, username)?;
        if self.store.read_once(&marker).await?.is_some() {
            return Err(GameError::AlreadyParticipated(username.to_string()));
        }
        Ok(())
    }
}

fn game_name(raw: &str) -> Result<&str, GameError> {
    let game = raw.trim();
    if game.is_empty()
        || game.contains(&FORBIDDEN_KEY_CHARS[..])
        || RESERVED_PRACTICE_GAMES.contains(&game)
    {
        return Err(GameError::Validation(format!("Invalid game name: {}", raw)));
    }
    Ok(game)
}

fn generated_name() -> String {
    format!("TRB{:06}", rand::rng().random_range(0..1_000_000))
}
