use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::load_quiz;
use crate::errors::GameError;
use crate::models::answer::AnswerRecord;
use crate::models::leaderboard::{Leaderboard, LeaderboardEntry, QuestionResponse};
use crate::models::quiz::InviteCode;
use crate::store::{paths, SessionStore};

pub const PODIUM_SIZE: usize = 3;

pub struct LeaderboardService {
    store: Arc<dyn SessionStore>,
}

/// Lenient view of a participant record; older records may lack fields.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRecord {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    wallet_address: Option<String>,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, raw_code: &str) -> Result<Leaderboard, GameError> {
        let code = InviteCode::parse(raw_code)?;
        load_quiz(self.store.as_ref(), &code).await?;
        self.for_code(&code).await
    }

    pub async fn top3(&self, raw_code: &str) -> Result<Vec<LeaderboardEntry>, GameError> {
        let board = self.snapshot(raw_code).await?;
        Ok(board.top(PODIUM_SIZE).to_vec())
    }

    pub(crate) async fn for_code(&self, code: &InviteCode) -> Result<Leaderboard, GameError> {
        let participants = self
            .store
            .read_once(&paths::game_participants(code)?)
            .await?;
        Ok(rank(code.as_str(), participants))
    }

    /// Re-ranks on every change below `game_participant/{code}`. Ends when
    /// the subscription does.
    pub async fn subscribe(
        &self,
        code: &InviteCode,
    ) -> Result<BoxStream<'static, Leaderboard>, GameError> {
        let quiz_code = code.to_string();
        let updates = self
            .store
            .subscribe(&paths::game_participants(code)?)
            .await?;
        Ok(updates
            .map(move |participants| rank(&quiz_code, participants))
            .boxed())
    }

    /// Answers to question `index`, best score first.
    pub async fn question_responses(
        &self,
        raw_code: &str,
        index: u32,
    ) -> Result<Vec<QuestionResponse>, GameError> {
        let code = InviteCode::parse(raw_code)?;
        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        let question = quiz
            .question(index)
            .ok_or(GameError::QuestionNotActive(index))?;

        let path = paths::question_answers(&code, index)?;
        let records = match self.store.read_once(&path).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(Vec::new()),
        };

        let mut responses: Vec<QuestionResponse> = records
            .into_iter()
            .filter_map(|(username, value)| {
                match serde_json::from_value::<AnswerRecord>(value) {
                    Ok(record) => Some(QuestionResponse {
                        correct: question.is_correct(record.answer),
                        username,
                        answer: record.answer,
                        score: record.score,
                        time_left: record.time_left,
                    }),
                    Err(err) => {
                        tracing::warn!("Skipping unreadable answer of {} at {}: {}", username, path, err);
                        None
                    }
                }
            })
            .collect();
        responses.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(responses)
    }
}

/// Sorts participants by score, descending. Equal scores keep store key
/// order.
pub fn rank(quiz_code: &str, participants: Option<Value>) -> Leaderboard {
    let map = match participants {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let mut entries: Vec<LeaderboardEntry> = map
        .into_iter()
        .filter_map(|(key, value)| {
            let record: ScoreRecord = serde_json::from_value(value).ok()?;
            Some(LeaderboardEntry {
                rank: 0,
                username: record.username.unwrap_or(key),
                score: record.score.round() as i64,
                wallet_address: record.wallet_address,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Leaderboard {
        quiz_code: quiz_code.to_string(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rank_sorts_descending_with_stable_ties() {
        let board = rank(
            "TBF12345",
            Some(json!({
                "amy": { "username": "amy", "score": 5 },
                "bob": { "username": "bob", "score": 12 },
                "cat": { "username": "cat", "score": 5 },
                "dan": { "username": "dan", "score": 0 },
            })),
        );

        let order: Vec<&str> = board.entries.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(order, ["bob", "amy", "cat", "dan"]);
        assert!(board.entries.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(board.entries[2].rank, 3);

        let podium = board.top(PODIUM_SIZE);
        assert_eq!(podium, &board.entries[..3]);
    }

    #[test]
    fn rank_handles_empty_and_short_lists() {
        assert!(rank("TBF12345", None).entries.is_empty());

        let board = rank("TBF12345", Some(json!({ "solo": { "score": 3 } })));
        assert_eq!(board.top(PODIUM_SIZE).len(), 1);
        assert_eq!(board.entries[0].username, "solo");
    }
}
