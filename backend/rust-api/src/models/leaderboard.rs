use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub quiz_code: String,
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..self.entries.len().min(n)]
    }
}

/// One player's answer to a question, for the host's between-question view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub username: String,
    pub answer: u8,
    pub correct: bool,
    pub score: i64,
    pub time_left: u32,
}
