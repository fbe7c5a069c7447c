use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRegistration {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticePlayer {
    pub game: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAnswerRequest {
    pub username: String,
    pub question_index: u32,
    pub answer: u8,
    pub time_left: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeCompleteRequest {
    pub username: String,
}

/// Score bucket at `free_game/leaderboard/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeScore {
    #[serde(default)]
    pub score: i64,
    pub username: String,
}
