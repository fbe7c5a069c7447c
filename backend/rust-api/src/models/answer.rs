use serde::{Deserialize, Serialize};

/// Write-once record at
/// `{ns}/{code}/questions/{i}/participant/user_answers/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub current_question: u32,
    pub answer: u8,
    pub score: i64,
    pub time_left: u32,
    pub submitted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub username: String,
    pub question_index: u32,
    pub answer: u8,
    pub time_left: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    pub score_awarded: i64,
    pub total_score: i64,
    pub time_left: u32,
    pub correct_answer: u8,
    pub feedback: String,
}
