use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_USERNAME_LEN: u64 = 3;
pub const MAX_USERNAME_LEN: u64 = 25;

/// Participant record, written to `game_participant/{code}/{username}` and
/// to `{ns}/{code}/participants/{username}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub score: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

/// Global leaderboard bucket `leaderboard/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPlayerRecord {
    pub quizplayed: u32,
    pub score: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

/// Wallet registry entry `users/{username}` for paid quizzes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRegistration {
    pub wallet_address: String,
    pub created_at: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[validate(length(
        min = 3,
        max = 25,
        message = "Username must be between 3 and 25 characters"
    ))]
    pub username: String,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub quiz_code: String,
    pub username: String,
    pub title: String,
}

/// Replaces every character the store refuses in a key with `_`.
pub fn sanitize_username(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if crate::store::FORBIDDEN_KEY_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_forbidden_key_characters() {
        assert_eq!(sanitize_username(" alice.smith "), "alice_smith");
        assert_eq!(sanitize_username("a/b#c$d[e]"), "a_b_c_d_e_");
        assert_eq!(sanitize_username("Bob"), "Bob");
    }

    #[test]
    fn username_length_counts_characters() {
        let req = JoinRequest {
            username: "ümlaut".to_string(),
            wallet_address: None,
        };
        assert!(req.validate().is_ok());

        let short = JoinRequest {
            username: "ab".to_string(),
            wallet_address: None,
        };
        assert!(short.validate().is_err());
    }
}
