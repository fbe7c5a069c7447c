use serde::{Deserialize, Serialize};

use super::leaderboard::LeaderboardEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub token: String,
    pub chain_id: u64,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

/// Staking record at `quiz_staking/{code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingRecord {
    pub transaction_details: TransactionDetails,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_status: Option<PayoutStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRequest {
    pub host_id: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    #[serde(default = "default_token")]
    pub token: String,
    pub chain_id: u64,
    pub network: String,
}

fn default_token() -> String {
    "USDC".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub host_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReceipt {
    pub quiz_code: String,
    pub transaction_hash: String,
    pub explorer_link: String,
    pub winners: Vec<LeaderboardEntry>,
}

/// Body the payout gateway accepts: winner wallets then the treasury.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutGatewayRequest {
    pub array_address: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayoutGatewayResponse {
    #[serde(rename = "Transactionhash")]
    pub transaction_hash: String,
}
