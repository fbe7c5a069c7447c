use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::leaderboard_service::{LeaderboardService, PODIUM_SIZE};
use super::{decode, load_quiz};
use crate::errors::{GameError, PayoutError};
use crate::metrics::PAYOUTS_TOTAL;
use crate::models::payout::{
    PayoutGatewayRequest, PayoutGatewayResponse, PayoutReceipt, PayoutStatus, StakeRequest,
    StakingRecord, TransactionDetails,
};
use crate::models::quiz::{InviteCode, Quiz, QuizMode};
use crate::store::{paths, SessionStore};
use crate::utils::time::now_millis;

/// What the payout endpoint answers instead of a hash when the transfer fails.
pub const TRANSACTION_ERROR_SENTINEL: &str = "Transaction error";

/// External service that transfers the reward pool to a list of addresses.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Sends `addresses` (winners, then treasury) and returns the
    /// transaction hash.
    async fn distribute(&self, addresses: &[String]) -> Result<String, PayoutError>;
}

pub struct HttpPayoutGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPayoutGateway {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PayoutGateway for HttpPayoutGateway {
    async fn distribute(&self, addresses: &[String]) -> Result<String, PayoutError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&PayoutGatewayRequest {
                array_address: addresses.to_vec(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PayoutError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let body: PayoutGatewayResponse = response.json().await?;
        let hash = body.transaction_hash.trim();
        if hash.is_empty() || hash == TRANSACTION_ERROR_SENTINEL {
            return Err(PayoutError::Rejected(TRANSACTION_ERROR_SENTINEL.to_string()));
        }
        Ok(hash.to_string())
    }
}

pub struct PayoutService {
    store: Arc<dyn SessionStore>,
    gateway: Option<Arc<dyn PayoutGateway>>,
    explorer_tx_base_url: String,
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Option<Arc<dyn PayoutGateway>>,
        explorer_tx_base_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            explorer_tx_base_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Stores the host's reward deposit for a paid quiz.
    pub async fn record_stake(
        &self,
        raw_code: &str,
        req: StakeRequest,
    ) -> Result<StakingRecord, GameError> {
        let code = paid_code(raw_code)?;
        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        authorize(&quiz, &req.host_id)?;

        if req.to.trim().is_empty() {
            return Err(GameError::Validation(
                "Treasury address is required.".to_string(),
            ));
        }

        let details = TransactionDetails {
            from: req.from,
            to: req.to.trim().to_string(),
            amount: req.amount,
            token: req.token,
            chain_id: req.chain_id,
            network: req.network,
            transaction_hash: None,
        };

        let mut fields = Map::new();
        fields.insert(
            "transactionDetails".into(),
            super::encode(&details)?,
        );
        fields.insert("status".into(), json!("completed"));
        self.store.merge(&paths::staking(&code)?, fields).await?;

        tracing::info!(quiz_code = %code, amount = %details.amount, "Stake recorded");

        Ok(StakingRecord {
            transaction_details: details,
            status: "completed".to_string(),
            payout_status: None,
            payout_error: None,
        })
    }

    /// Host-triggered payout.
    pub async fn trigger(&self, raw_code: &str, host_id: &str) -> Result<PayoutReceipt, GameError> {
        let code = paid_code(raw_code)?;
        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        authorize(&quiz, host_id)?;
        self.distribute(&code, &quiz).await
    }

    /// Pays the podium of a finished paid quiz. At most one attempt is made
    /// per quiz; a failure is recorded and left for manual follow-up.
    pub(crate) async fn distribute(
        &self,
        code: &InviteCode,
        quiz: &Quiz,
    ) -> Result<PayoutReceipt, GameError> {
        let gateway = self.gateway.as_ref().ok_or(PayoutError::NotConfigured)?;
        if code.mode() != QuizMode::Paid {
            return Err(PayoutError::NotPaidQuiz.into());
        }
        if !quiz.phase().is_finished() {
            return Err(PayoutError::NotFinished.into());
        }

        let staking_path = paths::staking(code)?;
        let staking: StakingRecord = match self.store.read_once(&staking_path).await? {
            Some(value) => decode(&staking_path, value)?,
            None => return Err(PayoutError::NoStakingRecord(code.to_string()).into()),
        };
        let treasury = staking.transaction_details.to.clone();
        if treasury.is_empty() {
            return Err(PayoutError::NoStakingRecord(code.to_string()).into());
        }

        let board = LeaderboardService::new(self.store.clone())
            .for_code(code)
            .await?;
        let winners: Vec<_> = board
            .top(PODIUM_SIZE)
            .iter()
            .filter(|entry| entry.wallet_address.is_some())
            .cloned()
            .collect();
        if winners.is_empty() {
            return Err(PayoutError::NoWinners.into());
        }

        let claimed = self
            .store
            .create_if_absent(
                &paths::payout_claim(code)?,
                json!({ "claimedAt": now_millis() }),
            )
            .await?;
        if !claimed {
            return Err(PayoutError::AlreadyClaimed(code.to_string()).into());
        }
        self.set_status(code, PayoutStatus::Pending, None).await?;

        let mut addresses: Vec<String> = winners
            .iter()
            .filter_map(|entry| entry.wallet_address.clone())
            .collect();
        addresses.push(treasury);

        tracing::info!(quiz_code = %code, addresses = ?addresses, "Requesting reward payout");

        match gateway.distribute(&addresses).await {
            Ok(hash) => {
                let mut fields = Map::new();
                fields.insert("transactionHash".into(), json!(hash));
                self.store
                    .merge(&paths::staking_transaction(code)?, fields)
                    .await?;
                self.set_status(code, PayoutStatus::Paid, None).await?;

                PAYOUTS_TOTAL.with_label_values(&["paid"]).inc();
                tracing::info!(quiz_code = %code, transaction_hash = %hash, "Reward payout sent");

                Ok(PayoutReceipt {
                    quiz_code: code.to_string(),
                    explorer_link: format!("{}{}", self.explorer_tx_base_url, hash),
                    transaction_hash: hash,
                    winners,
                })
            }
            Err(err) => {
                PAYOUTS_TOTAL.with_label_values(&["failed"]).inc();
                tracing::error!(quiz_code = %code, "Reward payout failed: {}", err);
                if let Err(store_err) = self
                    .set_status(code, PayoutStatus::Failed, Some(err.to_string()))
                    .await
                {
                    tracing::error!(quiz_code = %code, "Could not record payout failure: {}", store_err);
                }
                Err(err.into())
            }
        }
    }

    async fn set_status(
        &self,
        code: &InviteCode,
        status: PayoutStatus,
        error: Option<String>,
    ) -> Result<(), GameError> {
        let mut fields = Map::new();
        fields.insert("payoutStatus".into(), json!(status.as_str()));
        fields.insert(
            "payoutError".into(),
            error.map(Value::String).unwrap_or(Value::Null),
        );
        self.store.merge(&paths::staking(code)?, fields).await?;
        Ok(())
    }
}

fn paid_code(raw_code: &str) -> Result<InviteCode, GameError> {
    let code = InviteCode::parse(raw_code)?;
    if code.mode() != QuizMode::Paid {
        return Err(PayoutError::NotPaidQuiz.into());
    }
    Ok(code)
}

pub(crate) fn authorize(quiz: &Quiz, host_id: &str) -> Result<(), GameError> {
    if quiz.wallet_address != host_id.trim() {
        return Err(GameError::NotHost);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::SessionPhase;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl PayoutGateway for RecordingGateway {
        async fn distribute(&self, addresses: &[String]) -> Result<String, PayoutError> {
            self.calls.lock().unwrap().push(addresses.to_vec());
            if self.fail {
                Err(PayoutError::Rejected(TRANSACTION_ERROR_SENTINEL.to_string()))
            } else {
                Ok("0xfeed".to_string())
            }
        }
    }

    async fn finished_paid_quiz(store: &MemoryStore) -> InviteCode {
        let code = InviteCode::parse("TBPABCDE").unwrap();
        let mut quiz = json!({
            "title": "Stakes",
            "questions": [{ "text": "q", "options": ["a", "b", "c", "d"], "correctAnswer": 0 }],
            "quizCode": "TBPABCDE",
            "walletAddress": "0xHost",
            "timestamp": 0,
        });
        for (key, value) in SessionPhase::Finished.to_fields() {
            quiz[key] = value;
        }
        store.write(&paths::quiz(&code).unwrap(), quiz).await.unwrap();

        for (name, wallet, score) in [
            ("amy", "0xA", 150),
            ("bob", "0xB", 300),
            ("cat", "0xC", 120),
            ("dan", "0xD", 100),
        ] {
            store
                .write(
                    &paths::game_participant(&code, name).unwrap(),
                    json!({ "username": name, "walletAddress": wallet, "score": score }),
                )
                .await
                .unwrap();
        }
        code
    }

    fn stake() -> StakeRequest {
        StakeRequest {
            host_id: "0xHost".to_string(),
            from: "0xHost".to_string(),
            to: "0xTreasury".to_string(),
            amount: "30".to_string(),
            token: "USDC".to_string(),
            chain_id: 421614,
            network: "Arbitrum Sepolia".to_string(),
        }
    }

    #[tokio::test]
    async fn pays_top_three_plus_treasury_once() {
        let store = Arc::new(MemoryStore::new());
        let code = finished_paid_quiz(&store).await;
        let gateway = Arc::new(RecordingGateway::default());
        let service = PayoutService::new(
            store.clone(),
            Some(gateway.clone()),
            "https://sepolia.arbiscan.io/tx/".to_string(),
        );

        service.record_stake("TBPABCDE", stake()).await.unwrap();
        let receipt = service.trigger("TBPABCDE", "0xHost").await.unwrap();

        assert_eq!(receipt.transaction_hash, "0xfeed");
        assert_eq!(receipt.explorer_link, "https://sepolia.arbiscan.io/tx/0xfeed");
        assert_eq!(
            gateway.calls.lock().unwrap()[0],
            ["0xB", "0xA", "0xC", "0xTreasury"]
        );

        let details = store
            .read_once(&paths::staking_transaction(&code).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details["transactionHash"], "0xfeed");
        assert_eq!(details["token"], "USDC");

        assert!(matches!(
            service.trigger("TBPABCDE", "0xHost").await,
            Err(GameError::Payout(PayoutError::AlreadyClaimed(_)))
        ));
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let code = finished_paid_quiz(&store).await;
        let gateway = Arc::new(RecordingGateway {
            fail: true,
            ..Default::default()
        });
        let service = PayoutService::new(store.clone(), Some(gateway.clone()), String::new());

        service.record_stake("TBPABCDE", stake()).await.unwrap();
        let err = service.trigger("TBPABCDE", "0xHost").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);

        let staking = store
            .read_once(&paths::staking(&code).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staking["payoutStatus"], "failed");
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preconditions() {
        let store = Arc::new(MemoryStore::new());
        finished_paid_quiz(&store).await;

        let disabled = PayoutService::new(store.clone(), None, String::new());
        assert!(matches!(
            disabled.trigger("TBPABCDE", "0xHost").await,
            Err(GameError::Payout(PayoutError::NotConfigured))
        ));

        let service = PayoutService::new(
            store.clone(),
            Some(Arc::new(RecordingGateway::default())),
            String::new(),
        );
        assert!(matches!(
            service.trigger("TBPABCDE", "0xSomeoneElse").await,
            Err(GameError::NotHost)
        ));
        assert!(matches!(
            service.trigger("TBPABCDE", "0xHost").await,
            Err(GameError::Payout(PayoutError::NoStakingRecord(_)))
        ));
        assert!(matches!(
            service.trigger("TBF12345", "0xHost").await,
            Err(GameError::Payout(PayoutError::NotPaidQuiz))
        ));
    }
}
