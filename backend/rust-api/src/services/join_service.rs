use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use super::{decode, encode, load_quiz};
use crate::errors::GameError;
use crate::game::SessionPhase;
use crate::metrics::{JOIN_REJECTIONS_TOTAL, PARTICIPANTS_JOINED_TOTAL};
use crate::models::participant::{
    sanitize_username, GlobalPlayerRecord, JoinRequest, JoinResponse, Participant,
    WalletRegistration,
};
use crate::models::quiz::{InviteCode, QuizMode};
use crate::store::{paths, SessionStore, StorePath, FORBIDDEN_KEY_CHARS};

pub struct JoinService {
    store: Arc<dyn SessionStore>,
    reserved_usernames: Vec<String>,
}

impl JoinService {
    pub fn new(store: Arc<dyn SessionStore>, reserved_usernames: Vec<String>) -> Self {
        Self {
            store,
            reserved_usernames,
        }
    }

    /// Registers a player in the wait room of `raw_code`.
    pub async fn join(&self, raw_code: &str, req: JoinRequest) -> Result<JoinResponse, GameError> {
        let result = self.try_join(raw_code, req).await;
        if let Err(err) = &result {
            JOIN_REJECTIONS_TOTAL
                .with_label_values(&[rejection_reason(err)])
                .inc();
        }
        result
    }

    async fn try_join(&self, raw_code: &str, req: JoinRequest) -> Result<JoinResponse, GameError> {
        let code = InviteCode::parse(raw_code)?;
        let mode = code.mode();

        let req = JoinRequest {
            username: req.username.trim().to_string(),
            ..req
        };
        req.validate()?;

        let username = sanitize_username(&req.username);
        if self
            .reserved_usernames
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&username))
        {
            return Err(GameError::UsernameNotAllowed);
        }

        let quiz = load_quiz(self.store.as_ref(), &code).await?;
        if quiz.phase() != SessionPhase::Idle {
            return Err(GameError::AlreadyStarted);
        }

        let wallet = req
            .wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string);
        if let Some(w) = &wallet {
            if w.contains(&FORBIDDEN_KEY_CHARS[..]) {
                return Err(GameError::Validation("Invalid wallet address.".to_string()));
            }
        }

        let wallet_claim = match (mode, &wallet) {
            (QuizMode::Paid, None) => return Err(GameError::WalletRequired),
            (QuizMode::Paid, Some(w)) => {
                let claim = paths::quiz_wallet(&code, w)?;
                if !self.store.create_if_absent(&claim, json!(username)).await? {
                    return Err(GameError::WalletAlreadyJoined);
                }
                Some(claim)
            }
            (QuizMode::Free, _) => None,
        };

        let participant = Participant {
            score: 0,
            username: username.clone(),
            wallet_address: wallet.clone(),
        };

        let primary = paths::game_participant(&code, &username)?;
        let created = match self
            .store
            .create_if_absent(&primary, encode(&participant)?)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                self.release(wallet_claim.as_ref()).await;
                return Err(err.into());
            }
        };
        if !created {
            self.release(wallet_claim.as_ref()).await;
            return Err(GameError::UsernameTaken);
        }

        if let Err(err) = self.write_copies(&code, &participant).await {
            tracing::error!(
                quiz_code = %code,
                "Join of {} failed after the primary write, rolling back: {}",
                username,
                err
            );
            self.release(Some(&primary)).await;
            self.release(wallet_claim.as_ref()).await;
            return Err(err);
        }

        PARTICIPANTS_JOINED_TOTAL
            .with_label_values(&[mode.as_str()])
            .inc();
        tracing::info!(quiz_code = %code, "{} joined", username);

        Ok(JoinResponse {
            quiz_code: code.to_string(),
            username,
            title: quiz.title,
        })
    }

    /// Denormalized copies: quiz-embedded list, global bucket, wallet registry.
    async fn write_copies(&self, code: &InviteCode, participant: &Participant) -> Result<(), GameError> {
        let username = participant.username.as_str();

        self.store
            .write(
                &paths::quiz_participant(code, username)?,
                encode(participant)?,
            )
            .await?;

        // Keeps the totals of players who already have a global record.
        let global = GlobalPlayerRecord {
            quizplayed: 0,
            score: 0,
            username: username.to_string(),
            wallet_address: participant.wallet_address.clone(),
        };
        self.store
            .create_if_absent(&paths::global_leaderboard_entry(username)?, encode(&global)?)
            .await?;

        if let (QuizMode::Paid, Some(wallet)) = (code.mode(), &participant.wallet_address) {
            let registration = WalletRegistration {
                wallet_address: wallet.clone(),
                created_at: Utc::now().to_rfc3339(),
                username: username.to_string(),
            };
            self.store
                .write(&paths::wallet_registration(username)?, encode(&registration)?)
                .await?;
        }
        Ok(())
    }

    async fn release(&self, path: Option<&StorePath>) {
        let Some(path) = path else { return };
        if let Err(err) = self.store.write(path, Value::Null).await {
            tracing::warn!("Failed to roll back {}: {}", path, err);
        }
    }

    /// Wait-room list in store key order.
    pub async fn participants(&self, raw_code: &str) -> Result<Vec<Participant>, GameError> {
        let code = InviteCode::parse(raw_code)?;
        load_quiz(self.store.as_ref(), &code).await?;

        let path = paths::game_participants(&code)?;
        match self.store.read_once(&path).await? {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| decode(&path.child(&key)?, value))
                .collect(),
            Some(other) => Err(GameError::CorruptRecord {
                path: path.to_string(),
                reason: format!("expected an object, found {}", other),
            }),
            None => Ok(Vec::new()),
        }
    }
}

fn rejection_reason(err: &GameError) -> &'static str {
    match err {
        GameError::InvalidInviteCode => "invalid_code",
        GameError::QuizNotFound => "not_found",
        GameError::AlreadyStarted => "already_started",
        GameError::UsernameTaken => "username_taken",
        GameError::UsernameNotAllowed => "username_not_allowed",
        GameError::WalletRequired => "wallet_required",
        GameError::WalletAlreadyJoined => "wallet_taken",
        GameError::Validation(_) => "invalid_input",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::SessionPhase;
    use crate::store::MemoryStore;

    async fn seed_quiz(store: &MemoryStore, code: &str, phase: SessionPhase) -> InviteCode {
        let code = InviteCode::parse(code).unwrap();
        let mut quiz = json!({
            "title": "Maths",
            "questions": [{ "text": "2+2?", "options": ["3", "4", "5", "6"], "correctAnswer": 1 }],
            "quizCode": code.as_str(),
            "walletAddress": "0xHost",
            "timestamp": 0,
        });
        for (key, value) in phase.to_fields() {
            quiz[key] = value;
        }
        store.write(&paths::quiz(&code).unwrap(), quiz).await.unwrap();
        code
    }

    fn join_req(username: &str, wallet: Option<&str>) -> JoinRequest {
        JoinRequest {
            username: username.to_string(),
            wallet_address: wallet.map(str::to_string),
        }
    }

    fn service(store: &Arc<MemoryStore>) -> JoinService {
        JoinService::new(store.clone(), vec!["clement".to_string()])
    }

    #[tokio::test]
    async fn join_writes_all_copies() {
        let store = Arc::new(MemoryStore::new());
        let code = seed_quiz(&store, "TBF12345", SessionPhase::Idle).await;

        let joined = service(&store)
            .join("tbf12345", join_req("alice.b", None))
            .await
            .unwrap();
        assert_eq!(joined.username, "alice_b");

        for path in [
            paths::game_participant(&code, "alice_b").unwrap(),
            paths::quiz_participant(&code, "alice_b").unwrap(),
            paths::global_leaderboard_entry("alice_b").unwrap(),
        ] {
            let record = store.read_once(&path).await.unwrap().unwrap();
            assert_eq!(record["score"], 0, "{}", path);
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_without_overwrite() {
        let store = Arc::new(MemoryStore::new());
        let code = seed_quiz(&store, "TBF12345", SessionPhase::Idle).await;
        let service = service(&store);

        service.join("TBF12345", join_req("Alice", None)).await.unwrap();
        store
            .increment(&paths::participant_score(&code, "Alice").unwrap(), 5)
            .await
            .unwrap();

        let second = service.join("TBF12345", join_req("Alice", None)).await;
        assert!(matches!(second, Err(GameError::UsernameTaken)));

        let participants = service.participants("TBF12345").await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].score, 5);
    }

    #[tokio::test]
    async fn join_rules() {
        let store = Arc::new(MemoryStore::new());
        seed_quiz(&store, "TBF12345", SessionPhase::Idle).await;
        seed_quiz(&store, "TBF99999", SessionPhase::Live { question: 0 }).await;
        let service = service(&store);

        assert!(matches!(
            service.join("XYZ12345", join_req("Alice", None)).await,
            Err(GameError::InvalidInviteCode)
        ));
        assert!(matches!(
            service.join("TBF00000", join_req("Alice", None)).await,
            Err(GameError::QuizNotFound)
        ));
        assert!(matches!(
            service.join("TBF99999", join_req("Alice", None)).await,
            Err(GameError::AlreadyStarted)
        ));
        assert!(matches!(
            service.join("TBF12345", join_req("Al", None)).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            service.join("TBF12345", join_req(&"x".repeat(26), None)).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            service.join("TBF12345", join_req("Clement", None)).await,
            Err(GameError::UsernameNotAllowed)
        ));
    }

    #[tokio::test]
    async fn paid_join_needs_unused_wallet() {
        let store = Arc::new(MemoryStore::new());
        let code = seed_quiz(&store, "TBPABCDE", SessionPhase::Idle).await;
        let service = service(&store);

        assert!(matches!(
            service.join("TBPABCDE", join_req("Alice", None)).await,
            Err(GameError::WalletRequired)
        ));

        service
            .join("TBPABCDE", join_req("Alice", Some("0xA11CE")))
            .await
            .unwrap();
        assert!(matches!(
            service.join("TBPABCDE", join_req("Bob", Some("0xA11CE"))).await,
            Err(GameError::WalletAlreadyJoined)
        ));

        let registry = store
            .read_once(&paths::wallet_registration("Alice").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registry["walletAddress"], "0xA11CE");

        // Name taken releases the wallet claim so the wallet can retry.
        assert!(matches!(
            service.join("TBPABCDE", join_req("Alice", Some("0xB0B"))).await,
            Err(GameError::UsernameTaken)
        ));
        assert!(store
            .read_once(&paths::quiz_wallet(&code, "0xB0B").unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
