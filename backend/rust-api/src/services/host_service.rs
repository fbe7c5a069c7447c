use serde_json::{json, Value};
use std::sync::Arc;

use super::load_quiz;
use super::payout_service::{authorize, PayoutService};
use crate::errors::{GameError, PayoutError};
use crate::game::{PhaseError, SessionPhase};
use crate::metrics::SESSIONS_ACTIVE;
use crate::models::payout::PayoutReceipt;
use crate::models::quiz::{InviteCode, Quiz, QuizMode};
use crate::models::session::{HostActionResponse, SessionSnapshot};
use crate::store::{paths, SessionStore};
use crate::utils::time::now_millis;

/// Store-side host transitions. The host's countdown lives in
/// [`crate::client::HostLoop`].
pub struct HostService {
    store: Arc<dyn SessionStore>,
    payout: Option<PayoutService>,
}

impl HostService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            payout: None,
        }
    }

    /// Pays rewards automatically when a paid quiz finishes.
    pub fn with_payout(mut self, payout: PayoutService) -> Self {
        self.payout = Some(payout).filter(PayoutService::is_enabled);
        self
    }

    /// Idle -> Live(0).
    pub async fn start(&self, raw_code: &str, host_id: &str) -> Result<HostActionResponse, GameError> {
        self.transition(raw_code, host_id, "start", |phase, count| phase.start(count))
            .await
    }

    /// Live(i) -> BetweenQuestions(i): stops accepting answers.
    pub async fn close_question(
        &self,
        raw_code: &str,
        host_id: &str,
    ) -> Result<HostActionResponse, GameError> {
        self.transition(raw_code, host_id, "close_question", |phase, _| {
            phase.close_question()
        })
        .await
    }

    /// Moves to the next question, or finishes after the last one.
    pub async fn next_question(
        &self,
        raw_code: &str,
        host_id: &str,
    ) -> Result<HostActionResponse, GameError> {
        self.transition(raw_code, host_id, "next_question", |phase, count| {
            phase.advance(count)
        })
        .await
    }

    pub async fn finish(&self, raw_code: &str, host_id: &str) -> Result<HostActionResponse, GameError> {
        self.transition(raw_code, host_id, "finish", |phase, _| phase.finish())
            .await
    }

    async fn transition<F>(
        &self,
        raw_code: &str,
        host_id: &str,
        action: &str,
        apply: F,
    ) -> Result<HostActionResponse, GameError>
    where
        F: FnOnce(SessionPhase, u32) -> Result<SessionPhase, PhaseError>,
    {
        let code = InviteCode::parse(raw_code)?;
        let mut quiz = load_quiz(self.store.as_ref(), &code).await?;
        authorize(&quiz, host_id)?;

        let from = quiz.phase();
        let to = apply(from, quiz.question_count())?;

        let mut fields = to.to_fields();
        if let SessionPhase::Live { .. } = to {
            let started_at = now_millis();
            fields.insert("question_started_at".into(), json!(started_at));
            quiz.question_started_at = Some(started_at);
        }

        // Applies only if no other transition landed since the read.
        let unchanged = move |current: Option<&Value>| {
            current
                .and_then(|value| serde_json::from_value::<Quiz>(value.clone()).ok())
                .is_some_and(|stored| stored.phase() == from)
        };
        if !self
            .store
            .merge_if(&paths::quiz(&code)?, fields, &unchanged)
            .await?
        {
            tracing::warn!(quiz_code = %code, from = ?from, "Host {} superseded", action);
            return Err(PhaseError::Superseded.into());
        }

        let flags = to.flags();
        quiz.phase = Some(to);
        quiz.game_start = flags.game_start;
        quiz.quiz_checker = flags.quiz_checker;
        quiz.current_question = flags.current_question;
        quiz.next_question = flags.next_question;

        SESSIONS_ACTIVE.add(active_sessions_delta(from, to));
        tracing::info!(
            quiz_code = %code,
            from = ?from,
            to = ?to,
            "Host {}",
            action
        );

        let (payout, payout_error) = if to.is_finished() && code.mode() == QuizMode::Paid {
            self.pay_out(&code, &quiz).await
        } else {
            (None, None)
        };

        Ok(HostActionResponse {
            session: SessionSnapshot::from_quiz(code.mode(), &quiz),
            payout,
            payout_error,
        })
    }

    async fn pay_out(
        &self,
        code: &InviteCode,
        quiz: &Quiz,
    ) -> (Option<PayoutReceipt>, Option<String>) {
        let Some(payout) = &self.payout else {
            return (None, None);
        };
        match payout.distribute(code, quiz).await {
            Ok(receipt) => (Some(receipt), None),
            Err(GameError::Payout(PayoutError::NoStakingRecord(_))) => {
                tracing::info!(quiz_code = %code, "No stake recorded, skipping payout");
                (None, None)
            }
            Err(err) => (None, Some(err.to_string())),
        }
    }
}

/// Change of the active-session gauge for one transition. A session counts
/// as active from its first live question until it finishes.
fn active_sessions_delta(from: SessionPhase, to: SessionPhase) -> i64 {
    let active = |phase: SessionPhase| !matches!(phase, SessionPhase::Idle | SessionPhase::Finished);
    i64::from(active(to)) - i64::from(active(from))
}
