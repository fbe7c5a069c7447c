use std::sync::Arc;

use super::countdown::Countdown;
use super::storage::{ClientStorage, INVITE_CODE_KEY, QUIZ_DRAFT_KEY};
use crate::errors::GameError;
use crate::game::SessionPhase;
use crate::models::quiz::{CreateQuizRequest, CreateQuizResponse};
use crate::models::session::HostActionResponse;
use crate::services::authoring_service::AuthoringService;
use crate::services::host_service::HostService;

/// The host's side of a session: publishes the quiz, drives transitions and
/// closes each question when its countdown runs out.
pub struct HostLoop {
    host: Arc<HostService>,
    storage: ClientStorage,
    host_id: String,
    countdown_secs: u32,
    phase: SessionPhase,
    countdown: Option<Countdown>,
}

impl HostLoop {
    pub fn new(
        host: Arc<HostService>,
        storage: ClientStorage,
        host_id: impl Into<String>,
        countdown_secs: u32,
    ) -> Self {
        Self {
            host,
            storage,
            host_id: host_id.into(),
            countdown_secs,
            phase: SessionPhase::Idle,
            countdown: None,
        }
    }

    pub fn storage(&self) -> &ClientStorage {
        &self.storage
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn save_draft(&mut self, draft_json: impl Into<String>) {
        self.storage.set_local(QUIZ_DRAFT_KEY, draft_json);
    }

    /// Creates the quiz, remembers its code in both storage areas and drops
    /// the saved draft.
    pub async fn publish_quiz(
        &mut self,
        authoring: &AuthoringService,
        req: CreateQuizRequest,
    ) -> Result<CreateQuizResponse, GameError> {
        let created = authoring.create_quiz(req).await?;
        self.storage.remember_invite_code(&created.quiz_code);
        self.storage.remove(QUIZ_DRAFT_KEY);
        self.host_id = created.creator.clone();
        self.phase = SessionPhase::Idle;
        self.countdown = None;
        Ok(created)
    }

    pub async fn start(&mut self) -> Result<HostActionResponse, GameError> {
        let code = self.active_code()?;
        let response = self.host.start(&code, &self.host_id).await?;
        Ok(self.apply(response))
    }

    /// Closes the live question once its countdown has run out. `None` while
    /// time remains or nothing is live.
    pub async fn tick(&mut self, now: i64) -> Result<Option<HostActionResponse>, GameError> {
        let expired = matches!(self.phase, SessionPhase::Live { .. })
            && self.countdown.is_some_and(|c| c.is_expired(now));
        if !expired {
            return Ok(None);
        }
        let code = self.active_code()?;
        let response = self.host.close_question(&code, &self.host_id).await?;
        Ok(Some(self.apply(response)))
    }

    pub async fn advance(&mut self) -> Result<HostActionResponse, GameError> {
        let code = self.active_code()?;
        let response = self.host.next_question(&code, &self.host_id).await?;
        Ok(self.apply(response))
    }

    /// Forgets the session locally. The quiz record stays in the store.
    pub fn abandon(&mut self) {
        if let Some(code) = self.storage.invite_code() {
            tracing::info!(quiz_code = code, "Host abandoned session");
        }
        self.storage.remove(INVITE_CODE_KEY);
        self.phase = SessionPhase::Idle;
        self.countdown = None;
    }

    pub fn remaining(&self, now: i64) -> Option<u32> {
        self.countdown.map(|c| c.remaining(now))
    }

    fn active_code(&self) -> Result<String, GameError> {
        self.storage
            .invite_code()
            .map(str::to_string)
            .ok_or(GameError::InvalidInviteCode)
    }

    fn apply(&mut self, response: HostActionResponse) -> HostActionResponse {
        let session = &response.session;
        self.phase = session.phase;
        self.countdown = match (session.phase, session.question_started_at) {
            (SessionPhase::Live { .. }, Some(started_at)) => {
                Some(Countdown::new(started_at, self.countdown_secs))
            }
            _ => None,
        };
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{QuestionInput, QuizMode};
    use crate::store::{paths, MemoryStore, SessionStore};

    fn request() -> CreateQuizRequest {
        let question = QuestionInput {
            text: "2+2?".into(),
            options: ["3", "4", "5", "6"].map(String::from).to_vec(),
            correct_answer: Some(1),
        };
        CreateQuizRequest {
            mode: QuizMode::Free,
            title: "Maths".into(),
            questions: vec![question.clone(), question],
            wallet_address: Some("0xHost".into()),
            email: None,
        }
    }

    #[tokio::test]
    async fn host_publishes_runs_and_abandons() {
        let store = Arc::new(MemoryStore::new());
        let authoring = AuthoringService::new(store.clone());
        let host = Arc::new(HostService::new(store.clone()));
        let mut host_loop = HostLoop::new(host, ClientStorage::new(), "", 20);

        host_loop.save_draft("{\"title\":\"Maths\"}");
        let created = host_loop.publish_quiz(&authoring, request()).await.unwrap();
        assert_eq!(host_loop.storage().invite_code(), Some(created.quiz_code.as_str()));
        assert_eq!(host_loop.storage().get(QUIZ_DRAFT_KEY), None);

        let started = host_loop.start().await.unwrap();
        assert_eq!(started.session.phase, SessionPhase::Live { question: 0 });
        let started_at = started.session.question_started_at.unwrap();

        assert!(host_loop.tick(started_at + 5_000).await.unwrap().is_none());
        let closed = host_loop.tick(started_at + 20_000).await.unwrap().unwrap();
        assert_eq!(closed.session.phase, SessionPhase::BetweenQuestions { question: 0 });
        assert!(host_loop.tick(started_at + 25_000).await.unwrap().is_none());

        let next = host_loop.advance().await.unwrap();
        assert_eq!(next.session.phase, SessionPhase::Live { question: 1 });
        let done = host_loop.advance().await.unwrap();
        assert_eq!(done.session.phase, SessionPhase::Finished);

        host_loop.abandon();
        assert_eq!(host_loop.storage().invite_code(), None);

        let code = crate::models::quiz::InviteCode::parse(&created.quiz_code).unwrap();
        assert!(store
            .read_once(&paths::quiz(&code).unwrap())
            .await
            .unwrap()
            .is_some());
    }
}
