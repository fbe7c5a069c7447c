use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::{decode, encode, invite_code};
use crate::errors::GameError;
use crate::game::SessionPhase;
use crate::metrics::QUIZZES_CREATED_TOTAL;
use crate::models::quiz::{
    CreateFromTemplateRequest, CreateQuizRequest, CreateQuizResponse, CreatorQuiz, InviteCode,
    Question, QuestionInput, Quiz, QuizMode, QuizTemplate, SaveTemplateRequest, MAX_QUESTIONS,
    OPTIONS_PER_QUESTION,
};
use crate::store::{paths, SessionStore, StorePath, FORBIDDEN_KEY_CHARS};
use crate::utils::time::now_millis;

/// Attempts at drawing an unused invite code before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 5;

pub struct AuthoringService {
    store: Arc<dyn SessionStore>,
}

impl AuthoringService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Validates and publishes a quiz under a fresh invite code, then records
    /// the creator's reverse lookup.
    pub async fn create_quiz(&self, req: CreateQuizRequest) -> Result<CreateQuizResponse, GameError> {
        self.create_quiz_with(req, invite_code::CODE_ALPHABET).await
    }

    async fn publish(
        &self,
        req: &CreateQuizRequest,
        questions: Vec<Question>,
        alphabet: &[u8],
    ) -> Result<CreateQuizResponse, GameError> {
        let creator = resolve_creator(req.mode, req.wallet_address.as_deref())?;
        let timestamp = now_millis();
        let flags = SessionPhase::Idle.flags();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = invite_code::generate_from(req.mode, alphabet);
            let quiz = Quiz {
                title: req.title.trim().to_string(),
                questions: questions.clone(),
                quiz_code: code.to_string(),
                wallet_address: creator.clone(),
                timestamp,
                game_start: flags.game_start,
                quiz_checker: flags.quiz_checker,
                current_question: flags.current_question,
                next_question: flags.next_question,
                phase: Some(SessionPhase::Idle),
                question_started_at: None,
                email: req.email.clone(),
            };

            let path = paths::quiz(&code)?;
            if !self.store.create_if_absent(&path, encode(&quiz)?).await? {
                tracing::warn!("Invite code {} already in use (attempt {})", code, attempt);
                continue;
            }

            self.write_creator_lookup(req.mode, &creator, &code, &quiz)
                .await?;

            QUIZZES_CREATED_TOTAL
                .with_label_values(&[req.mode.as_str()])
                .inc();
            tracing::info!(
                quiz_code = %code,
                mode = req.mode.as_str(),
                questions = questions.len(),
                "Quiz created by {}",
                creator
            );

            return Ok(CreateQuizResponse {
                quiz_code: code.to_string(),
                mode: req.mode,
                creator,
                question_count: questions.len(),
            });
        }

        Err(GameError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Stores a reusable question set under `templates/{template}`.
    pub async fn save_template(
        &self,
        template: &str,
        req: SaveTemplateRequest,
    ) -> Result<QuizTemplate, GameError> {
        let path = template_path(template)?;
        let questions = validate_questions(&req.title, &req.questions)?;
        let saved = QuizTemplate {
            title: req.title.trim().to_string(),
            questions,
        };
        self.store.write(&path, encode(&saved)?).await?;

        tracing::info!(
            template = template,
            questions = saved.questions.len(),
            "Template saved"
        );
        Ok(saved)
    }

    pub async fn template(&self, template: &str) -> Result<QuizTemplate, GameError> {
        let path = template_path(template)?;
        match self.store.read_once(&path).await? {
            Some(value) => decode(&path, value),
            None => Err(GameError::TemplateNotFound),
        }
    }

    /// Publishes a free quiz prefilled from a template. Edited title or
    /// questions in the request replace the template's own.
    pub async fn create_from_template(
        &self,
        template: &str,
        req: CreateFromTemplateRequest,
    ) -> Result<CreateQuizResponse, GameError> {
        let stored = self.template(template).await?;
        let inputs = match req.questions {
            Some(questions) => questions,
            None => stored.questions.iter().map(QuestionInput::from).collect(),
        };

        self.create_quiz_with(
            CreateQuizRequest {
                mode: QuizMode::Free,
                title: req.title.unwrap_or(stored.title),
                questions: inputs,
                wallet_address: req.wallet_address,
                email: req.email,
            },
            invite_code::TEMPLATE_ALPHABET,
        )
        .await
    }

    async fn create_quiz_with(
        &self,
        mut req: CreateQuizRequest,
        alphabet: &[u8],
    ) -> Result<CreateQuizResponse, GameError> {
        let questions = validate_questions(&req.title, &req.questions)?;
        // A blank email field means no email.
        req.email = req.email.take().filter(|e| !e.trim().is_empty());
        req.validate()?;

        self.publish(&req, questions, alphabet).await
    }

    async fn write_creator_lookup(
        &self,
        mode: QuizMode,
        creator: &str,
        code: &InviteCode,
        quiz: &Quiz,
    ) -> Result<(), GameError> {
        match mode {
            QuizMode::Free => {
                self.store
                    .write(&paths::creator_lookup(mode, creator)?, json!(code.as_str()))
                    .await?;
            }
            QuizMode::Paid => {
                self.store
                    .write(
                        &paths::creator_lookup(mode, creator)?,
                        json!({ "quizCode": code.as_str(), "timestamp": quiz.timestamp }),
                    )
                    .await?;
                self.store
                    .write(
                        &paths::user_generated_quiz(creator, code)?,
                        json!({
                            "quizCode": code.as_str(),
                            "title": quiz.title,
                            "timestamp": quiz.timestamp,
                        }),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Latest quiz a creator published. Paid lookups win over free ones.
    pub async fn creator_quiz(&self, creator: &str) -> Result<CreatorQuiz, GameError> {
        for mode in [QuizMode::Paid, QuizMode::Free] {
            let path =
                paths::creator_lookup(mode, creator).map_err(|_| GameError::QuizNotFound)?;
            let Some(value) = self.store.read_once(&path).await? else {
                continue;
            };

            let quiz_code = match mode {
                QuizMode::Free => decode::<String>(&path, value)?,
                QuizMode::Paid => decode::<PaidLookup>(&path, value)?.quiz_code,
            };
            return Ok(CreatorQuiz {
                creator: creator.to_string(),
                quiz_code,
                mode,
            });
        }
        Err(GameError::QuizNotFound)
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaidLookup {
    quiz_code: String,
}

fn template_path(template: &str) -> Result<StorePath, GameError> {
    let template = template.trim();
    if template.is_empty() {
        return Err(GameError::Validation("Template code is required.".to_string()));
    }
    paths::template(template)
        .map_err(|_| GameError::Validation("Invalid template code.".to_string()))
}

fn resolve_creator(mode: QuizMode, wallet: Option<&str>) -> Result<String, GameError> {
    match (mode, wallet.map(str::trim).filter(|w| !w.is_empty())) {
        (_, Some(wallet)) if wallet.contains(&FORBIDDEN_KEY_CHARS[..]) => {
            Err(GameError::Validation("Invalid wallet address.".to_string()))
        }
        (_, Some(wallet)) => Ok(wallet.to_string()),
        (QuizMode::Paid, None) => Err(GameError::WalletRequired),
        (QuizMode::Free, None) => Ok(invite_code::anonymous_creator_id()),
    }
}

/// Checks the draft in the order the authoring form reports problems.
pub fn validate_questions(title: &str, inputs: &[QuestionInput]) -> Result<Vec<Question>, GameError> {
    let invalid = |msg: &str| Err(GameError::Validation(msg.to_string()));

    if title.trim().is_empty() {
        return invalid("Please enter a title.");
    }
    if inputs.is_empty() {
        return invalid("Please add at least one question.");
    }
    if inputs.len() > MAX_QUESTIONS {
        return invalid("A quiz can have at most 99 questions.");
    }
    if inputs.iter().any(|q| q.text.trim().is_empty()) {
        return invalid("Please complete all question texts.");
    }
    if inputs.iter().any(|q| {
        q.options.len() != OPTIONS_PER_QUESTION || q.options.iter().any(|o| o.trim().is_empty())
    }) {
        return invalid("Please complete all options for each question.");
    }
    if inputs.iter().any(|q| {
        !q.correct_answer
            .is_some_and(|i| usize::from(i) < OPTIONS_PER_QUESTION)
    }) {
        return invalid("Please select a correct answer for each question.");
    }

    inputs
        .iter()
        .map(|q| {
            let options: Vec<String> = q.options.iter().map(|o| o.trim().to_string()).collect();
            let options = <[String; OPTIONS_PER_QUESTION]>::try_from(options).map_err(|_| {
                GameError::Validation("Please complete all options for each question.".to_string())
            })?;
            Ok(Question {
                text: q.text.trim().to_string(),
                options,
                correct_answer: q.correct_answer,
            })
        })
        .collect()
}
