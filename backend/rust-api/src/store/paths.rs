//! Every location the services read or write. Keeping the layout in one
//! place keeps browser clients that still read the raw tree working.

use super::{StoreError, StorePath};
use crate::models::quiz::{InviteCode, QuizMode};

type Result<T> = std::result::Result<T, StoreError>;

/// `{quizzes|paid_quizzes}/{code}`
pub fn quiz(code: &InviteCode) -> Result<StorePath> {
    StorePath::root(code.mode().namespace())?.child(code.as_str())
}

/// `{ns}/{code}/participants`
pub fn quiz_participants(code: &InviteCode) -> Result<StorePath> {
    quiz(code)?.child("participants")
}

/// `{ns}/{code}/participants/{username}`
pub fn quiz_participant(code: &InviteCode, username: &str) -> Result<StorePath> {
    quiz_participants(code)?.child(username)
}

/// `{ns}/{code}/wallets/{wallet}`, the per-session wallet claim.
pub fn quiz_wallet(code: &InviteCode, wallet: &str) -> Result<StorePath> {
    quiz(code)?.child("wallets")?.child(wallet)
}

/// `{ns}/{code}/questions/{i}/participant/user_answers`
pub fn question_answers(code: &InviteCode, index: u32) -> Result<StorePath> {
    quiz(code)?
        .child("questions")?
        .index(index)
        .child("participant")?
        .child("user_answers")
}

/// `{ns}/{code}/questions/{i}/participant/user_answers/{username}`
pub fn answer(code: &InviteCode, index: u32, username: &str) -> Result<StorePath> {
    question_answers(code, index)?.child(username)
}

/// `game_participant/{code}`
pub fn game_participants(code: &InviteCode) -> Result<StorePath> {
    StorePath::root("game_participant")?.child(code.as_str())
}

/// `game_participant/{code}/{username}`
pub fn game_participant(code: &InviteCode, username: &str) -> Result<StorePath> {
    game_participants(code)?.child(username)
}

/// `game_participant/{code}/{username}/score`
pub fn participant_score(code: &InviteCode, username: &str) -> Result<StorePath> {
    game_participant(code, username)?.child("score")
}

/// `leaderboard/{username}`
pub fn global_leaderboard_entry(username: &str) -> Result<StorePath> {
    StorePath::root("leaderboard")?.child(username)
}

/// `users/{username}`
pub fn wallet_registration(username: &str) -> Result<StorePath> {
    StorePath::root("users")?.child(username)
}

/// `quizcode/{creator}` for free quizzes, `paid_quizcode/{wallet}` for paid.
pub fn creator_lookup(mode: QuizMode, creator: &str) -> Result<StorePath> {
    let root = match mode {
        QuizMode::Free => "quizcode",
        QuizMode::Paid => "paid_quizcode",
    };
    StorePath::root(root)?.child(creator)
}

/// `user_generated_quizzes/{wallet}/{code}`
pub fn user_generated_quiz(wallet: &str, code: &InviteCode) -> Result<StorePath> {
    StorePath::root("user_generated_quizzes")?
        .child(wallet)?
        .child(code.as_str())
}

/// `templates/{template}`, a reusable question set.
pub fn template(template: &str) -> Result<StorePath> {
    StorePath::root("templates")?.child(template)
}

/// `quiz_staking/{code}`
pub fn staking(code: &InviteCode) -> Result<StorePath> {
    StorePath::root("quiz_staking")?.child(code.as_str())
}

/// `quiz_staking/{code}/transactionDetails`
pub fn staking_transaction(code: &InviteCode) -> Result<StorePath> {
    staking(code)?.child("transactionDetails")
}

/// `quiz_staking/{code}/payoutClaim`
pub fn payout_claim(code: &InviteCode) -> Result<StorePath> {
    staking(code)?.child("payoutClaim")
}

/// `free_game/{game}/questions`
pub fn practice_questions(game: &str) -> Result<StorePath> {
    StorePath::root("free_game")?.child(game)?.child("questions")
}

/// `free_game/{game}/answers/{username}/{i}`
pub fn practice_answer(game: &str, username: &str, index: u32) -> Result<StorePath> {
    Ok(StorePath::root("free_game")?
        .child(game)?
        .child("answers")?
        .child(username)?
        .index(index))
}

/// `free_game/leaderboard`
pub fn practice_leaderboard() -> Result<StorePath> {
    StorePath::root("free_game")?.child("leaderboard")
}

/// `free_game/leaderboard/{username}`
pub fn practice_score(username: &str) -> Result<StorePath> {
    practice_leaderboard()?.child(username)
}

/// `free_game/participation/{game}/{username}`
pub fn practice_participation(game: &str, username: &str) -> Result<StorePath> {
    StorePath::root("free_game")?
        .child("participation")?
        .child(game)?
        .child(username)
}

/// Game names that would collide with the fixed children of `free_game`.
pub const RESERVED_PRACTICE_GAMES: [&str; 2] = ["leaderboard", "participation"];
