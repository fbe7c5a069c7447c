pub mod answer;
pub mod leaderboard;
pub mod participant;
pub mod payout;
pub mod practice;
pub mod quiz;
pub mod session;

pub use answer::{AnswerRecord, SubmitAnswerRequest, SubmitAnswerResponse};
pub use leaderboard::{Leaderboard, LeaderboardEntry, QuestionResponse};
pub use participant::{JoinRequest, JoinResponse, Participant};
pub use quiz::{CreateQuizRequest, CreateQuizResponse, InviteCode, Question, Quiz, QuizMode};
pub use session::{PublicQuestion, SessionEvent, SessionSnapshot};
