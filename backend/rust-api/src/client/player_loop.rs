use super::countdown::Countdown;
use crate::game::{SessionPhase, FINISHED_SENTINEL};
use crate::models::answer::SubmitAnswerRequest;
use crate::models::quiz::OPTIONS_PER_QUESTION;
use crate::models::session::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    WaitingForStart,
    Answering(u32),
    Submitted(u32),
    BetweenQuestions(u32),
    Finished,
}

/// What the player is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    WaitRoom,
    Question(u32),
    AnswerLocked(u32),
    BetweenQuestionLeaderboard(u32),
    FinalLeaderboard,
    /// Session unusable, e.g. a quiz without questions.
    Dashboard,
}

/// One player's view of a session, driven by store snapshots and a local
/// countdown. Inconsistent session state never errors; it routes to a
/// fallback screen.
#[derive(Debug)]
pub struct PlayerLoop {
    username: String,
    countdown_secs: u32,
    state: PlayerState,
    countdown: Option<Countdown>,
    selected: Option<u8>,
    dead_end: bool,
}

impl PlayerLoop {
    pub fn new(username: impl Into<String>, countdown_secs: u32) -> Self {
        Self {
            username: username.into(),
            countdown_secs,
            state: PlayerState::WaitingForStart,
            countdown: None,
            selected: None,
            dead_end: false,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    pub fn screen(&self) -> Screen {
        if self.dead_end {
            return Screen::Dashboard;
        }
        match self.state {
            PlayerState::WaitingForStart => Screen::WaitRoom,
            PlayerState::Answering(i) => Screen::Question(i),
            PlayerState::Submitted(i) => Screen::AnswerLocked(i),
            PlayerState::BetweenQuestions(i) => Screen::BetweenQuestionLeaderboard(i),
            PlayerState::Finished => Screen::FinalLeaderboard,
        }
    }

    /// Applies the latest session record. `None` means it vanished.
    pub fn observe(&mut self, snapshot: Option<&SessionSnapshot>, now: i64) -> Screen {
        let Some(snapshot) = snapshot else {
            return self.finish();
        };
        if snapshot.question_count == 0 {
            self.dead_end = true;
            self.countdown = None;
            return Screen::Dashboard;
        }
        if snapshot.current_question >= FINISHED_SENTINEL
            || snapshot.current_question >= snapshot.question_count
        {
            return self.finish();
        }

        match snapshot.phase {
            SessionPhase::Idle => {
                self.state = PlayerState::WaitingForStart;
            }
            SessionPhase::Live { question } => match self.state {
                PlayerState::Answering(i)
                | PlayerState::Submitted(i)
                | PlayerState::BetweenQuestions(i)
                    if i == question => {}
                PlayerState::Finished => {}
                _ => {
                    let started_at = snapshot.question_started_at.unwrap_or(now);
                    self.countdown = Some(Countdown::new(started_at, self.countdown_secs));
                    self.selected = None;
                    self.state = PlayerState::Answering(question);
                }
            },
            SessionPhase::BetweenQuestions { question } => {
                self.to_between(question);
            }
            SessionPhase::Finished => return self.finish(),
        }
        self.screen()
    }

    /// Local choice; nothing is written until submit.
    pub fn select(&mut self, option: u8) -> bool {
        if !matches!(self.state, PlayerState::Answering(_))
            || usize::from(option) >= OPTIONS_PER_QUESTION
        {
            return false;
        }
        self.selected = Some(option);
        true
    }

    /// Builds the one submission allowed for the live question and locks
    /// further submits. `None` without a selection or outside answering.
    pub fn submit(&mut self, now: i64) -> Option<SubmitAnswerRequest> {
        let PlayerState::Answering(index) = self.state else {
            return None;
        };
        let answer = self.selected?;
        let time_left = self
            .countdown
            .map(|c| c.remaining(now))
            .unwrap_or(self.countdown_secs);

        self.state = PlayerState::Submitted(index);
        Some(SubmitAnswerRequest {
            username: self.username.clone(),
            question_index: index,
            answer,
            time_left,
        })
    }

    /// Moves to the between-question board once the countdown runs out.
    pub fn tick(&mut self, now: i64) -> Screen {
        if let PlayerState::Answering(i) | PlayerState::Submitted(i) = self.state {
            if self.countdown.is_some_and(|c| c.is_expired(now)) {
                self.to_between(i);
            }
        }
        self.screen()
    }

    /// Leaving the tab forfeits the live question.
    pub fn visibility_lost(&mut self) -> Screen {
        if let PlayerState::Answering(i) | PlayerState::Submitted(i) = self.state {
            self.to_between(i);
        }
        self.screen()
    }

    pub fn remaining(&self, now: i64) -> Option<u32> {
        match self.state {
            PlayerState::Answering(_) => self.countdown.map(|c| c.remaining(now)),
            _ => None,
        }
    }

    fn to_between(&mut self, question: u32) {
        self.state = PlayerState::BetweenQuestions(question);
        self.countdown = None;
        self.selected = None;
    }

    fn finish(&mut self) -> Screen {
        self.state = PlayerState::Finished;
        self.countdown = None;
        self.selected = None;
        self.screen()
    }
}
