use crate::models::quiz::QuizMode;

/// Time-weighted scoring. Free and paid quizzes keep their own curves because
/// reward ranking depends on the exact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRule {
    /// `round(10 * t / 20)`
    Linear,
    /// `round(100 + 50 * (t / 15)^2)`
    Quadratic,
}

impl ScoringRule {
    pub fn for_mode(mode: QuizMode) -> Self {
        match mode {
            QuizMode::Free => ScoringRule::Linear,
            QuizMode::Paid => ScoringRule::Quadratic,
        }
    }

    /// Seconds of `time_left` the curve rewards; larger values are clamped.
    pub fn window_secs(self) -> u32 {
        match self {
            ScoringRule::Linear => 20,
            ScoringRule::Quadratic => 15,
        }
    }

    pub fn score(self, correct: bool, time_left: u32) -> i64 {
        if !correct {
            return 0;
        }
        let t = f64::from(time_left.min(self.window_secs()));
        let points = match self {
            ScoringRule::Linear => 10.0 * t / 20.0,
            ScoringRule::Quadratic => 100.0 + 50.0 * (t / 15.0).powi(2),
        };
        points.round() as i64
    }
}

pub fn feedback(correct: bool, points: i64, correct_option: &str) -> String {
    if correct {
        format!("Correct! You earned {} points!", points)
    } else {
        format!("Incorrect. The correct answer was: {}", correct_option)
    }
}
