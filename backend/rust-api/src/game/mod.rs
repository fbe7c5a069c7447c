//! Pure session rules: phase transitions and scoring. No I/O.

pub mod phase;
pub mod scoring;

pub use phase::{LegacyFlags, PhaseError, SessionPhase, FINISHED_SENTINEL};
pub use scoring::ScoringRule;
