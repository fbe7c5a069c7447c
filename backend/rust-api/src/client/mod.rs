//! Client-side halves of the session protocol: the host's countdown driver,
//! the player screen state machine, and the browser storage slots they use.

pub mod countdown;
pub mod host_loop;
pub mod player_loop;
pub mod storage;

pub use countdown::Countdown;
pub use host_loop::HostLoop;
pub use player_loop::{PlayerLoop, PlayerState, Screen};
pub use storage::ClientStorage;
