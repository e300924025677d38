//! Game log tailing and event extraction.
//!
//! Classifies game client log lines, keeps the session state they imply and
//! hands kills, deaths and zone changes to the report, sound and status
//! collaborators. Lines already in the log when tailing starts update the
//! session but are never reported.

mod error;
pub mod kill;
mod locate;
pub mod matcher;
mod pipeline;
mod session;
mod sinks;
mod tailer;

#[cfg(test)]
mod test_lines;

pub use error::{GameLogError, ParseError};
pub use kill::{KillResult, parse_kill};
pub use locate::{GAME_LOG_NAME, find_game_log, find_player_handle};
pub use matcher::{ClassifiedEvent, ZoneEntry, classify};
pub use pipeline::{Effect, LineOutcome, LinePipeline, Phase};
pub use session::{
    ActiveVehicle, DEFAULT_GAME_MODE, KillStreak, ON_FOOT_LABEL, SessionState, SessionTotals,
    UNKNOWN_GAME_MODE,
};
pub use sinks::{KillReporter, NoopSink, Sinks, SoundCue, StatusView};
pub use tailer::{DEFAULT_POLL_INTERVAL, LogTailer, ResumePoint, TailPhase, TailerConfig};
