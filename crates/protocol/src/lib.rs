//! Wire payloads for the kill report service.
//!
//! The service speaks plain JSON over HTTP. Field names are snake_case and
//! must match the server exactly, so every type here pins its keys.

pub mod constants;
pub mod messages;
pub mod types;

pub use constants::{CLIENT_VERSION, COMMANDER_MODE, citizen_profile_url};
pub use messages::{CommanderEntry, HeartbeatResponse, KeyValidationRequest, KeyValidationResponse};
pub use types::{AnonymizeState, BufferedKill, Heartbeat, KillReport, PlayerStatus};
