use serde::{Deserialize, Serialize};

use crate::types::PlayerStatus;

/// Body of a key validation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValidationRequest {
    pub player_name: String,
}

/// Reply to a key validation request.
///
/// `expires_at` uses `%Y-%m-%dT%H:%M:%S%.fZ` (UTC). Rejected keys carry an
/// `error` message instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValidationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A player entry in the commander roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommanderEntry {
    pub player: String,
    #[serde(default)]
    pub zone: String,
    pub status: PlayerStatus,
}

/// Reply to a heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub commanders: Vec<CommanderEntry>,
}
