use serde::{Deserialize, Serialize};

use crate::constants::{CLIENT_VERSION, COMMANDER_MODE};

/// Liveness reported for a player in heartbeats and status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Alive,
    Dead,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Dead => "dead",
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the reporting player asked to stay anonymous on the leaderboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizeState {
    pub enabled: bool,
}

/// A kill scored by the tracked player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillReport {
    pub player: String,
    pub victim: String,
    pub time: String,
    pub zone: String,
    pub weapon: String,
    pub rsi_profile: String,
    pub game_mode: String,
    pub client_ver: String,
    pub killers_ship: String,
    #[serde(default)]
    pub anonymize_state: AnonymizeState,
}

/// Commander-mode heartbeat, also used for one-off status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub is_heartbeat: bool,
    pub player: String,
    pub zone: String,
    pub client_ver: String,
    pub status: PlayerStatus,
    pub mode: String,
}

impl Heartbeat {
    /// Builds a heartbeat with the fixed client version and mode fields.
    pub fn new(player: impl Into<String>, zone: impl Into<String>, status: PlayerStatus) -> Self {
        Self {
            is_heartbeat: true,
            player: player.into(),
            zone: zone.into(),
            client_ver: CLIENT_VERSION.into(),
            status,
            mode: COMMANDER_MODE.into(),
        }
    }
}

/// A kill report that could not be delivered yet, kept for a later retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedKill {
    pub kill_result: KillReport,
    pub endpoint: String,
}
