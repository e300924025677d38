//! Per-session tracker state.
//!
//! Only the line pipeline mutates a [`SessionState`]; everyone else sees
//! cloned snapshots published by the tailer.

use serde::Serialize;

/// Game mode of the persistent universe lobby. Vehicle spawns are ignored
/// while in it and entering it puts the player back on foot.
pub const DEFAULT_GAME_MODE: &str = "SC_Default";

/// Game mode before any mode line has been seen.
pub const UNKNOWN_GAME_MODE: &str = "Unknown";

/// Label shown and reported while the player is not in a vehicle.
pub const ON_FOOT_LABEL: &str = "N/A";

/// The vehicle the tracked player is currently associated with.
///
/// Type and instance id travel together, so a half-known vehicle cannot be
/// represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ActiveVehicle {
    #[default]
    OnFoot,
    #[serde(rename_all = "camelCase")]
    InVehicle { kind: String, instance_id: String },
}

impl ActiveVehicle {
    /// Vehicle type, or [`ON_FOOT_LABEL`].
    pub fn label(&self) -> &str {
        match self {
            Self::OnFoot => ON_FOOT_LABEL,
            Self::InVehicle { kind, .. } => kind,
        }
    }

    pub fn instance_id(&self) -> Option<&str> {
        match self {
            Self::OnFoot => None,
            Self::InVehicle { instance_id, .. } => Some(instance_id),
        }
    }

    pub fn is_on_foot(&self) -> bool {
        matches!(self, Self::OnFoot)
    }
}

/// Consecutive kills without an intervening death.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillStreak {
    pub current: u32,
    pub max: u32,
}

/// Kill and death totals since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionTotals {
    pub kills: u32,
    pub deaths: u32,
}

/// Everything the tracker knows about the running game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    game_mode: String,
    active_vehicle: ActiveVehicle,
    player_handle: Option<String>,
    player_geid: Option<String>,
    kill_streak: KillStreak,
    totals: SessionTotals,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            game_mode: UNKNOWN_GAME_MODE.into(),
            active_vehicle: ActiveVehicle::OnFoot,
            player_handle: None,
            player_geid: None,
            kill_streak: KillStreak::default(),
            totals: SessionTotals::default(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with the player handle already resolved, e.g. from a startup
    /// scan of the log.
    pub fn with_player(handle: impl Into<String>) -> Self {
        Self {
            player_handle: Some(handle.into()),
            ..Self::default()
        }
    }

    pub fn game_mode(&self) -> &str {
        &self.game_mode
    }

    pub fn is_default_mode(&self) -> bool {
        self.game_mode == DEFAULT_GAME_MODE
    }

    pub fn active_vehicle(&self) -> &ActiveVehicle {
        &self.active_vehicle
    }

    pub fn player_handle(&self) -> Option<&str> {
        self.player_handle.as_deref()
    }

    pub fn player_geid(&self) -> Option<&str> {
        self.player_geid.as_deref()
    }

    pub fn kill_streak(&self) -> KillStreak {
        self.kill_streak
    }

    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    /// Records a game mode. Entering the default mode puts the player on foot.
    pub(crate) fn set_game_mode(&mut self, mode: &str) -> bool {
        let mut changed = false;
        if self.game_mode != mode {
            self.game_mode = mode.to_string();
            changed = true;
        }
        if self.is_default_mode() {
            changed |= self.clear_vehicle();
        }
        changed
    }

    pub(crate) fn enter_vehicle(&mut self, kind: &str, instance_id: &str) -> bool {
        let next = ActiveVehicle::InVehicle {
            kind: kind.to_string(),
            instance_id: instance_id.to_string(),
        };
        if self.active_vehicle == next {
            return false;
        }
        self.active_vehicle = next;
        true
    }

    pub(crate) fn clear_vehicle(&mut self) -> bool {
        if self.active_vehicle.is_on_foot() {
            return false;
        }
        self.active_vehicle = ActiveVehicle::OnFoot;
        true
    }

    /// Sets the handle unless one is already known. Handles do not change
    /// within a session.
    pub(crate) fn resolve_handle(&mut self, handle: &str) -> bool {
        if self.player_handle.is_some() {
            return false;
        }
        self.player_handle = Some(handle.to_string());
        true
    }

    pub(crate) fn resolve_geid(&mut self, geid: &str) -> bool {
        if self.player_geid.is_some() {
            return false;
        }
        self.player_geid = Some(geid.to_string());
        true
    }

    pub(crate) fn record_kill(&mut self) {
        self.totals.kills = self.totals.kills.saturating_add(1);
        self.kill_streak.current = self.kill_streak.current.saturating_add(1);
        self.kill_streak.max = self.kill_streak.max.max(self.kill_streak.current);
    }

    pub(crate) fn record_death(&mut self) {
        self.totals.deaths = self.totals.deaths.saturating_add(1);
        self.kill_streak.current = 0;
        self.clear_vehicle();
    }
}
