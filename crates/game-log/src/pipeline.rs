//! Classify, apply, and decide side effects for one line at a time.
//!
//! The pipeline owns the [`SessionState`]. It never performs I/O; the
//! tailer turns the returned [`Effect`]s into collaborator calls.

use killtrack_protocol::{KillReport, PlayerStatus};

use crate::kill::{KillResult, parse_kill};
use crate::matcher::{ClassifiedEvent, classify};
use crate::session::SessionState;

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Already in the file when the tailer attached. Never uploaded.
    Backlog,
    /// Appended while following.
    Live,
}

/// A side effect requested by a live line.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ReportKill(KillReport),
    ReportStatus {
        player: String,
        zone: String,
        status: PlayerStatus,
    },
    PlaySound,
}

/// Result of processing one line.
#[derive(Debug, Default, PartialEq)]
pub struct LineOutcome {
    pub effects: Vec<Effect>,
    /// Whether the session state changed.
    pub changed: bool,
}

/// Single writer of the session state.
#[derive(Debug, Clone)]
pub struct LinePipeline {
    state: SessionState,
    anonymize: bool,
}

impl LinePipeline {
    pub fn new(state: SessionState, anonymize: bool) -> Self {
        Self { state, anonymize }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }

    pub fn set_anonymize(&mut self, anonymize: bool) {
        self.anonymize = anonymize;
    }

    /// Processes one line. Backlog lines update state exactly like live ones
    /// but never produce effects.
    pub fn process_line(&mut self, line: &str, phase: Phase) -> LineOutcome {
        let mut outcome = LineOutcome::default();
        let live = phase == Phase::Live;

        let event = match classify(line, &self.state) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, line = line.trim_end(), "skipping malformed line");
                return outcome;
            }
        };

        match event {
            ClassifiedEvent::Unrecognized => {}
            ClassifiedEvent::PlayerIdentified { handle } => {
                outcome.changed = self.state.resolve_handle(&handle);
                if outcome.changed {
                    tracing::info!(handle = %handle, "player handle resolved");
                }
            }
            ClassifiedEvent::CharacterIdentified { geid } => {
                outcome.changed = self.state.resolve_geid(&geid);
                if outcome.changed {
                    tracing::debug!(geid = %geid, "character id resolved");
                }
            }
            ClassifiedEvent::GameModeChanged { mode } => {
                outcome.changed = self.state.set_game_mode(&mode);
                tracing::debug!(mode = %mode, "game mode");
            }
            ClassifiedEvent::VehicleEntered { kind, instance_id } => {
                outcome.changed = self.state.enter_vehicle(&kind, &instance_id);
                tracing::debug!(vehicle = %kind, id = %instance_id, "vehicle spawned");
            }
            ClassifiedEvent::VehicleDestroyed | ClassifiedEvent::ZoneEntered(None) => {
                outcome.changed = self.state.clear_vehicle();
                if outcome.changed {
                    tracing::debug!("vehicle cleared");
                }
            }
            ClassifiedEvent::ZoneEntered(Some(zone)) => {
                outcome.changed = self.state.enter_vehicle(&zone.kind, &zone.instance_id);
                tracing::debug!(vehicle = %zone.kind, id = %zone.instance_id, "entered zone");
                if live {
                    if let Some(player) = self.state.player_handle() {
                        outcome.effects.push(Effect::ReportStatus {
                            player: player.to_string(),
                            zone: zone.kind,
                            status: PlayerStatus::Alive,
                        });
                    }
                }
            }
            ClassifiedEvent::KillLine(line) => self.apply_kill(&line, live, &mut outcome),
        }

        outcome
    }

    fn apply_kill(&mut self, line: &str, live: bool, outcome: &mut LineOutcome) {
        let Some(handle) = self.state.player_handle().map(str::to_string) else {
            return;
        };

        let result = match parse_kill(line, &handle, &self.state, self.anonymize) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "kill line failed to parse");
                return;
            }
        };

        match result {
            KillResult::Exclusion => {
                tracing::info!(
                    mode = self.state.game_mode(),
                    "crash or self-destruct, ignoring kill"
                );
            }
            KillResult::Reset => tracing::debug!("ship reset, ignoring kill"),
            KillResult::Bystander { victim, killer } => {
                tracing::debug!(victim = %victim, killer = %killer, "kill between other players");
            }
            KillResult::Suicide { victim, zone } => {
                if victim == handle {
                    tracing::info!("self-inflicted death");
                    self.record_death(&handle, zone, live, outcome);
                } else {
                    tracing::debug!(victim = %victim, "someone else's suicide");
                }
            }
            KillResult::Killed {
                killer,
                weapon,
                zone,
            } => {
                tracing::info!(killer = %killer, weapon = %weapon, "killed");
                self.record_death(&handle, zone, live, outcome);
            }
            KillResult::Killer(report) => {
                self.state.record_kill();
                outcome.changed = true;
                if live {
                    tracing::info!(
                        victim = %report.victim,
                        weapon = %report.weapon,
                        streak = self.state.kill_streak().current,
                        "kill"
                    );
                    outcome.effects.push(Effect::PlaySound);
                    outcome.effects.push(Effect::ReportKill(report));
                } else {
                    tracing::info!(
                        victim = %report.victim,
                        "stale kill from backlog, not uploaded"
                    );
                }
            }
        }
    }

    fn record_death(&mut self, handle: &str, zone: String, live: bool, outcome: &mut LineOutcome) {
        self.state.record_death();
        outcome.changed = true;
        if live {
            outcome.effects.push(Effect::ReportStatus {
                player: handle.to_string(),
                zone,
                status: PlayerStatus::Dead,
            });
        }
    }
}
