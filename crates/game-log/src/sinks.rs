//! Collaborators the tailer hands events to.
//!
//! Implementations must return quickly: they run on the tailer task between
//! lines. Anything slow belongs behind a queue.

use std::sync::Arc;

use killtrack_protocol::{KillReport, PlayerStatus};

use crate::session::SessionState;

/// Outbound report channel.
pub trait KillReporter: Send + Sync {
    fn post_kill_event(&self, report: KillReport);
    fn post_status_event(&self, player: &str, zone: &str, status: PlayerStatus);
}

/// Kill sound player.
pub trait SoundCue: Send + Sync {
    fn play_random_sound(&self);
}

/// Whatever shows the session to the user.
pub trait StatusView: Send + Sync {
    fn update_vehicle_status(&self, label: &str);
    fn update_counters(&self, kills: u32, deaths: u32, streak: u32, max_streak: u32);

    /// Pushes the whole session.
    fn render(&self, state: &SessionState) {
        let totals = state.totals();
        let streak = state.kill_streak();
        self.update_vehicle_status(state.active_vehicle().label());
        self.update_counters(totals.kills, totals.deaths, streak.current, streak.max);
    }
}

/// Does nothing. Handy default for sinks a deployment does not use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl KillReporter for NoopSink {
    fn post_kill_event(&self, _report: KillReport) {}
    fn post_status_event(&self, _player: &str, _zone: &str, _status: PlayerStatus) {}
}

impl SoundCue for NoopSink {
    fn play_random_sound(&self) {}
}

impl StatusView for NoopSink {
    fn update_vehicle_status(&self, _label: &str) {}
    fn update_counters(&self, _kills: u32, _deaths: u32, _streak: u32, _max_streak: u32) {}
}

/// The set of collaborators a tailer dispatches to.
#[derive(Clone)]
pub struct Sinks {
    pub reporter: Arc<dyn KillReporter>,
    pub sound: Arc<dyn SoundCue>,
    pub view: Arc<dyn StatusView>,
}

impl Default for Sinks {
    fn default() -> Self {
        Self {
            reporter: Arc::new(NoopSink),
            sound: Arc::new(NoopSink),
            view: Arc::new(NoopSink),
        }
    }
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks").finish_non_exhaustive()
    }
}
