//! Status output for a headless tracker: the session goes to the log.

use std::sync::{Mutex, PoisonError};

use killtrack_game_log::StatusView;

#[derive(Debug, Default, Clone, PartialEq)]
struct Shown {
    vehicle: String,
    counters: (u32, u32, u32, u32),
}

/// Logs vehicle and counter changes, skipping repeats.
#[derive(Debug, Default)]
pub struct LogView {
    shown: Mutex<Shown>,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusView for LogView {
    fn update_vehicle_status(&self, label: &str) {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        if shown.vehicle != label {
            shown.vehicle = label.to_string();
            tracing::info!(vehicle = label, "vehicle");
        }
    }

    fn update_counters(&self, kills: u32, deaths: u32, streak: u32, max_streak: u32) {
        let counters = (kills, deaths, streak, max_streak);
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        if shown.counters != counters {
            shown.counters = counters;
            tracing::info!(kills, deaths, streak, max_streak, "session");
        }
    }
}
