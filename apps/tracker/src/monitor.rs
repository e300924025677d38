//! Game process monitor.
//!
//! Polls the process table and starts the tailer when the game comes up,
//! stopping it again when the game exits. Session state survives a stop, so
//! a restarted game continues where the last one left off.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use killtrack_game_log::{LogTailer, find_game_log, find_player_handle};
use killtrack_reporter::{Credentials, KeyState, ReportApi};
use sysinfo::{ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

/// A running game client.
#[derive(Debug, Clone, PartialEq)]
pub struct GameProcess {
    pub pid: u32,
    pub exe: Option<PathBuf>,
}

/// Looks up the game in the process table.
pub trait ProcessProbe: Send {
    fn find(&mut self, name: &str) -> Option<GameProcess>;
}

/// [`ProcessProbe`] over the real process table.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn find(&mut self, name: &str) -> Option<GameProcess> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        self.system
            .processes()
            .iter()
            .find(|(_, process)| process_matches(&process.name().to_string_lossy(), name))
            .map(|(pid, process)| GameProcess {
                pid: pid.as_u32(),
                exe: process.exe().map(Path::to_path_buf),
            })
    }
}

/// Compares a process name against the configured one, ignoring case and
/// an `.exe` suffix.
fn process_matches(process: &str, wanted: &str) -> bool {
    let process = process
        .strip_suffix(".exe")
        .or_else(|| process.strip_suffix(".EXE"))
        .unwrap_or(process);
    process.eq_ignore_ascii_case(wanted)
}

/// What the monitor should do after a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start(GameProcess),
    Stop,
}

/// Decides the next transition from what the poll saw and whether the
/// tailer is running.
pub fn next_transition(found: Option<GameProcess>, tailing: bool) -> Option<Transition> {
    match (found, tailing) {
        (Some(process), false) => Some(Transition::Start(process)),
        (None, true) => Some(Transition::Stop),
        _ => None,
    }
}

/// Picks the log to tail: the configured path, or `Game.log` beside the
/// game executable.
pub fn resolve_log_path(configured: Option<&Path>, exe: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }
    exe.and_then(Path::parent).and_then(find_game_log)
}

pub struct Monitor<P> {
    probe: P,
    process_name: String,
    log_path: Option<PathBuf>,
    interval: Duration,
    tailer: Arc<LogTailer>,
    api: Arc<dyn ReportApi>,
    credentials: Arc<Credentials>,
}

impl<P: ProcessProbe> Monitor<P> {
    pub fn new(
        probe: P,
        process_name: impl Into<String>,
        log_path: Option<PathBuf>,
        interval: Duration,
        tailer: Arc<LogTailer>,
        api: Arc<dyn ReportApi>,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            probe,
            process_name: process_name.into(),
            log_path,
            interval,
            tailer,
            api,
            credentials,
        }
    }

    /// Polls until cancelled, then stops the tailer.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(process = %self.process_name, "watching for game process");
        loop {
            self.poll().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        self.tailer.stop().await;
    }

    async fn poll(&mut self) {
        let found = self.probe.find(&self.process_name);
        let tailing = self.tailer.is_running().await;

        match next_transition(found, tailing) {
            Some(Transition::Start(process)) => self.on_game_started(process).await,
            Some(Transition::Stop) => {
                tracing::info!("game process exited");
                self.tailer.stop().await;
            }
            None if tailing => self.revalidate_key().await,
            None => {}
        }
    }

    /// Validates the key once the tailed session knows the player, and
    /// again after a failed attempt or an expiry.
    async fn revalidate_key(&mut self) {
        if self.credentials.usable_key().is_some() {
            return;
        }
        if matches!(
            self.credentials.state(),
            KeyState::Missing | KeyState::Rejected { .. }
        ) {
            return;
        }
        let Some(handle) = self.tailer.snapshot().player_handle().map(str::to_string) else {
            return;
        };
        if let Err(e) = self.credentials.validate(self.api.as_ref(), &handle).await {
            tracing::warn!(error = %e, "key validation failed, retrying next poll");
        }
    }

    async fn on_game_started(&mut self, process: GameProcess) {
        let Some(path) = resolve_log_path(self.log_path.as_deref(), process.exe.as_deref()) else {
            tracing::warn!(pid = process.pid, "game running but no game log found yet");
            return;
        };

        match find_player_handle(&path) {
            Ok(Some(handle)) => {
                if let Err(e) = self.credentials.validate(self.api.as_ref(), &handle).await {
                    tracing::warn!(error = %e, "key validation failed");
                }
            }
            Ok(None) => tracing::info!("player not logged in yet, key validation deferred"),
            Err(e) => tracing::warn!(error = %e, "could not scan game log for player"),
        }

        match self.tailer.start(&path).await {
            Ok(()) => tracing::info!(pid = process.pid, path = %path.display(), "game detected"),
            Err(e) => tracing::error!(error = %e, path = %path.display(), "failed to start tailer"),
        }
    }
}
