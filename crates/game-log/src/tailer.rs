//! Game log tailer.
//!
//! Replays what is already in the log without uploading anything, then
//! follows appended lines. The file is polled; truncation or rotation is
//! detected by the file shrinking below what was already read.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::GameLogError;
use crate::pipeline::{Effect, LinePipeline, Phase};
use crate::session::SessionState;
use crate::sinks::Sinks;

/// Default sleep at end of file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lines processed between cooperative yields during a long replay.
const YIELD_EVERY: usize = 1024;

/// Tailer settings.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    pub poll_interval: Duration,
    /// Copied into every kill report.
    pub anonymize: bool,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            anonymize: false,
        }
    }
}

/// Lifecycle of the tailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    Idle,
    BacklogReplay,
    Following,
    Stopped,
}

/// Where a stopped tail left off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub path: PathBuf,
    /// Byte offset just past the last complete line processed.
    pub offset: u64,
}

/// Tails one game log at a time and keeps the session state across restarts.
pub struct LogTailer {
    inner: Arc<Mutex<TailerState>>,
    snapshot_tx: watch::Sender<SessionState>,
    phase_tx: watch::Sender<TailPhase>,
}

struct TailerState {
    config: TailerConfig,
    sinks: Sinks,
    /// `None` while a tail task owns it.
    pipeline: Option<LinePipeline>,
    resume: Option<ResumePoint>,
    running: Option<RunningTail>,
}

struct RunningTail {
    cancel: CancellationToken,
    handle: JoinHandle<TailExit>,
}

struct TailExit {
    pipeline: LinePipeline,
    resume: ResumePoint,
}

impl LogTailer {
    pub fn new(config: TailerConfig, sinks: Sinks) -> Self {
        Self::with_state(config, sinks, SessionState::new())
    }

    /// Creates a tailer seeded with an existing session, e.g. one whose
    /// handle was resolved before the game log was tailed.
    pub fn with_state(config: TailerConfig, sinks: Sinks, state: SessionState) -> Self {
        let (snapshot_tx, _) = watch::channel(state.clone());
        let (phase_tx, _) = watch::channel(TailPhase::Idle);
        let pipeline = LinePipeline::new(state, config.anonymize);
        Self {
            inner: Arc::new(Mutex::new(TailerState {
                config,
                sinks,
                pipeline: Some(pipeline),
                resume: None,
                running: None,
            })),
            snapshot_tx,
            phase_tx,
        }
    }

    /// Opens `path` and starts tailing it on a background task.
    ///
    /// Failing to open the file is fatal and nothing is started. Restarting
    /// on the file a previous tail stopped in continues after the last
    /// processed line, unless the file has since shrunk.
    pub async fn start(&self, path: impl Into<PathBuf>) -> Result<(), GameLogError> {
        let path = path.into();
        let mut state = self.inner.lock().await;

        if let Some(running) = state.running.take() {
            if !running.handle.is_finished() {
                state.running = Some(running);
                return Err(GameLogError::AlreadyRunning);
            }
            self.reclaim(&mut state, running).await;
        }

        let mut file = open_log(&path)?;
        let backlog_end = file.metadata()?.len();
        let start_offset = match &state.resume {
            Some(resume) if resume.path == path && backlog_end >= resume.offset => resume.offset,
            _ => 0,
        };
        file.seek(SeekFrom::Start(start_offset))?;

        let mut pipeline = match state.pipeline.take() {
            Some(pipeline) => pipeline,
            None => LinePipeline::new(self.snapshot_tx.borrow().clone(), state.config.anonymize),
        };
        pipeline.set_anonymize(state.config.anonymize);

        let cancel = CancellationToken::new();
        let task = TailTask {
            path: path.clone(),
            reader: LineReader::new(file, start_offset),
            backlog_end,
            pipeline,
            sinks: state.sinks.clone(),
            poll_interval: state.config.poll_interval,
            cancel: cancel.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
            phase_tx: self.phase_tx.clone(),
        };
        let handle = tokio::spawn(task.run());
        state.running = Some(RunningTail { cancel, handle });

        tracing::info!(
            path = %path.display(),
            offset = start_offset,
            backlog_bytes = backlog_end.saturating_sub(start_offset),
            "started tailing game log"
        );
        Ok(())
    }

    /// Stops the running tail and waits for it to release the file.
    ///
    /// The session state and read position are kept for the next
    /// [`start`](Self::start).
    pub async fn stop(&self) {
        let mut state = self.inner.lock().await;
        if let Some(running) = state.running.take() {
            running.cancel.cancel();
            self.reclaim(&mut state, running).await;
            tracing::info!("stopped tailing game log");
        }
    }

    async fn reclaim(&self, state: &mut TailerState, running: RunningTail) {
        match running.handle.await {
            Ok(exit) => {
                state.pipeline = Some(exit.pipeline);
                state.resume = Some(exit.resume);
            }
            Err(e) => {
                // The task died mid-line; rebuild from the last published snapshot.
                tracing::error!(error = %e, "tail task failed");
                state.pipeline = Some(LinePipeline::new(
                    self.snapshot_tx.borrow().clone(),
                    state.config.anonymize,
                ));
                state.resume = None;
                self.phase_tx.send_replace(TailPhase::Stopped);
            }
        }
    }

    /// Whether a tail task is currently running.
    pub async fn is_running(&self) -> bool {
        self.inner
            .lock()
            .await
            .running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn phase(&self) -> TailPhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<TailPhase> {
        self.phase_tx.subscribe()
    }

    /// Latest session snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.snapshot_tx.borrow().clone()
    }

    /// Receives a snapshot after every state-changing line.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshot_tx.subscribe()
    }

    /// Where the last stopped tail left off.
    pub async fn resume_point(&self) -> Option<ResumePoint> {
        self.inner.lock().await.resume.clone()
    }
}

fn open_log(path: &Path) -> Result<File, GameLogError> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GameLogError::NotFound(path.to_path_buf()),
        _ => GameLogError::Io(e),
    })
}

/// Reads complete lines, holding a trailing partial line until its newline
/// arrives.
struct LineReader {
    reader: BufReader<File>,
    pending: Vec<u8>,
    /// Just past the last complete line.
    offset: u64,
    /// Everything read from the file, including `pending`.
    position: u64,
}

impl LineReader {
    fn new(file: File, offset: u64) -> Self {
        Self {
            reader: BufReader::new(file),
            pending: Vec::new(),
            offset,
            position: offset,
        }
    }

    fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.pending)?;
        self.position += n as u64;
        if self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.pending.clear();
        self.offset = self.position;
        Ok(Some(line))
    }

    /// Opens `path` again after the last complete line. A partial line
    /// read so far is dropped and read again.
    fn reopen(&mut self, path: &Path) -> std::io::Result<()> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        *self = Self::new(file, self.offset);
        Ok(())
    }
}

struct TailTask {
    path: PathBuf,
    reader: LineReader,
    backlog_end: u64,
    pipeline: LinePipeline,
    sinks: Sinks,
    poll_interval: Duration,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<SessionState>,
    phase_tx: watch::Sender<TailPhase>,
}

impl TailTask {
    async fn run(mut self) -> TailExit {
        self.snapshot_tx.send_replace(self.pipeline.state().clone());
        self.sinks.view.render(self.pipeline.state());

        let mut following = self.reader.offset >= self.backlog_end;
        if following {
            self.enter_following();
        } else {
            self.phase_tx.send_replace(TailPhase::BacklogReplay);
            tracing::info!(
                "loading existing log; kills shown from it are stale and will not be uploaded"
            );
        }

        let mut last_known_size = self.backlog_end;
        let mut since_yield = 0usize;

        while !self.cancel.is_cancelled() {
            match self.reader.next_line() {
                Ok(Some(line)) => {
                    if !following && self.reader.offset > self.backlog_end {
                        following = true;
                        self.enter_following();
                    }
                    let phase = if following { Phase::Live } else { Phase::Backlog };
                    self.handle_line(&line, phase);

                    since_yield += 1;
                    if since_yield >= YIELD_EVERY {
                        since_yield = 0;
                        tokio::task::yield_now().await;
                    }
                }
                Ok(None) => {
                    if !following {
                        following = true;
                        self.enter_following();
                    }
                    if !self.idle().await {
                        break;
                    }
                    self.check_rotation(&mut last_known_size);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset = self.reader.offset,
                        error = %e,
                        "error reading game log, reopening"
                    );
                    if !self.idle().await {
                        break;
                    }
                    if let Err(e) = self.reader.reopen(&self.path) {
                        tracing::warn!(path = %self.path.display(), error = %e, "reopen failed");
                    }
                }
            }
        }

        self.phase_tx.send_replace(TailPhase::Stopped);
        tracing::debug!(offset = self.reader.offset, "tail task exiting");
        TailExit {
            resume: ResumePoint {
                path: self.path,
                offset: self.reader.offset,
            },
            pipeline: self.pipeline,
        }
    }

    /// Sleeps one poll interval. Returns `false` if cancelled.
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }

    fn enter_following(&self) {
        self.phase_tx.send_replace(TailPhase::Following);
        tracing::info!(path = %self.path.display(), "kill tracking active, following game log");
    }

    fn handle_line(&mut self, line: &str, phase: Phase) {
        let outcome = self.pipeline.process_line(line, phase);
        for effect in outcome.effects {
            match effect {
                Effect::ReportKill(report) => self.sinks.reporter.post_kill_event(report),
                Effect::ReportStatus {
                    player,
                    zone,
                    status,
                } => self.sinks.reporter.post_status_event(&player, &zone, status),
                Effect::PlaySound => self.sinks.sound.play_random_sound(),
            }
        }
        if outcome.changed {
            self.sinks.view.render(self.pipeline.state());
            self.snapshot_tx.send_replace(self.pipeline.state().clone());
        }
    }

    /// Reopens the log from the start if it shrank below what was read.
    fn check_rotation(&mut self, last_known_size: &mut u64) {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot stat game log");
                return;
            }
        };

        if len >= *last_known_size && len >= self.reader.position {
            *last_known_size = len;
            return;
        }

        tracing::warn!(
            path = %self.path.display(),
            previous = *last_known_size,
            current = len,
            "game log truncated or rotated, reopening from start"
        );
        match File::open(&self.path) {
            Ok(file) => {
                self.reader = LineReader::new(file, 0);
                *last_known_size = len;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to reopen game log"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use killtrack_protocol::{KillReport, PlayerStatus};

    use crate::sinks::{KillReporter, NoopSink, SoundCue};
    use crate::test_lines as lines;

    #[derive(Default)]
    struct Recorder {
        kills: StdMutex<Vec<KillReport>>,
        statuses: StdMutex<Vec<(String, String, PlayerStatus)>>,
        sounds: AtomicUsize,
    }

    impl KillReporter for Recorder {
        fn post_kill_event(&self, report: KillReport) {
            self.kills.lock().unwrap().push(report);
        }
        fn post_status_event(&self, player: &str, zone: &str, status: PlayerStatus) {
            self.statuses
                .lock()
                .unwrap()
                .push((player.into(), zone.into(), status));
        }
    }

    impl SoundCue for Recorder {
        fn play_random_sound(&self) {
            self.sounds.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Recorder {
        fn kill_count(&self) -> usize {
            self.kills.lock().unwrap().len()
        }
    }

    fn tailer_with(recorder: &Arc<Recorder>) -> LogTailer {
        let sinks = Sinks {
            reporter: recorder.clone(),
            sound: recorder.clone(),
            view: Arc::new(NoopSink),
        };
        let config = TailerConfig {
            poll_interval: Duration::from_millis(20),
            anonymize: false,
        };
        LogTailer::new(config, sinks)
    }

    fn write_lines(path: &Path, lines: &[String]) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..250 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let tailer = LogTailer::new(TailerConfig::default(), Sinks::default());
        let tmp = tempfile::tempdir().unwrap();
        let err = tailer.start(tmp.path().join("Game.log")).await.unwrap_err();
        assert!(matches!(err, GameLogError::NotFound(_)));
        assert!(!tailer.is_running().await);
        assert_eq!(tailer.phase(), TailPhase::Idle);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let tailer = LogTailer::new(TailerConfig::default(), Sinks::default());
        tailer.start(tmp.path()).await.unwrap();
        assert!(matches!(
            tailer.start(tmp.path()).await,
            Err(GameLogError::AlreadyRunning)
        ));
        tailer.stop().await;
        assert!(!tailer.is_running().await);
        assert_eq!(tailer.phase(), TailPhase::Stopped);
    }

    #[tokio::test]
    async fn backlog_is_silent_and_live_lines_report() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut backlog = lines::session_start("Bob");
        backlog.push(lines::kill("Alice", "z", "Bob", "laser"));
        write_lines(tmp.path(), &backlog);

        let recorder = Arc::new(Recorder::default());
        let tailer = tailer_with(&recorder);
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;

        assert_eq!(recorder.kill_count(), 0);
        assert_eq!(tailer.snapshot().totals().kills, 1);

        write_lines(tmp.path(), &[lines::kill("Carol", "z", "Bob", "laser")]);
        wait_until(|| recorder.kill_count() == 1).await;
        assert_eq!(recorder.sounds.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.kills.lock().unwrap()[0].victim, "Carol");
        assert_eq!(tailer.snapshot().totals().kills, 2);

        tailer.stop().await;
    }

    #[tokio::test]
    async fn truncation_reopens_from_start() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut backlog = lines::session_start("Bob");
        backlog.extend(std::iter::repeat_n(lines::game_mode("EA_Elimination"), 5));
        write_lines(tmp.path(), &backlog);

        let recorder = Arc::new(Recorder::default());
        let tailer = tailer_with(&recorder);
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;

        std::fs::write(
            tmp.path(),
            format!("{}\n", lines::kill("Alice", "z", "Bob", "laser")),
        )
        .unwrap();
        wait_until(|| recorder.kill_count() == 1).await;
        assert_eq!(tailer.phase(), TailPhase::Following);

        tailer.stop().await;
    }

    #[tokio::test]
    async fn partial_line_waits_for_newline() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_lines(tmp.path(), &lines::session_start("Bob"));

        let recorder = Arc::new(Recorder::default());
        let tailer = tailer_with(&recorder);
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;

        let line = lines::kill("Alice", "z", "Bob", "laser");
        let (head, tail) = line.split_at(40);
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(tmp.path()).unwrap();
            write!(file, "{head}").unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.kill_count(), 0);

        {
            let mut file = std::fs::OpenOptions::new().append(true).open(tmp.path()).unwrap();
            writeln!(file, "{tail}").unwrap();
        }
        wait_until(|| recorder.kill_count() == 1).await;
        assert_eq!(recorder.kills.lock().unwrap()[0].victim, "Alice");

        tailer.stop().await;
    }

    #[tokio::test]
    async fn restart_resumes_without_replay() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut backlog = lines::session_start("Bob");
        backlog.push(lines::kill("Alice", "z", "Bob", "laser"));
        write_lines(tmp.path(), &backlog);

        let recorder = Arc::new(Recorder::default());
        let tailer = tailer_with(&recorder);
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;
        tailer.stop().await;

        let resume = tailer.resume_point().await.unwrap();
        assert_eq!(resume.offset, std::fs::metadata(tmp.path()).unwrap().len());

        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;
        assert_eq!(tailer.snapshot().totals().kills, 1);

        write_lines(tmp.path(), &[lines::kill("Dave", "z", "Bob", "laser")]);
        wait_until(|| recorder.kill_count() == 1).await;
        assert_eq!(tailer.snapshot().totals().kills, 2);

        tailer.stop().await;
    }

    #[tokio::test]
    async fn subscribers_see_state_changes() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_lines(tmp.path(), &lines::session_start("Bob"));

        let tailer = tailer_with(&Arc::new(Recorder::default()));
        let mut rx = tailer.subscribe();
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;

        write_lines(tmp.path(), &[lines::zone_entry("Bob", "MISC_Prospector_12")]);
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.active_vehicle().label() == "MISC_Prospector"),
        )
        .await
        .unwrap()
        .unwrap();

        tailer.stop().await;
    }

    #[test]
    fn line_reader_handles_invalid_utf8() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"ok\n\xff\xfebroken\r\nrest").unwrap();
        let file = File::open(tmp.path()).unwrap();
        let mut reader = LineReader::new(file, 0);

        assert_eq!(reader.next_line().unwrap().as_deref(), Some("ok"));
        let second = reader.next_line().unwrap().unwrap();
        assert!(second.ends_with("broken"));
        assert_eq!(reader.next_line().unwrap(), None);
        assert_eq!(reader.offset, 13);
        assert_eq!(reader.position, 17);
    }

    #[test]
    fn reopen_continues_after_last_complete_line() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"first\nsec").unwrap();
        let mut reader = LineReader::new(File::open(tmp.path()).unwrap(), 0);
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("first"));
        assert_eq!(reader.next_line().unwrap(), None);
        assert_eq!(reader.position, 9);

        tmp.write_all(b"ond\n").unwrap();
        reader.reopen(tmp.path()).unwrap();
        assert_eq!(reader.position, 6);
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("second"));
        assert_eq!(reader.offset, 13);
    }

    #[test]
    fn reopen_of_vanished_file_keeps_position() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Game.log");
        std::fs::write(&path, "line\n").unwrap();
        let mut reader = LineReader::new(File::open(&path).unwrap(), 0);
        assert!(reader.next_line().unwrap().is_some());

        std::fs::remove_file(&path).unwrap();
        assert!(reader.reopen(&path).is_err());
        assert_eq!(reader.offset, 5);
    }

    #[tokio::test]
    async fn resume_past_end_of_shrunk_file_replays_it() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut backlog = lines::session_start("Bob");
        backlog.push(lines::kill("Alice", "z", "Bob", "laser"));
        backlog.push(lines::kill("Carol", "z", "Bob", "laser"));
        write_lines(tmp.path(), &backlog);

        let recorder = Arc::new(Recorder::default());
        let tailer = tailer_with(&recorder);
        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;
        tailer.stop().await;
        let resume = tailer.resume_point().await.unwrap();

        // A new game session rewrites the log shorter than the old one.
        std::fs::write(
            tmp.path(),
            format!("{}\n", lines::kill("Dave", "z", "Bob", "laser")),
        )
        .unwrap();
        assert!(std::fs::metadata(tmp.path()).unwrap().len() < resume.offset);

        tailer.start(tmp.path()).await.unwrap();
        wait_until(|| tailer.phase() == TailPhase::Following).await;
        // The whole file is replayed as backlog: counted, not reported.
        assert_eq!(tailer.snapshot().totals().kills, 3);
        assert_eq!(recorder.kill_count(), 0);

        tailer.stop().await;
        let resume = tailer.resume_point().await.unwrap();
        assert_eq!(resume.offset, std::fs::metadata(tmp.path()).unwrap().len());
    }
}
