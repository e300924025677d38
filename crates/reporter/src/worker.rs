//! Outbound queue between the tailer and the report service.
//!
//! The tailer only ever calls [`ReportQueue`], which never blocks. A
//! [`ReportWorker`] task drains the queue, posts to the service, and keeps
//! kills it could not deliver in the [`KillBuffer`] for a later retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use killtrack_game_log::KillReporter;
use killtrack_protocol::constants::REPORT_KILL_PATH;
use killtrack_protocol::{BufferedKill, Heartbeat, KillReport, PlayerStatus};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ReportApi;
use crate::buffer::KillBuffer;
use crate::credentials::Credentials;

/// Default capacity of the outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default interval between retries of buffered kills.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Something the tailer wants sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Kill(KillReport),
    Status {
        player: String,
        zone: String,
        status: PlayerStatus,
    },
}

/// Non-blocking handle onto the outbound queue.
#[derive(Debug, Clone)]
pub struct ReportQueue {
    tx: mpsc::Sender<Outbound>,
}

impl ReportQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn enqueue(&self, item: Outbound) {
        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => {
                warn!(item = ?item, "outbound queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("report worker gone, dropping event");
            }
        }
    }
}

impl KillReporter for ReportQueue {
    fn post_kill_event(&self, report: KillReport) {
        self.enqueue(Outbound::Kill(report));
    }

    fn post_status_event(&self, player: &str, zone: &str, status: PlayerStatus) {
        self.enqueue(Outbound::Status {
            player: player.to_string(),
            zone: zone.to_string(),
            status,
        });
    }
}

/// Drains the outbound queue.
pub struct ReportWorker {
    api: Arc<dyn ReportApi>,
    credentials: Arc<Credentials>,
    buffer: KillBuffer,
    /// Status events are only sent while commander mode is on.
    commander: Arc<AtomicBool>,
    retry_interval: Duration,
}

impl ReportWorker {
    pub fn new(
        api: Arc<dyn ReportApi>,
        credentials: Arc<Credentials>,
        buffer: KillBuffer,
        commander: Arc<AtomicBool>,
    ) -> Self {
        Self {
            api,
            credentials,
            buffer,
            commander,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Runs until cancelled or every queue handle is dropped, then returns
    /// the buffer of undelivered kills, already persisted.
    ///
    /// Buffered kills are retried one at a time, so new kills and
    /// cancellation are still served while a backlog drains.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<Outbound>,
        cancel: CancellationToken,
    ) -> KillBuffer {
        if !self.buffer.is_empty() {
            info!(count = self.buffer.len(), "unsent kills waiting for delivery");
        }

        let mut retry = tokio::time::interval_at(
            tokio::time::Instant::now() + self.retry_interval,
            self.retry_interval,
        );
        retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut draining = false;
        let mut delivered = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => self.handle(item).await,
                    None => break,
                },
                _ = retry.tick(), if !draining => {
                    draining = !self.buffer.is_empty() && self.credentials.usable_key().is_some();
                }
                _ = std::future::ready(()), if draining => {
                    match self.retry_one(&cancel).await {
                        Some(more) => {
                            delivered += 1;
                            draining = more;
                        }
                        None => draining = false,
                    }
                    if !draining && delivered > 0 {
                        info!(delivered, remaining = self.buffer.len(), "delivered buffered kills");
                        delivered = 0;
                    }
                }
            }
        }

        // Whatever is still queued is kept, not sent.
        rx.close();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Kill(report) = item {
                self.buffer_kill(report);
            }
        }
        self.persist();
        debug!(unsent = self.buffer.len(), "report worker stopped");
        self.buffer
    }

    async fn handle(&mut self, item: Outbound) {
        match item {
            Outbound::Kill(report) => self.report_kill(report).await,
            Outbound::Status {
                player,
                zone,
                status,
            } => self.post_status(player, zone, status).await,
        }
    }

    async fn report_kill(&mut self, report: KillReport) {
        let Some(key) = self.credentials.usable_key() else {
            warn!(victim = %report.victim, "no valid key, kill kept for later");
            self.buffer_kill(report);
            return;
        };
        match self.api.post_kill(&key, &report).await {
            Ok(()) => info!(victim = %report.victim, "kill reported"),
            Err(e) => {
                warn!(victim = %report.victim, error = %e, "failed to report kill, kept for later");
                self.buffer_kill(report);
            }
        }
    }

    /// At most once: failures are logged and dropped.
    async fn post_status(&self, player: String, zone: String, status: PlayerStatus) {
        if !self.commander.load(Ordering::Relaxed) {
            return;
        }
        let Some(key) = self.credentials.usable_key() else {
            return;
        };
        let heartbeat = Heartbeat::new(player, zone, status);
        match self.api.post_heartbeat(&key, &heartbeat).await {
            Ok(_) => debug!(status = %status, zone = %heartbeat.zone, "status sent"),
            Err(e) => warn!(status = %status, error = %e, "failed to send status"),
        }
    }

    /// Sends the oldest buffered kill. `Some(more)` when it was delivered,
    /// `None` when it failed or the worker is stopping.
    async fn retry_one(&mut self, cancel: &CancellationToken) -> Option<bool> {
        let key = self.credentials.usable_key()?;
        let front = self.buffer.front()?;
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = self.api.post_kill(&key, &front.kill_result) => result,
        };
        match result {
            Ok(()) => {
                self.buffer.pop_front();
                self.persist();
                Some(!self.buffer.is_empty())
            }
            Err(e) => {
                debug!(error = %e, "retry of buffered kill failed");
                None
            }
        }
    }

    fn buffer_kill(&mut self, report: KillReport) {
        let evicted = self.buffer.push(BufferedKill {
            kill_result: report,
            endpoint: REPORT_KILL_PATH.to_string(),
        });
        if let Some(old) = evicted {
            warn!(victim = %old.kill_result.victim, "kill buffer full, dropped oldest kill");
        }
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.buffer.persist() {
            warn!(error = %e, "failed to persist unsent kills");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use killtrack_protocol::{AnonymizeState, HeartbeatResponse};

    use crate::api::BoxFuture;
    use crate::credentials::KeyState;
    use crate::error::ReportError;

    #[derive(Default)]
    struct MockApi {
        kills: Mutex<Vec<KillReport>>,
        heartbeats: Mutex<Vec<Heartbeat>>,
        fail: AtomicBool,
        /// Simulated round trip for kill posts.
        delay: Mutex<Duration>,
    }

    impl ReportApi for MockApi {
        fn validate_key<'a>(
            &'a self,
            _key: &'a str,
            _player: &'a str,
        ) -> BoxFuture<'a, Result<KeyState, ReportError>> {
            Box::pin(async { Ok(KeyState::Valid { expires_at: None }) })
        }

        fn post_kill<'a>(
            &'a self,
            _key: &'a str,
            report: &'a KillReport,
        ) -> BoxFuture<'a, Result<(), ReportError>> {
            let delay = *self.delay.lock().unwrap();
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if self.fail.load(Ordering::SeqCst) {
                    return Err(ReportError::Status {
                        status: 503,
                        body: String::new(),
                    });
                }
                self.kills.lock().unwrap().push(report.clone());
                Ok(())
            })
        }

        fn post_heartbeat<'a>(
            &'a self,
            _key: &'a str,
            heartbeat: &'a Heartbeat,
        ) -> BoxFuture<'a, Result<HeartbeatResponse, ReportError>> {
            Box::pin(async move {
                self.heartbeats.lock().unwrap().push(heartbeat.clone());
                Ok(HeartbeatResponse::default())
            })
        }
    }

    fn report(victim: &str) -> KillReport {
        KillReport {
            player: "Bob".into(),
            victim: victim.into(),
            time: "t".into(),
            zone: "z".into(),
            weapon: "w".into(),
            rsi_profile: killtrack_protocol::citizen_profile_url(victim),
            game_mode: "EA_Elimination".into(),
            client_ver: "7.0".into(),
            killers_ship: "N/A".into(),
            anonymize_state: AnonymizeState::default(),
        }
    }

    fn valid_credentials() -> Arc<Credentials> {
        let creds = Credentials::new("key");
        creds.set_state(KeyState::Valid { expires_at: None });
        Arc::new(creds)
    }

    fn worker(api: &Arc<MockApi>, creds: Arc<Credentials>, commander: bool) -> ReportWorker {
        ReportWorker::new(
            api.clone(),
            creds,
            KillBuffer::new(None, 10),
            Arc::new(AtomicBool::new(commander)),
        )
    }

    /// Queues `items`, closes the queue and runs the worker to completion.
    async fn drain(worker: ReportWorker, items: Vec<Outbound>) -> KillBuffer {
        let (queue, rx) = ReportQueue::new(16);
        for item in items {
            match item {
                Outbound::Kill(r) => queue.post_kill_event(r),
                Outbound::Status {
                    player,
                    zone,
                    status,
                } => queue.post_status_event(&player, &zone, status),
            }
        }
        drop(queue);
        worker.run(rx, CancellationToken::new()).await
    }

    #[tokio::test]
    async fn kill_posted_with_valid_key() {
        let api = Arc::new(MockApi::default());
        let buffer = drain(
            worker(&api, valid_credentials(), false),
            vec![Outbound::Kill(report("Alice"))],
        )
        .await;
        assert!(buffer.is_empty());
        assert_eq!(api.kills.lock().unwrap()[0].victim, "Alice");
    }

    #[tokio::test]
    async fn kill_buffered_without_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("unsent_kills.json");
        let api = Arc::new(MockApi::default());
        let worker = ReportWorker::new(
            api.clone(),
            Arc::new(Credentials::new("")),
            KillBuffer::new(Some(path.clone()), 10),
            Arc::new(AtomicBool::new(false)),
        );

        let buffer = drain(worker, vec![Outbound::Kill(report("Alice"))]).await;
        assert_eq!(buffer.len(), 1);
        assert!(api.kills.lock().unwrap().is_empty());

        let reloaded = KillBuffer::load(path, 10).unwrap();
        assert_eq!(reloaded.front().unwrap().endpoint, "/reportKill");
    }

    #[tokio::test]
    async fn failed_post_is_buffered() {
        let api = Arc::new(MockApi::default());
        api.fail.store(true, Ordering::SeqCst);
        let buffer = drain(
            worker(&api, valid_credentials(), false),
            vec![Outbound::Kill(report("Alice"))],
        )
        .await;
        assert_eq!(buffer.front().unwrap().kill_result.victim, "Alice");
    }

    #[tokio::test]
    async fn status_only_in_commander_mode() {
        let status = Outbound::Status {
            player: "Bob".into(),
            zone: "AEGS_Gladius".into(),
            status: PlayerStatus::Alive,
        };

        let api = Arc::new(MockApi::default());
        drain(worker(&api, valid_credentials(), false), vec![status.clone()]).await;
        assert!(api.heartbeats.lock().unwrap().is_empty());

        drain(worker(&api, valid_credentials(), true), vec![status]).await;
        let heartbeats = api.heartbeats.lock().unwrap();
        assert_eq!(heartbeats.len(), 1);
        assert_eq!(heartbeats[0].zone, "AEGS_Gladius");
        assert!(heartbeats[0].is_heartbeat);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delivers_buffered_kills() {
        let api = Arc::new(MockApi::default());
        let creds = Arc::new(Credentials::new("key"));
        let mut buffer = KillBuffer::new(None, 10);
        for v in ["a", "b"] {
            buffer.push(BufferedKill {
                kill_result: report(v),
                endpoint: REPORT_KILL_PATH.into(),
            });
        }
        let worker = ReportWorker::new(
            api.clone(),
            creds.clone(),
            buffer,
            Arc::new(AtomicBool::new(false)),
        )
        .with_retry_interval(Duration::from_secs(60));

        let (_queue, rx) = ReportQueue::new(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(rx, cancel.clone()));

        // Not usable yet: the first retry leaves the buffer alone.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(api.kills.lock().unwrap().is_empty());

        creds.set_state(KeyState::Valid { expires_at: None });
        tokio::time::sleep(Duration::from_secs(60)).await;

        cancel.cancel();
        let buffer = handle.await.unwrap();
        assert!(buffer.is_empty());
        let victims: Vec<_> = api.kills.lock().unwrap().iter().map(|k| k.victim.clone()).collect();
        assert_eq!(victims, ["a", "b"]);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (queue, mut rx) = ReportQueue::new(1);
        queue.post_kill_event(report("a"));
        queue.post_kill_event(report("b"));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Kill(report("a")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_keeps_queued_kills() {
        let api = Arc::new(MockApi::default());
        let (queue, rx) = ReportQueue::new(4);
        queue.post_kill_event(report("a"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let buffer = worker(&api, valid_credentials(), false).run(rx, cancel).await;
        assert!(api.kills.lock().unwrap().is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_kills_and_cancel_served_while_backlog_drains() {
        let api = Arc::new(MockApi::default());
        *api.delay.lock().unwrap() = Duration::from_secs(10);
        let mut buffer = KillBuffer::new(None, 10);
        for v in ["a", "b", "c"] {
            buffer.push(BufferedKill {
                kill_result: report(v),
                endpoint: REPORT_KILL_PATH.into(),
            });
        }
        let worker = ReportWorker::new(
            api.clone(),
            valid_credentials(),
            buffer,
            Arc::new(AtomicBool::new(false)),
        )
        .with_retry_interval(Duration::from_secs(60));

        let (queue, rx) = ReportQueue::new(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(rx, cancel.clone()));

        // Retry starts at 60s; "a" is in flight until 70s.
        tokio::time::sleep(Duration::from_secs(61)).await;
        queue.post_kill_event(report("live"));

        // "live" goes out between "a" and "b"; "b" is in flight at 85s.
        tokio::time::sleep(Duration::from_secs(24)).await;
        cancel.cancel();
        let buffer = handle.await.unwrap();

        let victims: Vec<_> = api.kills.lock().unwrap().iter().map(|k| k.victim.clone()).collect();
        assert_eq!(victims, ["a", "live"]);
        let left: Vec<_> = buffer.iter().map(|k| k.kill_result.victim.clone()).collect();
        assert_eq!(left, ["b", "c"]);
    }
}
