//! Application orchestrator: wires the tailer to its collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use killtrack_game_log::{LogTailer, Sinks, SoundCue, TailerConfig};
use killtrack_reporter::{
    ApiClient, Credentials, KillBuffer, ReportApi, ReportQueue, ReportWorker, run_heartbeat,
};
use killtrack_sound::{SoundBoard, sync_bundled_sounds};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::monitor::{Monitor, SysinfoProbe};
use crate::view::LogView;

/// Runs the tracker until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // -- Report service --
    let api: Arc<dyn ReportApi> = Arc::new(ApiClient::new(config.api())?);
    let credentials = Arc::new(Credentials::new(config.api_key.clone()));
    tracing::info!(key = %credentials.state(), url = %config.api_url, "report service");

    let buffer = load_buffer(&config);
    let commander = Arc::new(AtomicBool::new(false));
    let (queue, queue_rx) = ReportQueue::new(config.outbound_queue_capacity);
    let worker = ReportWorker::new(
        Arc::clone(&api),
        Arc::clone(&credentials),
        buffer,
        Arc::clone(&commander),
    )
    .with_retry_interval(config.retry_interval());
    let worker_task = tokio::spawn(worker.run(queue_rx, cancel.clone()));

    // -- Sounds --
    let sound = sound_board(&config);

    // -- Tailer --
    let tailer = Arc::new(LogTailer::new(
        TailerConfig {
            poll_interval: config.poll_interval(),
            anonymize: config.anonymize,
        },
        Sinks {
            reporter: Arc::new(queue),
            sound,
            view: Arc::new(LogView::new()),
        },
    ));

    // -- Commander heartbeat --
    if config.commander_heartbeat {
        tokio::spawn(commander_loop(
            Arc::clone(&api),
            Arc::clone(&credentials),
            Arc::clone(&tailer),
            Arc::clone(&commander),
            config.heartbeat_interval(),
            cancel.clone(),
        ));
    }

    // -- Process monitor --
    let monitor_cancel = cancel.child_token();
    let monitor = Monitor::new(
        SysinfoProbe::new(),
        config.process_name.clone(),
        config.log_path.clone(),
        config.monitor_interval(),
        Arc::clone(&tailer),
        Arc::clone(&api),
        Arc::clone(&credentials),
    );
    let monitor_task = tokio::spawn(monitor.run(monitor_cancel.clone()));

    tracing::info!("tracker ready");

    // -- Main loop: wait for shutdown --
    let auto_shutdown = config.auto_shutdown();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = async {
            match auto_shutdown {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        } => {
            tracing::info!(hours = config.auto_shutdown_hours, "auto shutdown");
        }
    }

    // -- Graceful shutdown --
    // The tailer stops first so nothing it reports is lost behind the worker.
    tracing::info!("stopping services...");
    monitor_cancel.cancel();
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "monitor task failed");
    }
    tailer.stop().await;
    cancel.cancel();

    let buffer = worker_task.await?;
    if !buffer.is_empty() {
        tracing::info!(
            count = buffer.len(),
            path = %config.buffer_path.display(),
            "unsent kills kept for next run"
        );
    }

    let session = tailer.snapshot();
    tracing::info!(
        kills = session.totals().kills,
        deaths = session.totals().deaths,
        max_streak = session.kill_streak().max,
        "session ended"
    );
    Ok(())
}

fn load_buffer(config: &Config) -> KillBuffer {
    match KillBuffer::load(config.buffer_path.clone(), config.buffer_capacity) {
        Ok(buffer) => buffer,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %config.buffer_path.display(),
                "unreadable kill buffer, starting empty"
            );
            KillBuffer::new(Some(config.buffer_path.clone()), config.buffer_capacity)
        }
    }
}

fn sound_board(config: &Config) -> Arc<dyn SoundCue> {
    if let Some(bundled) = &config.bundled_sounds_dir {
        if let Err(e) = sync_bundled_sounds(bundled, &config.sounds_dir) {
            tracing::warn!(error = %e, "failed to install bundled sounds");
        }
    }
    Arc::new(SoundBoard::new(config.sounds_dir.clone(), config.volume))
}

/// Keeps the heartbeat running whenever the key is usable, restarting it
/// after a key validation brings commander mode back.
async fn commander_loop(
    api: Arc<dyn ReportApi>,
    credentials: Arc<Credentials>,
    tailer: Arc<LogTailer>,
    active: Arc<AtomicBool>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        if !active.load(Ordering::SeqCst) && credentials.usable_key().is_some() {
            tokio::spawn(run_heartbeat(
                Arc::clone(&api),
                Arc::clone(&credentials),
                tailer.subscribe(),
                Arc::clone(&active),
                interval,
                cancel.clone(),
            ));
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
