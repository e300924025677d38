//! Commander-mode heartbeat loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use killtrack_game_log::SessionState;
use killtrack_protocol::{Heartbeat, PlayerStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ReportApi;
use crate::credentials::Credentials;

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Builds the heartbeat for a session snapshot: alive while in a vehicle,
/// dead on foot. `None` until the player handle is known.
pub fn heartbeat_for(state: &SessionState) -> Option<Heartbeat> {
    let player = state.player_handle()?;
    let vehicle = state.active_vehicle();
    let status = if vehicle.is_on_foot() {
        PlayerStatus::Dead
    } else {
        PlayerStatus::Alive
    };
    Some(Heartbeat::new(player, vehicle.label(), status))
}

/// Posts a heartbeat every `interval` until cancelled.
///
/// `active` is raised while the loop runs so status events go out alongside
/// heartbeats. The loop ends on its own once the key is no longer usable or
/// the service stops answering.
pub async fn run_heartbeat(
    api: Arc<dyn ReportApi>,
    credentials: Arc<Credentials>,
    session: watch::Receiver<SessionState>,
    active: Arc<AtomicBool>,
    interval: Duration,
    cancel: CancellationToken,
) {
    if active.swap(true, Ordering::SeqCst) {
        info!("commander heartbeat already running");
        return;
    }
    info!("commander heartbeat started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(key) = credentials.usable_key() else {
            warn!("no valid key, commander heartbeat stopped");
            break;
        };
        let Some(heartbeat) = heartbeat_for(&session.borrow()) else {
            debug!("player not identified yet, skipping heartbeat");
            continue;
        };

        match api.post_heartbeat(&key, &heartbeat).await {
            Ok(reply) => debug!(
                status = %heartbeat.status,
                zone = %heartbeat.zone,
                commanders = reply.commanders.len(),
                "heartbeat sent"
            ),
            Err(e) => {
                warn!(error = %e, "heartbeat failed, commander heartbeat stopped");
                break;
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    info!("commander heartbeat stopped");
}
