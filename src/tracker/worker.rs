use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::alert::AlertEngine;

use super::state::{FocusStatus, FocusTracker, SignalFrame};

/// Signal feed loop: the single producer driving the tracker.
///
/// Consumes frames until the source closes or the controller cancels. Each
/// tick's status is published on the watch channel; a confirmed distraction
/// raises the chime here so the state machine stays side-effect free.
pub(super) async fn signal_loop(
    mut frames: mpsc::Receiver<SignalFrame>,
    tracker: Arc<Mutex<FocusTracker>>,
    alert: AlertEngine,
    alert_enabled: bool,
    status_tx: watch::Sender<FocusStatus>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    info!("signal source closed, feed loop shutting down");
                    break;
                };

                let outcome = tracker.lock().await.update(frame, Instant::now());

                if outcome.alert {
                    warn!("distraction confirmed");
                    if alert_enabled {
                        if let Err(err) = alert.chime() {
                            warn!("alert chime failed: {err}");
                        }
                    }
                }

                let _ = status_tx.send(outcome.status);
            }
            _ = cancel_token.cancelled() => {
                info!("feed loop cancelled");
                break;
            }
        }
    }
}
