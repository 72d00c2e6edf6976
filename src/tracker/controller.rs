use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use log::{error, info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    alert::AlertEngine, models::SessionRecord, settings::SettingsStore, store::UserStore,
};

use super::state::{Badge, FocusStatus, FocusTracker, SignalFrame, TrackerStats};
use super::worker::signal_loop;

const FRAME_CHANNEL_CAPACITY: usize = 64;

struct FeedHandle {
    cancel_token: CancellationToken,
    join: JoinHandle<()>,
}

/// Session aggregator: brackets one tracking interval at a time.
///
/// Owns the tracker instance for the active session (a fresh one per start),
/// the feed worker driving it, and the finalization of [`SessionRecord`]s.
/// One session per process; stat reads are short lock-and-clone snapshots that
/// never see a half-applied tick.
#[derive(Clone)]
pub struct SessionController {
    tracker: Arc<Mutex<FocusTracker>>,
    started_at: Arc<Mutex<Option<DateTime<Utc>>>>,
    active: Arc<AtomicBool>,
    feed: Arc<Mutex<Option<FeedHandle>>>,
    status_tx: watch::Sender<FocusStatus>,
    status_rx: watch::Receiver<FocusStatus>,
    alert: AlertEngine,
    store: UserStore,
    settings: Arc<SettingsStore>,
}

impl SessionController {
    pub fn new(store: UserStore, settings: Arc<SettingsStore>) -> Self {
        let (status_tx, status_rx) = watch::channel(FocusStatus::Inactive);
        Self {
            tracker: Arc::new(Mutex::new(FocusTracker::new(Instant::now()))),
            started_at: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicBool::new(false)),
            feed: Arc::new(Mutex::new(None)),
            status_tx,
            status_rx,
            alert: AlertEngine::new(),
            store,
            settings,
        }
    }

    /// Begin a session: discard prior stats, spawn the feed worker, and hand
    /// back the sender the external signal source pushes frames into.
    /// Starting over an active session resets it rather than failing.
    pub async fn start_session(&self) -> mpsc::Sender<SignalFrame> {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("session already active, restarting with fresh stats");
        }
        self.stop_feed().await;

        *self.tracker.lock().await = FocusTracker::new(Instant::now());
        *self.started_at.lock().await = Some(Utc::now());

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let join = tokio::spawn(signal_loop(
            frame_rx,
            self.tracker.clone(),
            self.alert.clone(),
            self.settings.tracker().alert_enabled,
            self.status_tx.clone(),
            cancel_token.clone(),
        ));
        *self.feed.lock().await = Some(FeedHandle { cancel_token, join });

        // The machine starts out focused; subscribers see per-tick statuses
        // as soon as frames arrive.
        let _ = self.status_tx.send(FocusStatus::Focused);
        info!("tracking session started");
        frame_tx
    }

    /// End the session and materialize its record. Never fails: persistence
    /// is best-effort, and stopping without (or after) a start yields a
    /// zeroed or stale record.
    pub async fn stop_session(&self, user: Option<&str>) -> SessionRecord {
        self.active.store(false, Ordering::SeqCst);
        self.stop_feed().await;

        let stats = self.tracker.lock().await.stats();
        let end_ts = Utc::now();
        let started_at = *self.started_at.lock().await;

        // Reconstruct the window from tracked time when there is any; the
        // recorded start drifts if the first frame arrived late.
        let start_ts = if stats.total > 0.0 {
            end_ts - chrono::Duration::milliseconds((stats.total * 1000.0).round() as i64)
        } else {
            started_at.unwrap_or(end_ts)
        };

        let record = SessionRecord {
            start_ts,
            end_ts,
            total_seconds: round2(stats.total),
            focused_seconds: round2(stats.focused),
            unfocused_seconds: round2(stats.unfocused),
            score: stats.score as i32,
            start_str: format_local(start_ts),
            end_str: format_local(end_ts),
        };

        if let Some(email) = user {
            let limit = self.settings.tracker().history_limit;
            if let Err(err) = self.store.append_session(email, &record, limit).await {
                // The caller still gets the record when the store is down.
                error!("failed to persist session for {email}: {err:#}");
            }
        }

        let _ = self.status_tx.send(FocusStatus::Inactive);
        info!(
            "tracking session stopped ({}s tracked, score {})",
            record.total_seconds, record.score
        );
        record
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> TrackerStats {
        self.tracker.lock().await.stats()
    }

    pub async fn badge(&self) -> Option<Badge> {
        self.tracker.lock().await.badge()
    }

    pub fn subscribe(&self) -> watch::Receiver<FocusStatus> {
        self.status_rx.clone()
    }

    async fn stop_feed(&self) {
        if let Some(handle) = self.feed.lock().await.take() {
            handle.cancel_token.cancel();
            if let Err(err) = handle.join.await {
                error!("feed task failed to join: {err}");
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
