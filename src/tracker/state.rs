use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Unfocused signals must persist this long before the tracker commits to
/// `Unfocused`; shorter blips stay in `Checking`.
const UNFOCUS_DEBOUNCE: Duration = Duration::from_millis(3000);

const BADGE_FOCUSED_SECS: f64 = 3600.0;
const BADGE_SCORE: f64 = 80.0;

/// Per-frame detection signals handed in by the external vision pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalFrame {
    pub face_detected: bool,
    pub device_detected: bool,
    pub study_object_detected: bool,
    pub eyes_down: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FocusStatus {
    #[serde(rename = "FOCUSED")]
    Focused,
    #[serde(rename = "CHECKING...")]
    Checking,
    #[serde(rename = "UNFOCUSED")]
    Unfocused,
    #[serde(rename = "INACTIVE")]
    Inactive,
}

impl FocusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusStatus::Focused => "FOCUSED",
            FocusStatus::Checking => "CHECKING...",
            FocusStatus::Unfocused => "UNFOCUSED",
            FocusStatus::Inactive => "INACTIVE",
        }
    }
}

impl Default for FocusStatus {
    fn default() -> Self {
        FocusStatus::Inactive
    }
}

/// Result of one tracker tick. `alert` is set on the first tick of a confirmed
/// distraction episode; the feed worker maps it to the audible chime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub status: FocusStatus,
    pub alert: bool,
}

/// Snapshot of the cumulative session statistics, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrackerStats {
    pub total: f64,
    pub focused: f64,
    pub unfocused: f64,
    /// Percentage of tracked time spent focused, 0 when nothing tracked yet.
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Badge {
    OneHourNoDistraction,
    FocusedLearner,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::OneHourNoDistraction => "1 Hour No Distraction",
            Badge::FocusedLearner => "Focused Learner",
        }
    }
}

/// Debounced focus classifier.
///
/// Consumes one [`SignalFrame`] per video frame plus the caller's monotonic
/// `now`, and turns the noisy per-frame booleans into a stable session-level
/// status. Time is injected so the machine is deterministic under test; it
/// performs no I/O and no side effects.
#[derive(Debug, Clone)]
pub struct FocusTracker {
    unfocused_since: Option<Instant>,
    last_state: FocusStatus,
    focused: Duration,
    unfocused: Duration,
    last_update: Instant,
}

impl FocusTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            unfocused_since: None,
            last_state: FocusStatus::Focused,
            focused: Duration::ZERO,
            unfocused: Duration::ZERO,
            last_update: now,
        }
    }

    /// Process one tick. Every tick's delta lands in exactly one of the two
    /// accumulators, so `focused + unfocused` always equals elapsed time.
    pub fn update(&mut self, frame: SignalFrame, now: Instant) -> TickOutcome {
        // saturating: a now earlier than the previous tick must not corrupt totals
        let delta = now.saturating_duration_since(self.last_update);
        self.last_update = now;

        let unfocused = !frame.face_detected
            || (frame.device_detected && !frame.study_object_detected && !frame.eyes_down);

        if !unfocused {
            self.unfocused_since = None;
            self.focused += delta;
            self.last_state = FocusStatus::Focused;
            return TickOutcome {
                status: FocusStatus::Focused,
                alert: false,
            };
        }

        // Distraction accrues from the first unfocused tick, debounce window included.
        self.unfocused += delta;

        let since = *self.unfocused_since.get_or_insert(now);
        if now.saturating_duration_since(since) < UNFOCUS_DEBOUNCE {
            return TickOutcome {
                status: FocusStatus::Checking,
                alert: false,
            };
        }

        // One alert per continuous episode.
        let alert = self.last_state != FocusStatus::Unfocused;
        self.last_state = FocusStatus::Unfocused;
        TickOutcome {
            status: FocusStatus::Unfocused,
            alert,
        }
    }

    pub fn stats(&self) -> TrackerStats {
        let focused = self.focused.as_secs_f64();
        let unfocused = self.unfocused.as_secs_f64();
        let total = focused + unfocused;
        let score = if total > 0.0 {
            focused / total * 100.0
        } else {
            0.0
        };
        TrackerStats {
            total,
            focused,
            unfocused,
            score,
        }
    }

    pub fn badge(&self) -> Option<Badge> {
        if self.focused.as_secs_f64() >= BADGE_FOCUSED_SECS {
            Some(Badge::OneHourNoDistraction)
        } else if self.stats().score >= BADGE_SCORE {
            Some(Badge::FocusedLearner)
        } else {
            None
        }
    }
}
