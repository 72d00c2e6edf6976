//! Read-only payloads for the status and profile views.
//!
//! Thin assembly over the controller, store, and history summarizer. These are
//! the data contracts a front end polls; nothing here mutates state.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{Datelike, Local};
use log::warn;
use serde::Serialize;

use crate::{history, models::SessionRecord, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub session_active: bool,
    pub total: f64,
    pub focused: f64,
    pub unfocused: f64,
    pub score: i32,
    pub last_session: Option<SessionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePayload {
    pub total_sessions: usize,
    pub total_focused_seconds: f64,
    pub avg_score: i32,
    pub day_scores: BTreeMap<u32, i32>,
    pub focused_days: BTreeSet<u32>,
    pub streak_start: BTreeSet<u32>,
}

/// Live session status plus the user's most recent record. A store failure
/// degrades to `last_session: null`; polling must keep working.
pub async fn status(state: &AppState, user: Option<&str>) -> StatusPayload {
    let stats = state.controller.stats().await;

    let last_session = match user {
        Some(email) => match state.store.last_session(email).await {
            Ok(last) => last,
            Err(err) => {
                warn!("failed to load last session for {email}: {err:#}");
                None
            }
        },
        None => None,
    };

    StatusPayload {
        session_active: state.controller.is_active(),
        total: stats.total,
        focused: stats.focused,
        unfocused: stats.unfocused,
        score: stats.score as i32,
        last_session,
    }
}

/// Calendar and aggregate stats for one month of a user's history.
pub async fn profile(
    state: &AppState,
    email: &str,
    year: i32,
    month: u32,
) -> Result<ProfilePayload> {
    let sessions = state.store.list_sessions(email).await?;
    let stats = history::profile_stats(&sessions);
    let summary = history::summarize_month(&sessions, year, month);

    Ok(ProfilePayload {
        total_sessions: stats.total_sessions,
        total_focused_seconds: stats.total_focused_seconds,
        avg_score: stats.avg_score,
        day_scores: summary.day_scores,
        focused_days: summary.focused_days,
        streak_start: summary.streak_start,
    })
}

pub async fn profile_current_month(state: &AppState, email: &str) -> Result<ProfilePayload> {
    let now = Local::now();
    profile(state, email, now.year(), now.month()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use crate::store::UserStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let store = UserStore::new(dir.path().join("focuswatch.sqlite3")).unwrap();
        let settings =
            Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        AppState::new(store, settings)
    }

    fn record(start_str: &str, score: i32) -> SessionRecord {
        let ts = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        SessionRecord {
            start_ts: ts,
            end_ts: ts,
            total_seconds: 600.0,
            focused_seconds: 480.0,
            unfocused_seconds: 120.0,
            score,
            start_str: start_str.to_string(),
            end_str: start_str.to_string(),
        }
    }

    #[tokio::test]
    async fn idle_status_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let payload = status(&state, None).await;
        assert!(!payload.session_active);
        assert_eq!(payload.total, 0.0);
        assert_eq!(payload.score, 0);
        assert!(payload.last_session.is_none());
    }

    #[tokio::test]
    async fn status_surfaces_last_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        state
            .store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();
        state
            .store
            .append_session("ada@example.com", &record("2026-08-05 09:00:00", 85), 20)
            .await
            .unwrap();

        let payload = status(&state, Some("ada@example.com")).await;
        assert_eq!(payload.last_session.unwrap().score, 85);
    }

    #[tokio::test]
    async fn profile_combines_stats_and_calendar() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        state
            .store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();
        for (start, score) in [
            ("2026-08-05 09:00:00", 75),
            ("2026-08-06 09:00:00", 60),
            ("2026-08-07 09:00:00", 80),
        ] {
            state
                .store
                .append_session("ada@example.com", &record(start, score), 20)
                .await
                .unwrap();
        }

        let payload = profile(&state, "ada@example.com", 2026, 8).await.unwrap();
        assert_eq!(payload.total_sessions, 3);
        assert_eq!(payload.avg_score, 72); // (75+60+80)/3 rounded
        assert_eq!(payload.focused_days, BTreeSet::from([5, 7]));
        assert_eq!(payload.streak_start, BTreeSet::from([5, 7]));
        assert_eq!(payload.day_scores.get(&6), Some(&60));
    }
}
