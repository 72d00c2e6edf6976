//! Calendar and profile summaries over a user's session history.
//!
//! Everything here is a pure function over `SessionRecord` slices; the records
//! are bucketed by the local-time `start_str` the session stop wrote, so the
//! calendar matches what the user saw on the clock.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDateTime};
use log::debug;
use serde::Serialize;

use crate::models::SessionRecord;

/// A day counts as focused when its best session score reaches this.
const FOCUS_DAY_THRESHOLD: i32 = 70;

const START_STR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-day view of one calendar month, keyed by day-of-month (1..31).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MonthSummary {
    /// Best score seen on each day that had at least one session.
    pub day_scores: BTreeMap<u32, i32>,
    pub focused_days: BTreeSet<u32>,
    /// Days that begin a new consecutive run of focused days.
    pub streak_start: BTreeSet<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct ProfileStats {
    pub total_sessions: usize,
    pub total_focused_seconds: f64,
    pub avg_score: i32,
}

/// Build the calendar view for one month. Records whose `start_str` does not
/// parse are skipped; a corrupt row must not take down the whole summary.
pub fn summarize_month(sessions: &[SessionRecord], year: i32, month: u32) -> MonthSummary {
    let mut day_scores: BTreeMap<u32, i32> = BTreeMap::new();

    for record in sessions {
        let started = match NaiveDateTime::parse_from_str(&record.start_str, START_STR_FORMAT) {
            Ok(dt) => dt,
            Err(err) => {
                debug!(
                    "skipping session with unparsable start_str {:?}: {err}",
                    record.start_str
                );
                continue;
            }
        };

        if started.year() != year || started.month() != month {
            continue;
        }

        let day = started.day();
        let best = day_scores.entry(day).or_insert(record.score);
        *best = (*best).max(record.score);
    }

    let focused_days: BTreeSet<u32> = day_scores
        .iter()
        .filter(|(_, &score)| score >= FOCUS_DAY_THRESHOLD)
        .map(|(&day, _)| day)
        .collect();

    // A run starts wherever the numerically preceding day was not focused.
    // Streaks never cross month boundaries.
    let streak_start = focused_days
        .iter()
        .filter(|&&day| day == 1 || !focused_days.contains(&(day - 1)))
        .copied()
        .collect();

    MonthSummary {
        day_scores,
        focused_days,
        streak_start,
    }
}

pub fn profile_stats(sessions: &[SessionRecord]) -> ProfileStats {
    if sessions.is_empty() {
        return ProfileStats::default();
    }

    let total_focused_seconds = sessions.iter().map(|s| s.focused_seconds).sum();
    let score_sum: i64 = sessions.iter().map(|s| i64::from(s.score)).sum();
    let avg_score = (score_sum as f64 / sessions.len() as f64).round() as i32;

    ProfileStats {
        total_sessions: sessions.len(),
        total_focused_seconds,
        avg_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(start_str: &str, score: i32, focused_seconds: f64) -> SessionRecord {
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        SessionRecord {
            start_ts: ts,
            end_ts: ts,
            total_seconds: focused_seconds,
            focused_seconds,
            unfocused_seconds: 0.0,
            score,
            start_str: start_str.to_string(),
            end_str: start_str.to_string(),
        }
    }

    #[test]
    fn best_score_per_day_and_streaks() {
        let sessions = vec![
            record("2026-08-05 09:00:00", 60, 600.0),
            record("2026-08-05 14:00:00", 75, 900.0),
            record("2026-08-06 10:00:00", 60, 300.0),
            record("2026-08-07 11:00:00", 80, 1200.0),
        ];

        let summary = summarize_month(&sessions, 2026, 8);
        assert_eq!(summary.day_scores.get(&5), Some(&75));
        assert_eq!(summary.day_scores.get(&6), Some(&60));
        assert_eq!(summary.day_scores.get(&7), Some(&80));

        // Day 6 breaks the run, so day 7 starts a new one.
        assert_eq!(summary.focused_days, BTreeSet::from([5, 7]));
        assert_eq!(summary.streak_start, BTreeSet::from([5, 7]));
    }

    #[test]
    fn consecutive_focused_days_share_one_start() {
        let sessions = vec![
            record("2026-08-10 09:00:00", 90, 600.0),
            record("2026-08-11 09:00:00", 72, 600.0),
            record("2026-08-12 09:00:00", 85, 600.0),
        ];

        let summary = summarize_month(&sessions, 2026, 8);
        assert_eq!(summary.focused_days, BTreeSet::from([10, 11, 12]));
        assert_eq!(summary.streak_start, BTreeSet::from([10]));
    }

    #[test]
    fn day_one_can_start_a_streak() {
        let sessions = vec![record("2026-08-01 09:00:00", 95, 600.0)];
        let summary = summarize_month(&sessions, 2026, 8);
        assert_eq!(summary.streak_start, BTreeSet::from([1]));
    }

    #[test]
    fn other_months_and_garbage_are_skipped() {
        let sessions = vec![
            record("2026-07-30 09:00:00", 99, 600.0),
            record("not a timestamp", 99, 600.0),
            record("2026-08-03 09:00:00", 50, 600.0),
        ];

        let summary = summarize_month(&sessions, 2026, 8);
        assert_eq!(summary.day_scores.len(), 1);
        assert_eq!(summary.day_scores.get(&3), Some(&50));
        assert!(summary.focused_days.is_empty());
        assert!(summary.streak_start.is_empty());
    }

    #[test]
    fn profile_stats_average_rounds() {
        let sessions = vec![
            record("2026-08-01 09:00:00", 70, 100.0),
            record("2026-08-02 09:00:00", 75, 200.5),
        ];

        let stats = profile_stats(&sessions);
        assert_eq!(stats.total_sessions, 2);
        assert!((stats.total_focused_seconds - 300.5).abs() < 1e-9);
        assert_eq!(stats.avg_score, 73); // 72.5 rounds up
    }

    #[test]
    fn empty_history_is_all_zero() {
        let stats = profile_stats(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.total_focused_seconds, 0.0);
        assert_eq!(stats.avg_score, 0);
    }
}
