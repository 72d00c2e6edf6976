use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one finished tracking session. Immutable once built.
///
/// `start_str`/`end_str` carry the local-time rendering used by the calendar
/// view; the calendar summarizer parses them back rather than the UTC fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub total_seconds: f64,
    pub focused_seconds: f64,
    pub unfocused_seconds: f64,
    pub score: i32,
    pub start_str: String,
    pub end_str: String,
}
