use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionRecord;

/// A registered user and their bounded session history.
///
/// Created by signup, mutated only by session-stop appends. `email` is the
/// unique key; `password_hash` is opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    /// Chronological, oldest first, bounded to the configured history limit.
    pub sessions: Vec<SessionRecord>,
}
