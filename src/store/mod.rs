//! File-backed user store.
//!
//! A single worker thread owns the SQLite connection; callers submit closures
//! over a command channel and await the reply. That serializes every
//! read-modify-write on a user's history, so concurrent session stops cannot
//! lose appends.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::oneshot;
use uuid::Uuid;

mod migrations;

use crate::models::{SessionRecord, UserRecord};
use migrations::run_migrations;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid {field} '{value}': {err}"))
}

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let start_ts: String = row.get("start_ts")?;
    let end_ts: String = row.get("end_ts")?;

    Ok(SessionRecord {
        start_ts: parse_datetime(&start_ts, "start_ts")?,
        end_ts: parse_datetime(&end_ts, "end_ts")?,
        total_seconds: row.get("total_seconds")?,
        focused_seconds: row.get("focused_seconds")?,
        unfocused_seconds: row.get("unfocused_seconds")?,
        score: row.get("score")?,
        start_str: row.get("start_str")?,
        end_str: row.get("end_str")?,
    })
}

#[derive(Clone)]
pub struct UserStore {
    inner: Arc<StoreInner>,
    db_path: Arc<PathBuf>,
}

impl UserStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("focuswatch-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        info!("User store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    /// Signup: register a new user. The email is the unique key; a second
    /// signup with the same address is rejected.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        let name = name.to_string();
        let email = email.to_string();
        let password_hash = password_hash.to_string();
        let created_at = Utc::now();

        self.execute(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT email FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                bail!("user {email} already exists");
            }

            conn.execute(
                "INSERT INTO users (email, name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, name, password_hash, created_at.to_rfc3339()],
            )
            .with_context(|| "failed to insert user")?;
            Ok(())
        })
        .await
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_string();
        self.execute(move |conn| {
            let user = conn
                .query_row(
                    "SELECT email, name, password_hash, created_at
                     FROM users
                     WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((email, name, password_hash, created_at)) = user else {
                return Ok(None);
            };

            let sessions = query_sessions(conn, &email)?;

            Ok(Some(UserRecord {
                name,
                email,
                password_hash,
                created_at: parse_datetime(&created_at, "created_at")?,
                sessions,
            }))
        })
        .await
    }

    /// Append one session to the user's history and evict the oldest entries
    /// beyond `limit`, in a single transaction.
    pub async fn append_session(
        &self,
        email: &str,
        record: &SessionRecord,
        limit: usize,
    ) -> Result<()> {
        let email = email.to_string();
        let record = record.clone();
        let limit = limit as i64;

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO sessions (id, user_email, start_ts, end_ts, total_seconds,
                                       focused_seconds, unfocused_seconds, score,
                                       start_str, end_str)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Uuid::new_v4().to_string(),
                    email,
                    record.start_ts.to_rfc3339(),
                    record.end_ts.to_rfc3339(),
                    record.total_seconds,
                    record.focused_seconds,
                    record.unfocused_seconds,
                    record.score,
                    record.start_str,
                    record.end_str,
                ],
            )
            .with_context(|| "failed to insert session record")?;

            tx.execute(
                "DELETE FROM sessions
                 WHERE user_email = ?1
                   AND rowid NOT IN (
                       SELECT rowid FROM sessions
                       WHERE user_email = ?1
                       ORDER BY rowid DESC
                       LIMIT ?2
                   )",
                params![email, limit],
            )
            .with_context(|| "failed to trim session history")?;

            tx.commit().context("failed to commit session append")?;
            Ok(())
        })
        .await
    }

    pub async fn list_sessions(&self, email: &str) -> Result<Vec<SessionRecord>> {
        let email = email.to_string();
        self.execute(move |conn| query_sessions(conn, &email)).await
    }

    pub async fn last_session(&self, email: &str) -> Result<Option<SessionRecord>> {
        let email = email.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT start_ts, end_ts, total_seconds, focused_seconds,
                        unfocused_seconds, score, start_str, end_str
                 FROM sessions
                 WHERE user_email = ?1
                 ORDER BY rowid DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![email])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}

fn query_sessions(conn: &Connection, email: &str) -> Result<Vec<SessionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT start_ts, end_ts, total_seconds, focused_seconds,
                unfocused_seconds, score, start_str, end_str
         FROM sessions
         WHERE user_email = ?1
         ORDER BY rowid ASC",
    )?;

    let mut rows = stmt.query(params![email])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store(dir: &tempfile::TempDir) -> UserStore {
        UserStore::new(dir.path().join("focuswatch.sqlite3")).unwrap()
    }

    fn record(score: i32) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 8, 6, 9, 30, 0).unwrap();
        SessionRecord {
            start_ts: start,
            end_ts: end,
            total_seconds: 1800.0,
            focused_seconds: 1500.0,
            unfocused_seconds: 300.0,
            score,
            start_str: "2026-08-06 09:00:00".to_string(),
            end_str: "2026-08-06 09:30:00".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let user = store.get_user("ada@example.com").await.unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.password_hash, "hash");
        assert!(user.sessions.is_empty());
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();
        let err = store
            .create_user("Imposter", "ada@example.com", "hash2")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        assert!(store.get_user("ghost@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_evicts_oldest_beyond_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();

        for score in 0..5 {
            store
                .append_session("ada@example.com", &record(score), 3)
                .await
                .unwrap();
        }

        let sessions = store.list_sessions("ada@example.com").await.unwrap();
        let scores: Vec<i32> = sessions.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn last_session_is_most_recent_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        store
            .create_user("Ada", "ada@example.com", "hash")
            .await
            .unwrap();
        store
            .append_session("ada@example.com", &record(40), 20)
            .await
            .unwrap();
        store
            .append_session("ada@example.com", &record(90), 20)
            .await
            .unwrap();

        let last = store
            .last_session("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.score, 90);
    }

    #[tokio::test]
    async fn append_for_unknown_user_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let result = store
            .append_session("ghost@example.com", &record(50), 20)
            .await;
        assert!(result.is_err());
    }
}
