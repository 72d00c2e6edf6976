//! Console entry point.
//!
//! Wires the store, settings, and session controller together and then speaks
//! a line protocol on stdin standing in for the external vision pipeline:
//! frame lines of four 0/1 flags (`face device study eyes_down`) plus the
//! operator commands `signup`, `user`, `start`, `stop`, `status`, `profile`
//! and `badge`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use focuswatch::{
    api, settings::SettingsStore, store::UserStore, tracker::SignalFrame, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("focuswatch starting up...");

    let data_dir = std::env::var("FOCUSWATCH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("focuswatch-data"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let store = UserStore::new(data_dir.join("focuswatch.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
    let state = AppState::new(store, settings);

    run_console(state).await
}

async fn run_console(state: AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current_user: Option<String> = None;
    let mut feed: Option<mpsc::Sender<SignalFrame>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        handle_line(&state, line.trim(), &mut current_user, &mut feed).await?;
                    }
                    None => break, // stdin closed
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
        }
    }

    if state.controller.is_active() {
        feed.take();
        let record = state.controller.stop_session(current_user.as_deref()).await;
        println!("{}", serde_json::to_string(&record)?);
    }

    Ok(())
}

async fn handle_line(
    state: &AppState,
    line: &str,
    current_user: &mut Option<String>,
    feed: &mut Option<mpsc::Sender<SignalFrame>>,
) -> Result<()> {
    if line.is_empty() {
        return Ok(());
    }

    if let Some(frame) = parse_frame(line) {
        match feed {
            Some(sender) => {
                if sender.send(frame).await.is_err() {
                    warn!("signal feed is gone; frame dropped");
                    feed.take();
                }
            }
            None => warn!("no active session; send `start` first"),
        }
        return Ok(());
    }

    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("signup") => {
            let (Some(name), Some(email), Some(password_hash)) =
                (parts.next(), parts.next(), parts.next())
            else {
                warn!("usage: signup <name> <email> <password_hash>");
                return Ok(());
            };
            match state.store.create_user(name, email, password_hash).await {
                Ok(()) => {
                    *current_user = Some(email.to_string());
                    println!("signed up {email}");
                }
                Err(err) => warn!("signup failed: {err:#}"),
            }
        }
        Some("user") => {
            let Some(email) = parts.next() else {
                warn!("usage: user <email>");
                return Ok(());
            };
            if state.store.get_user(email).await?.is_none() {
                warn!("unknown user {email}");
                return Ok(());
            }
            *current_user = Some(email.to_string());
            println!("active user {email}");
        }
        Some("start") => {
            *feed = Some(state.controller.start_session().await);
            println!("session started");
        }
        Some("stop") => {
            feed.take();
            let record = state.controller.stop_session(current_user.as_deref()).await;
            println!("{}", serde_json::to_string(&record)?);
        }
        Some("status") => {
            let payload = api::status(state, current_user.as_deref()).await;
            println!("{}", serde_json::to_string(&payload)?);
        }
        Some("profile") => {
            let Some(email) = current_user.as_deref() else {
                warn!("no user selected; use `user <email>` first");
                return Ok(());
            };
            match api::profile_current_month(state, email).await {
                Ok(payload) => println!("{}", serde_json::to_string(&payload)?),
                Err(err) => warn!("profile failed: {err:#}"),
            }
        }
        Some("badge") => {
            match state.controller.badge().await {
                Some(badge) => println!("{}", badge.as_str()),
                None => println!("none"),
            }
        }
        Some(other) => warn!("unknown command {other:?}"),
        None => {}
    }

    Ok(())
}

/// A frame line is exactly four 0/1 flags:
/// `face_detected device_detected study_object_detected eyes_down`.
fn parse_frame(line: &str) -> Option<SignalFrame> {
    let mut flags = [false; 4];
    let mut count = 0;
    for (i, token) in line.split_whitespace().enumerate() {
        if i >= flags.len() {
            return None;
        }
        flags[i] = match token {
            "1" => true,
            "0" => false,
            _ => return None,
        };
        count = i + 1;
    }
    if count != flags.len() {
        return None;
    }

    Some(SignalFrame {
        face_detected: flags[0],
        device_detected: flags[1],
        study_object_detected: flags[2],
        eyes_down: flags[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lines_parse() {
        let frame = parse_frame("1 0 1 0").unwrap();
        assert!(frame.face_detected);
        assert!(!frame.device_detected);
        assert!(frame.study_object_detected);
        assert!(!frame.eyes_down);
    }

    #[test]
    fn non_frame_lines_fall_through() {
        assert!(parse_frame("start").is_none());
        assert!(parse_frame("1 0 1").is_none());
        assert!(parse_frame("1 0 1 0 1").is_none());
        assert!(parse_frame("1 0 2 0").is_none());
    }
}
