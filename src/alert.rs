//! Audible distraction alert.
//!
//! rodio's output types are not `Send`, so a dedicated thread owns the stream
//! and sink; callers talk to it over a command channel. The chime itself is a
//! synthesized source: three short 1 kHz pulses.

use anyhow::{anyhow, Result};
use log::warn;
use rodio::{OutputStream, Sink, Source};
use std::f32::consts::PI;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const PULSE_HZ: f32 = 1000.0;
const PULSE_SECS: f32 = 0.2;
const GAP_SECS: f32 = 0.15;
const PULSE_COUNT: u32 = 3;

enum AlertCommand {
    Chime,
}

/// Three-pulse distraction chime.
pub struct DistractionChime {
    num_sample: usize,
    total_samples: usize,
}

impl DistractionChime {
    pub fn new() -> Self {
        let total_secs =
            PULSE_COUNT as f32 * PULSE_SECS + (PULSE_COUNT - 1) as f32 * GAP_SECS;
        Self {
            num_sample: 0,
            total_samples: (total_secs * SAMPLE_RATE as f32) as usize,
        }
    }
}

impl Default for DistractionChime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for DistractionChime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        // Tone for the first PULSE_SECS of each pulse period, silence after.
        let phase = t % (PULSE_SECS + GAP_SECS);
        let sample = if phase < PULSE_SECS {
            (2.0 * PI * PULSE_HZ * t).sin() * 0.2
        } else {
            0.0
        };

        Some(sample)
    }
}

impl Source for DistractionChime {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[derive(Clone)]
pub struct AlertEngine {
    tx: Arc<Mutex<Option<Sender<AlertCommand>>>>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AlertCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|err| anyhow!("alert command channel poisoned: {err}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AlertCommand>();

        // Dedicated thread holding the non-Send audio objects.
        thread::Builder::new()
            .name("alert-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AlertCommand::Chime => {
                            if sink.is_none() {
                                match OutputStream::try_default() {
                                    Ok((s, handle)) => match Sink::try_new(&handle) {
                                        Ok(new_sink) => {
                                            _stream = Some(s);
                                            sink = Some(new_sink);
                                        }
                                        Err(err) => {
                                            warn!("Failed to create audio sink: {err}");
                                            continue;
                                        }
                                    },
                                    Err(err) => {
                                        warn!("Failed to open audio output: {err}");
                                        continue;
                                    }
                                }
                            }
                            if let Some(ref s) = sink {
                                s.append(DistractionChime::new());
                            }
                        }
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn alert thread: {err}"))?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }

    pub fn chime(&self) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(AlertCommand::Chime)
            .map_err(|err| anyhow!("alert thread gone: {err}"))
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}
