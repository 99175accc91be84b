/*
 * @file listener.rs
 * @brief Microphone and console utterance listeners
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Utterance sources feeding the dispatcher queue.
//!
//! Both listeners run on dedicated threads and push transcribed (or typed)
//! text into a bounded channel. The dispatcher drains the channel one turn at
//! a time, so turns never overlap.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio;
use crate::config::ListenConfig;
use crate::transcribe::Transcriber;

/// Pause before each recording window so the user can start speaking.
const PRE_RECORD_DELAY: Duration = Duration::from_millis(200);

/// Poll interval while listening is paused.
const PAUSED_POLL: Duration = Duration::from_millis(250);

/// Back-off after a microphone error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Shared switch that suspends listening.
///
/// # Details
/// Two things close the gate: an explicit pause (sleep and disco) and a
/// [`Muted`] hold taken while the assistant is talking or playing a sound.
/// Every closing bumps an epoch so a recording window that overlapped
/// output can be recognised after the fact, even when the gate has already
/// reopened. Typed input only honours the explicit pause.
#[derive(Clone, Debug, Default)]
pub struct ListenGate(Arc<GateState>);

#[derive(Debug, Default)]
struct GateState {
    paused: AtomicBool,
    speaking: AtomicUsize,
    epoch: AtomicU64,
}

impl ListenGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.0.paused.store(true, Ordering::SeqCst);
        self.0.epoch.fetch_add(1, Ordering::SeqCst);
        debug!("listening paused");
    }

    pub fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
        debug!("listening resumed");
    }

    /// Closes the gate until the returned hold is dropped. Holds nest.
    pub fn mute(&self) -> Muted {
        self.0.speaking.fetch_add(1, Ordering::SeqCst);
        self.0.epoch.fetch_add(1, Ordering::SeqCst);
        Muted(self.clone())
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        !self.is_paused() && self.0.speaking.load(Ordering::SeqCst) == 0
    }

    /// Number of times the gate has closed so far.
    pub fn epoch(&self) -> u64 {
        self.0.epoch.load(Ordering::SeqCst)
    }
}

/// Keeps the microphone deaf while the assistant is producing sound.
#[derive(Debug)]
pub struct Muted(ListenGate);

impl Drop for Muted {
    fn drop(&mut self) {
        self.0 .0.speaking.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Whether audio recorded since `started` may be transcribed.
fn window_is_clean(gate: &ListenGate, started: u64) -> bool {
    gate.is_open() && gate.epoch() == started
}

/// Starts the microphone loop on its own thread.
///
/// # Details
/// Each iteration records one window, drops silent windows, transcribes the
/// rest and queues non-empty text. A window recorded while the gate was
/// closed at any point is discarded, so the assistant never hears itself. The loop ends when the receiver goes away; a model that cannot
/// be loaded ends it immediately, which closes the queue.
///
/// # Arguments
/// * `config` - Model, window length and silence threshold.
/// * `gate` - Listening switch shared with the dispatcher.
/// * `utterances` - Queue drained by the dispatcher.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_microphone_listener(
    config: ListenConfig,
    gate: ListenGate,
    utterances: mpsc::Sender<String>,
) -> Result<()> {
    thread::Builder::new()
        .name("microphone-listener".to_string())
        .spawn(move || {
            if let Err(err) = listen_microphone(&config, &gate, &utterances) {
                error!(error = %err, "microphone listener stopped");
            }
        })?;
    Ok(())
}

fn listen_microphone(
    config: &ListenConfig,
    gate: &ListenGate,
    utterances: &mpsc::Sender<String>,
) -> Result<()> {
    let transcriber = Transcriber::new(config)?;
    let window = Duration::from_secs(config.record_secs);
    info!(model = %config.whisper_model.display(), "microphone listener ready");
    while !utterances.is_closed() {
        let started = gate.epoch();
        if !gate.is_open() {
            thread::sleep(PAUSED_POLL);
            continue;
        }
        thread::sleep(PRE_RECORD_DELAY);
        let samples = match audio::record_window(window) {
            Ok(samples) => samples,
            Err(err) => {
                warn!(error = %err, "microphone error");
                thread::sleep(RETRY_DELAY);
                continue;
            }
        };
        if !window_is_clean(gate, started) {
            debug!("discarding audio captured while the gate was closed");
            continue;
        }
        if !audio::contains_speech(&samples, config.silence_rms) {
            continue;
        }
        let text = match transcriber.transcribe(&audio::normalize_samples(&samples)) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "transcription failed");
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }
        info!(utterance = %text, "heard");
        if utterances.blocking_send(text).is_err() {
            break;
        }
    }
    Ok(())
}

/// Starts a stdin reader that queues each typed line as an utterance.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_console_listener(gate: ListenGate, utterances: mpsc::Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("console-listener".to_string())
        .spawn(move || {
            if let Err(err) = read_console(io::stdin().lock(), &gate, &utterances) {
                error!(error = %err, "console listener stopped");
            }
        })?;
    Ok(())
}

fn read_console(
    input: impl BufRead,
    gate: &ListenGate,
    utterances: &mpsc::Sender<String>,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if gate.is_paused() {
            info!(utterance = text, "busy, ignoring typed input");
            continue;
        }
        if utterances.blocking_send(text.to_string()).is_err() {
            break;
        }
    }
    Ok(())
}
