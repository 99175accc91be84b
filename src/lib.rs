/*
 * @file lib.rs
 * @brief Intentbot library root
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

//! Intentbot - a voice assistant that turns recognized intents into actions.
//!
//! An utterance addressed to the robot by name is classified by the
//! conversation service, which answers with a spoken description and an
//! intent. The [`dispatcher::Dispatcher`] then runs the matching action:
//! weather and golf reports, translation, tone and keyword sentiment
//! analysis, news headlines, pictures, sleep and a disco light show. Some
//! intents ask a follow-up question and treat the next utterance as the
//! answer.
//!
//! - Ollama serves conversation, translation, tone and image labels
//! - Whisper transcribes the microphone locally
//! - A Raspberry Pi Pico drives the LED indicator over UART
//!
//! # Example
//! ```no_run
//! use std::path::PathBuf;
//!
//! use anyhow::Result;
//! use intentbot::assistant::{self, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     dotenv::dotenv().ok();
//!     assistant::run_voice_assistant(RunOptions {
//!         config_path: PathBuf::from("config.json"),
//!         text_mode: true,
//!     })
//!     .await
//! }
//! ```

pub mod assistant;
pub mod audio;
pub mod config;
pub mod device;
pub mod dialog;
pub mod dispatcher;
pub mod intent;
pub mod listener;
pub mod ollama;
pub mod pico;
pub mod sentiment;
pub mod services;
pub mod speech;
pub mod transcribe;
pub mod web;
pub mod zip;

#[cfg(test)]
mod testing;
