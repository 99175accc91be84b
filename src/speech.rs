/*
 * @file speech.rs
 * @brief Command-line text-to-speech
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

//! Text-to-speech through a command-line synthesizer such as macOS `say`.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::SpeechConfig;
use crate::services::{Gender, Voice, VoiceProfile};

/// Speaks by running the configured program once per sentence.
pub struct SayVoice {
    program: String,
    voice_flag: String,
    voices: HashMap<String, String>,
}

impl SayVoice {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            program: config.program.clone(),
            voice_flag: config.voice_flag.clone(),
            voices: config.voices.clone(),
        }
    }

    /// Voice name for a profile, most specific key first:
    /// `fr-FR/female`, then `fr-FR`, then `fr`.
    fn voice_for(&self, profile: &VoiceProfile) -> Option<&str> {
        let gender = match profile.gender {
            Gender::Male => "male",
            Gender::Female => "female",
        };
        let language = profile.locale.split('-').next().unwrap_or_default();
        [
            format!("{}/{gender}", profile.locale),
            profile.locale.clone(),
            language.to_string(),
        ]
        .iter()
        .find_map(|key| self.voices.get(key))
        .map(String::as_str)
    }

    fn command_args(&self, text: &str, profile: &VoiceProfile) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = self.voice_for(profile) {
            if !self.voice_flag.is_empty() {
                args.push(self.voice_flag.clone());
            }
            args.push(voice.to_string());
        }
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl Voice for SayVoice {
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<()> {
        if text.trim().is_empty() {
            bail!("Cannot speak empty text");
        }
        let output = tokio::process::Command::new(&self.program)
            .args(self.command_args(text, profile))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
