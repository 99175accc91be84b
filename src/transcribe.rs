/*
 * @file transcribe.rs
 * @brief Whisper speech-to-text
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

//! Local speech-to-text with whisper.cpp.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::ListenConfig;

/// Where GGML models are fetched from when missing.
const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Whisper context plus the decoding language.
pub struct Transcriber {
    ctx: WhisperContext,
    language: String,
}

impl Transcriber {
    /// Loads the configured model, downloading it first if necessary.
    ///
    /// # Details
    /// The first run may take several minutes: the base English model is
    /// roughly 147 MB. Inference runs on the CPU.
    ///
    /// # Errors
    /// Returns an error if the download or context initialization fails.
    pub fn new(config: &ListenConfig) -> Result<Self> {
        let model = &config.whisper_model;
        if !model.exists() {
            download_model(model)?;
        }
        let path = model
            .to_str()
            .with_context(|| format!("Model path is not UTF-8: {}", model.display()))?;
        let mut params = WhisperContextParameters::default();
        params.use_gpu(false);
        let ctx = WhisperContext::new_with_params(path, params)
            .with_context(|| "Failed to initialize Whisper")?;
        Ok(Self {
            ctx,
            language: config.language.clone(),
        })
    }

    /// Transcribes 16 kHz mono samples.
    ///
    /// # Arguments
    /// * `audio` - Normalized samples in [-1.0, 1.0].
    ///
    /// # Returns
    /// * `Ok(String)` - Segment texts joined by spaces, annotations removed.
    ///
    /// # Errors
    /// Returns an error if state creation or inference fails.
    pub fn transcribe(&self, audio: &[f32]) -> Result<String> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.language));
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        let mut state = self
            .ctx
            .create_state()
            .with_context(|| "Failed to create Whisper state")?;
        state
            .full(params, audio)
            .with_context(|| "Whisper transcription failed")?;
        let segments = state.full_n_segments().unwrap_or(0);
        let mut text = String::new();
        for i in 0..segments {
            if let Ok(segment) = state.full_get_segment_text(i) {
                text.push_str(&segment);
                text.push(' ');
            }
        }
        Ok(clean_transcript(&text))
    }
}

/// Drops whisper's bracketed annotations such as `[BLANK_AUDIO]` or
/// `(music)` and collapses whitespace.
pub fn clean_transcript(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn model_url(model: &Path) -> Option<String> {
    let file_name = model.file_name()?.to_str()?;
    Some(format!("{MODEL_BASE_URL}/{file_name}"))
}

/// Fetches the GGML model with curl, following Hugging Face redirects.
fn download_model(model: &Path) -> Result<()> {
    let url = model_url(model)
        .with_context(|| format!("Cannot derive a download URL for {}", model.display()))?;
    if let Some(dir) = model.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    info!(%url, "downloading whisper model, this may take a few minutes");
    let output = std::process::Command::new("curl")
        .arg("-L")
        .arg("-o")
        .arg(model)
        .arg(&url)
        .output()
        .with_context(|| "Failed to execute curl")?;
    if !output.status.success() {
        bail!("Failed to download Whisper model from {url}");
    }
    info!(path = %model.display(), "whisper model downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn annotations_are_removed() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO] "), "");
        assert_eq!(
            clean_transcript(" Watson, (coughs) what's the  weather? "),
            "Watson, what's the weather?"
        );
    }

    #[test]
    fn model_url_uses_file_name() {
        assert_eq!(
            model_url(&PathBuf::from("models/ggml-base.en.bin")).as_deref(),
            Some("https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin")
        );
        assert_eq!(model_url(&PathBuf::from("/")), None);
    }
}
