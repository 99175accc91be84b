/*
 * @file sentiment.rs
 * @brief Keyword sentiment aggregation
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

//! Keyword sentiment aggregation over buffered search snippets.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use crate::config::ThresholdConfig;
use crate::services::{Color, Tone, ToneAnalyzer};

/// Category id carrying the emotional tones.
pub const EMOTION_CATEGORY: &str = "emotion_tone";

/// Emotion → indicator color. Covers the analyzer's whole emotion vocabulary.
const EMOTION_COLORS: &[(&str, Color)] = &[
    ("anger", Color::Red),
    ("joy", Color::Yellow),
    ("fear", Color::Magenta),
    ("disgust", Color::Green),
    ("sadness", Color::Blue),
];

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?|ftp)://\S+").expect("valid url pattern"));

/// Strips non-ASCII characters and hyperlinks from a search result.
pub fn sanitize(snippet: &str) -> String {
    let ascii: String = snippet.chars().filter(char::is_ascii).collect();
    URL_PATTERN.replace_all(&ascii, "").into_owned()
}

/// Color shown for an emotion, if it has one.
pub fn emotion_color(emotion: &str) -> Option<Color> {
    let emotion = emotion.to_lowercase();
    EMOTION_COLORS
        .iter()
        .find(|(name, _)| *name == emotion)
        .map(|(_, color)| *color)
}

/// Result of one aggregation attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum SentimentOutcome {
    /// Too few snippets were buffered to say anything useful.
    InsufficientData { count: usize },
    /// No emotion reached the confidence threshold.
    LowConfidence,
    Emotion {
        label: String,
        score: f64,
        color: Option<Color>,
    },
}

/// Buffers snippets and classifies their combined emotional tone.
#[derive(Debug)]
pub struct SentimentAggregator {
    buffer: Vec<String>,
    thresholds: ThresholdConfig,
}

impl SentimentAggregator {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self {
            buffer: Vec::new(),
            thresholds,
        }
    }

    /// Appends an already sanitized snippet.
    pub fn ingest(&mut self, snippet: impl Into<String>) {
        self.buffer.push(snippet.into());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether enough snippets are buffered for [`Self::aggregate`] to run.
    pub fn has_enough(&self) -> bool {
        self.buffer.len() > self.thresholds.min_tweets
    }

    /// Classifies the buffered snippets and empties the buffer.
    ///
    /// # Details
    /// The buffer is cleared whatever the outcome, including analyzer failure.
    /// Only the first `max_tweets` snippets are sent. Among the emotion tones
    /// the highest score wins, earlier tones winning ties.
    ///
    /// # Arguments
    /// * `analyzer` - Tone classifier for the joined corpus.
    ///
    /// # Returns
    /// * `Ok(SentimentOutcome)` - Insufficient data, low confidence or an emotion.
    ///
    /// # Errors
    /// Returns the analyzer's error unchanged.
    pub async fn aggregate(&mut self, analyzer: &dyn ToneAnalyzer) -> Result<SentimentOutcome> {
        let snippets = std::mem::take(&mut self.buffer);
        if snippets.len() <= self.thresholds.min_tweets {
            debug!(count = snippets.len(), "not enough snippets for sentiment");
            return Ok(SentimentOutcome::InsufficientData {
                count: snippets.len(),
            });
        }
        let corpus = snippets
            .iter()
            .take(self.thresholds.max_tweets)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let report = analyzer.analyze_tone(&corpus).await?;
        let strongest = report
            .categories
            .iter()
            .filter(|category| category.id == EMOTION_CATEGORY)
            .flat_map(|category| category.tones.iter())
            .fold(None, stable_max);
        let Some(tone) = strongest else {
            return Ok(SentimentOutcome::LowConfidence);
        };
        if tone.score < self.thresholds.sentiment_confidence {
            debug!(emotion = %tone.name, score = tone.score, "emotion below confidence threshold");
            return Ok(SentimentOutcome::LowConfidence);
        }
        info!(emotion = %tone.name, score = tone.score, "sentiment classified");
        Ok(SentimentOutcome::Emotion {
            label: tone.name.to_lowercase(),
            score: tone.score,
            color: emotion_color(&tone.name),
        })
    }
}

fn stable_max<'a>(best: Option<&'a Tone>, tone: &'a Tone) -> Option<&'a Tone> {
    match best {
        Some(current) if current.score >= tone.score => Some(current),
        _ => Some(tone),
    }
}
