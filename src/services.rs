/*
 * @file services.rs
 * @brief Collaborator contracts and shared data types
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

//! Contracts for every external collaborator the dispatcher drives.
//!
//! Each trait wraps one stateless, single-purpose service. The dispatcher only
//! ever talks to these traits, so the concrete Ollama, HTTP, UART and device
//! implementations can be swapped for fakes in tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reply produced by the conversation backend for a single turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    /// Free-text description; empty means there is nothing to act on.
    pub description: String,
}

impl Reply {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Voice gender used when choosing a synthesis voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

/// Locale and gender a sentence should be spoken with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceProfile {
    pub locale: String,
    pub gender: Gender,
}

impl VoiceProfile {
    pub fn new(locale: impl Into<String>, gender: Gender) -> Self {
        Self {
            locale: locale.into(),
            gender,
        }
    }
}

/// Single tone score inside a category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub name: String,
    pub score: f64,
}

/// Group of related tones, e.g. `emotion_tone`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToneCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tones: Vec<Tone>,
}

/// Document-level result of a tone analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneReport {
    #[serde(default)]
    pub categories: Vec<ToneCategory>,
}

/// Current conditions for a postal code.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub temp: f64,
    pub feels_like: f64,
    pub wind_speed: Option<f64>,
    pub gust: Option<f64>,
    pub pressure_desc: Option<String>,
}

/// Top headlines from one news source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headlines {
    pub source: String,
    pub titles: Vec<String>,
}

/// One thing an image classifier believes it sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageLabel {
    pub label: String,
}

/// Colors the LED indicator can shine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
    Purple,
    Pink,
    White,
}

impl Color {
    /// Every color, in the order the disco party draws from.
    pub const PALETTE: [Color; 10] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Cyan,
        Color::Blue,
        Color::Magenta,
        Color::Purple,
        Color::Pink,
        Color::White,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Cyan => "cyan",
            Color::Blue => "blue",
            Color::Magenta => "magenta",
            Color::Purple => "purple",
            Color::Pink => "pink",
            Color::White => "white",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the visual indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Light {
    /// Idle, waiting for the next utterance.
    Listening,
    /// A request is being handled.
    Speaking,
    Shine(Color),
    Off,
}

#[async_trait]
pub trait Conversation: Send + Sync {
    async fn classify(&self, utterance: &str) -> Result<Reply>;
}

#[async_trait]
pub trait Voice: Send + Sync {
    /// Resolves once the sentence has been spoken.
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<()>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String>;
    async fn is_translatable(&self, from: &str, to: &str) -> Result<bool>;
}

#[async_trait]
pub trait ToneAnalyzer: Send + Sync {
    async fn analyze_tone(&self, text: &str) -> Result<ToneReport>;
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn fetch_weather(&self, zip: &str) -> Result<Observation>;
    /// Golf category for the upcoming hour, `None` when not reported.
    async fn fetch_golf_weather(&self, zip: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait NewsService: Send + Sync {
    async fn fetch_top_news(&self) -> Result<Headlines>;
}

#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search_keyword(&self, keyword: &str, limit: usize) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture_image(&self) -> Result<PathBuf>;
}

#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify_image(&self, path: &Path) -> Result<Vec<ImageLabel>>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Uploads a picture and returns the public URL it can be fetched from.
    async fn upload_image(&self, path: &Path) -> Result<String>;
    async fn send_message(&self, body: &str, media_url: &str) -> Result<()>;
}

#[async_trait]
pub trait Indicator: Send + Sync {
    async fn set(&self, light: Light) -> Result<()>;
}

#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(&self, path: &Path) -> Result<()>;
}

/// Bundle of collaborators handed to the dispatcher.
#[derive(Clone)]
pub struct Services {
    pub conversation: Arc<dyn Conversation>,
    pub voice: Arc<dyn Voice>,
    pub translator: Arc<dyn Translator>,
    pub tone: Arc<dyn ToneAnalyzer>,
    pub weather: Arc<dyn WeatherService>,
    pub news: Arc<dyn NewsService>,
    pub search: Arc<dyn KeywordSearch>,
    pub camera: Arc<dyn Camera>,
    pub vision: Arc<dyn ImageClassifier>,
    /// Picture delivery is skipped when no messaging account is configured.
    pub messenger: Option<Arc<dyn Messenger>>,
    pub indicator: Arc<dyn Indicator>,
    pub sounds: Arc<dyn SoundPlayer>,
}
