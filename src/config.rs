/*
 * @file config.rs
 * @brief Runtime configuration and credentials
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

//! Runtime configuration loaded once at startup.
//!
//! Everything lives in `config.json`; every field has a default so a partial
//! (or missing) file still yields a usable assistant. Credentials are never
//! stored in the file and come from the environment instead.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::services::{Gender, VoiceProfile};

/// Path to the JSON configuration file that holds runtime defaults.
pub const CONFIG_PATH: &str = "config.json";

/// Default baud rate used for Pico UART commands.
const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Strongly typed representation of `config.json`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub robot: RobotConfig,
    pub thresholds: ThresholdConfig,
    pub weather: WeatherConfig,
    pub news: NewsConfig,
    pub sounds: SoundConfig,
    pub ollama: OllamaConfig,
    pub speech: SpeechConfig,
    pub camera: CameraConfig,
    pub serial: SerialConfig,
    pub listen: ListenConfig,
    pub messaging: MessagingConfig,
    pub timing: TimingConfig,
}

/// Identity of the assistant.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Attention word every request has to start with.
    pub name: String,
    pub gender: Gender,
    /// Locale of the assistant's own voice.
    pub locale: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: "Watson".to_string(),
            gender: Gender::Male,
            locale: "en-US".to_string(),
        }
    }
}

impl RobotConfig {
    pub fn voice(&self) -> VoiceProfile {
        VoiceProfile::new(self.locale.clone(), self.gender)
    }
}

/// Limits applied to tone and sentiment results.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum score for a tone to be mentioned by the tone analyzer.
    pub tone: f64,
    /// Minimum score for a keyword emotion to be reported.
    pub sentiment_confidence: f64,
    /// Aggregation needs strictly more snippets than this.
    pub min_tweets: usize,
    /// Most snippets requested and considered per search.
    pub max_tweets: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            tone: 0.4,
            sentiment_confidence: 0.5,
            min_tweets: 5,
            max_tweets: 100,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of The Weather Company data service.
    pub host: String,
    /// Zip used whenever a spoken zip cannot be understood.
    pub default_zip: String,
    /// `e` for imperial, `m` for metric.
    pub units: String,
    pub language: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            host: "https://twcservice.mybluemix.net".to_string(),
            default_zip: "73025".to_string(),
            units: "e".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub host: String,
    /// NewsAPI source id whose headlines are read.
    pub source: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            host: "https://newsapi.org".to_string(),
            source: "cnn".to_string(),
        }
    }
}

/// WAV sound effects.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub camera_shutter: PathBuf,
    pub snore: PathBuf,
    pub disco_party: PathBuf,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            camera_shutter: PathBuf::from("sounds/camera-shutter-click-01.wav"),
            snore: PathBuf::from("sounds/snore_1.wav"),
            disco_party: PathBuf::from("sounds/disco-party.wav"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    /// Multimodal model used to describe pictures.
    pub vision_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            vision_model: "llava:7b".to_string(),
        }
    }
}

/// Text-to-speech program settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub program: String,
    /// Flag that precedes a voice name, e.g. `-v`.
    pub voice_flag: String,
    /// Voice to use per locale; locales without an entry use the system voice.
    pub voices: HashMap<String, String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: "say".to_string(),
            voice_flag: "-v".to_string(),
            voices: HashMap::new(),
        }
    }
}

/// Still-capture program settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub program: String,
    pub width: u32,
    pub height: u32,
    pub vflip: bool,
    pub hflip: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            program: "libcamera-still".to_string(),
            width: 960,
            height: 720,
            vflip: false,
            hflip: false,
        }
    }
}

/// UART link to the Pico driving the LED.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// No port means the indicator is only logged.
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: DEFAULT_SERIAL_BAUD,
        }
    }
}

/// Microphone and transcription settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub whisper_model: PathBuf,
    /// Length of each recording window.
    pub record_secs: u64,
    /// Minimum RMS amplitude considered speech.
    pub silence_rms: f32,
    pub language: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            whisper_model: PathBuf::from("models/ggml-base.en.bin"),
            record_secs: 5,
            silence_rms: 150.0,
            language: "en".to_string(),
        }
    }
}

/// Where captured pictures are delivered.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub to_phone: String,
    pub from_phone: String,
    /// Endpoint that stores an uploaded picture and answers with its URL.
    pub upload_url: String,
}

/// Durations of the longer-running actions.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sleep_secs: u64,
    /// How long a sentiment color stays lit before listening resumes.
    pub emotion_hold_secs: u64,
    pub disco_flashes: u32,
    pub disco_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sleep_secs: 60,
            emotion_hold_secs: 5,
            disco_flashes: 30,
            disco_interval_ms: 250,
        }
    }
}

/// Secrets read from the environment (and `.env`).
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub twc_api_key: Option<String>,
    pub newsapi_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            twc_api_key: env_value("TWC_API_KEY"),
            newsapi_key: env_value("NEWSAPI_KEY"),
            twitter_bearer_token: env_value("TWITTER_BEARER_TOKEN"),
            twilio_account_sid: env_value("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_value("TWILIO_AUTH_TOKEN"),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Loads the configuration, falling back to defaults.
///
/// # Details
/// A missing or malformed file is logged and replaced by
/// [`AppConfig::default`], then environment overrides are applied.
///
/// # Arguments
/// * `path` - Location of the JSON configuration file.
///
/// # Returns
/// * `AppConfig` - Loaded or default configuration.
pub fn load_app_config(path: &Path) -> AppConfig {
    let config = read_app_config(path).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "using default configuration");
        AppConfig::default()
    });
    apply_env_overrides(config)
}

fn read_app_config(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_app_config(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parses configuration JSON.
pub fn parse_app_config(raw: &str) -> Result<AppConfig> {
    Ok(serde_json::from_str(raw)?)
}

fn apply_env_overrides(mut config: AppConfig) -> AppConfig {
    if let Some(model) = env_value("OLLAMA_MODEL") {
        config.ollama.model = model;
    }
    if let Some(port) = env_value("INTENTBOT_SERIAL_PORT") {
        config.serial.port = Some(port);
    }
    if let Some(baud) = env_value("INTENTBOT_SERIAL_BAUD").and_then(|value| value.parse().ok()) {
        config.serial.baud = baud;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = parse_app_config("{}").unwrap();
        assert_eq!(config.robot.name, "Watson");
        assert_eq!(config.weather.default_zip, "73025");
        assert_eq!(config.thresholds.min_tweets, 5);
        assert_eq!(config.thresholds.max_tweets, 100);
        assert!((config.thresholds.tone - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.serial.baud, DEFAULT_SERIAL_BAUD);
        assert!(config.serial.port.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let raw = r#"{
            "robot": { "name": "Jarvis", "gender": "female" },
            "thresholds": { "sentiment_confidence": 0.7 },
            "speech": { "voices": { "es-ES": "Jorge" } }
        }"#;
        let config = parse_app_config(raw).unwrap();
        assert_eq!(config.robot.name, "Jarvis");
        assert_eq!(config.robot.gender, Gender::Female);
        assert_eq!(config.robot.locale, "en-US");
        assert!((config.thresholds.sentiment_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.thresholds.min_tweets, 5);
        assert_eq!(config.speech.program, "say");
        assert_eq!(config.speech.voices.get("es-ES").map(String::as_str), Some("Jorge"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_app_config("{ not json").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("intentbot-missing-config.json");
        let config = load_app_config(&path);
        assert_eq!(config.timing.sleep_secs, 60);
    }
}
