/*
 * @file testing.rs
 * @brief Recording fake collaborators for unit tests
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

//! Recording fake for every collaborator, shared by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, TimingConfig};
use crate::listener::ListenGate;
use crate::services::{
    Camera, Conversation, Headlines, ImageClassifier, ImageLabel, Indicator, KeywordSearch, Light,
    Messenger, NewsService, Observation, Reply, Services, SoundPlayer, ToneAnalyzer, ToneReport,
    Translator, Voice, VoiceProfile, WeatherService,
};

/// Something a collaborator was asked to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Spoke { text: String, locale: String },
    Light(Light),
    Classified(String),
    TranslatableChecked(String),
    Translated { text: String, to: String },
    ToneAnalyzed(String),
    Weather(String),
    GolfWeather(String),
    News,
    Searched { keyword: String, limit: usize },
    Captured,
    ClassifiedImage,
    Uploaded,
    Messaged { body: String, media_url: String },
    Played(PathBuf),
}

/// Configuration with every delay shortened to nothing.
pub fn test_config() -> AppConfig {
    AppConfig {
        timing: TimingConfig {
            sleep_secs: 0,
            emotion_hold_secs: 0,
            disco_flashes: 3,
            disco_interval_ms: 0,
        },
        ..AppConfig::default()
    }
}

/// Serves one canned JSON response on a local port.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub async fn serve_json(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&raw[..end]).to_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if raw.len() >= end + 4 + length {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// Scripted stand-in for all services at once.
#[derive(Default)]
pub struct Fake {
    events: Mutex<Vec<Event>>,
    replies: Mutex<VecDeque<String>>,
    snippets: Mutex<Vec<String>>,
    tone: Mutex<ToneReport>,
    labels: Mutex<Vec<ImageLabel>>,
    untranslatable: Mutex<bool>,
    failing: Mutex<Vec<&'static str>>,
    gate: Mutex<Option<ListenGate>>,
    gate_during_output: Mutex<Vec<bool>>,
}

impl Fake {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bundles this fake as every collaborator, messenger included.
    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            conversation: self.clone(),
            voice: self.clone(),
            translator: self.clone(),
            tone: self.clone(),
            weather: self.clone(),
            news: self.clone(),
            search: self.clone(),
            camera: self.clone(),
            vision: self.clone(),
            messenger: Some(self.clone() as Arc<dyn Messenger>),
            indicator: self.clone(),
            sounds: self.clone(),
        }
    }

    /// Queues the next conversation reply. An empty queue answers `""`.
    pub fn reply(&self, description: &str) {
        self.replies.lock().unwrap().push_back(description.to_string());
    }

    pub fn set_snippets(&self, snippets: Vec<String>) {
        *self.snippets.lock().unwrap() = snippets;
    }

    pub fn set_tone(&self, report: ToneReport) {
        *self.tone.lock().unwrap() = report;
    }

    pub fn set_labels(&self, labels: Vec<ImageLabel>) {
        *self.labels.lock().unwrap() = labels;
    }

    pub fn refuse_translation(&self) {
        *self.untranslatable.lock().unwrap() = true;
    }

    /// Makes the named operation fail from now on.
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().push(operation);
    }

    /// Notes whether `gate` is open each time speech or a sound starts.
    pub fn watch_gate(&self, gate: &ListenGate) {
        *self.gate.lock().unwrap() = Some(gate.clone());
    }

    pub fn gate_during_output(&self) -> Vec<bool> {
        self.gate_during_output.lock().unwrap().clone()
    }

    fn note_gate(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            self.gate_during_output.lock().unwrap().push(gate.is_open());
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn spoken(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Spoke { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn lights(&self) -> Vec<Light> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Light(light) => Some(light),
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &'static str, event: Event) -> Result<()> {
        if self.failing.lock().unwrap().contains(&operation) {
            bail!("{operation} unavailable");
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl Conversation for Fake {
    async fn classify(&self, utterance: &str) -> Result<Reply> {
        self.record("classify", Event::Classified(utterance.to_string()))?;
        let next = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Reply::new(next))
    }
}

#[async_trait]
impl Voice for Fake {
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<()> {
        self.note_gate();
        self.record(
            "speak",
            Event::Spoke {
                text: text.to_string(),
                locale: profile.locale.clone(),
            },
        )
    }
}

#[async_trait]
impl Translator for Fake {
    async fn translate(&self, text: &str, _from: &str, to: &str) -> Result<String> {
        self.record(
            "translate",
            Event::Translated {
                text: text.to_string(),
                to: to.to_string(),
            },
        )?;
        Ok(format!("[{to}] {text}"))
    }

    async fn is_translatable(&self, _from: &str, to: &str) -> Result<bool> {
        self.record("translatable", Event::TranslatableChecked(to.to_string()))?;
        Ok(!*self.untranslatable.lock().unwrap())
    }
}

#[async_trait]
impl ToneAnalyzer for Fake {
    async fn analyze_tone(&self, text: &str) -> Result<ToneReport> {
        self.record("tone", Event::ToneAnalyzed(text.to_string()))?;
        Ok(self.tone.lock().unwrap().clone())
    }
}

#[async_trait]
impl WeatherService for Fake {
    async fn fetch_weather(&self, zip: &str) -> Result<Observation> {
        self.record("weather", Event::Weather(zip.to_string()))?;
        Ok(Observation {
            temp: 72.0,
            feels_like: 70.0,
            wind_speed: Some(5.0),
            gust: None,
            pressure_desc: Some("steady".to_string()),
        })
    }

    async fn fetch_golf_weather(&self, zip: &str) -> Result<Option<String>> {
        self.record("golf", Event::GolfWeather(zip.to_string()))?;
        Ok(Some("Good".to_string()))
    }
}

#[async_trait]
impl NewsService for Fake {
    async fn fetch_top_news(&self) -> Result<Headlines> {
        self.record("news", Event::News)?;
        Ok(Headlines {
            source: "CNN".to_string(),
            titles: ["One", "Two", "Three", "Four"].map(String::from).to_vec(),
        })
    }
}

#[async_trait]
impl KeywordSearch for Fake {
    async fn search_keyword(&self, keyword: &str, limit: usize) -> Result<Vec<String>> {
        self.record(
            "search",
            Event::Searched {
                keyword: keyword.to_string(),
                limit,
            },
        )?;
        Ok(self.snippets.lock().unwrap().clone())
    }
}

#[async_trait]
impl Camera for Fake {
    async fn capture_image(&self) -> Result<PathBuf> {
        self.record("camera", Event::Captured)?;
        Ok(std::env::temp_dir().join("intentbot-fake-capture.jpg"))
    }
}

#[async_trait]
impl ImageClassifier for Fake {
    async fn classify_image(&self, _path: &Path) -> Result<Vec<ImageLabel>> {
        self.record("vision", Event::ClassifiedImage)?;
        Ok(self.labels.lock().unwrap().clone())
    }
}

#[async_trait]
impl Messenger for Fake {
    async fn upload_image(&self, _path: &Path) -> Result<String> {
        self.record("upload", Event::Uploaded)?;
        Ok("https://example.test/picture.jpg".to_string())
    }

    async fn send_message(&self, body: &str, media_url: &str) -> Result<()> {
        self.record(
            "message",
            Event::Messaged {
                body: body.to_string(),
                media_url: media_url.to_string(),
            },
        )
    }
}

#[async_trait]
impl Indicator for Fake {
    async fn set(&self, light: Light) -> Result<()> {
        self.record("light", Event::Light(light))
    }
}

#[async_trait]
impl SoundPlayer for Fake {
    async fn play(&self, path: &Path) -> Result<()> {
        self.note_gate();
        self.record("sound", Event::Played(path.to_path_buf()))
    }
}
