/*
 * @file ollama.rs
 * @brief Ollama-backed conversation, translation, tone and vision
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

//! Local LLM backend served by Ollama.
//!
//! One client covers four jobs: the conversation itself (with rolling
//! history), translation, tone analysis returning structured JSON, and
//! picture description through a multimodal model.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{OllamaConfig, RobotConfig};
use crate::dialog::language_by_code;
use crate::intent::IntentResolver;
use crate::services::{
    Conversation, ImageClassifier, ImageLabel, Reply, ToneAnalyzer, ToneReport, Translator,
};

/// Most history messages replayed with each conversation request.
const MAX_HISTORY: usize = 20;

/// Upper bound for a single generation request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for the liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Labels kept from a picture description.
const MAX_LABELS: usize = 2;

const TONE_INSTRUCTIONS: &str = "You are a tone analyzer. Score the user's text from 0.0 to 1.0 \
for every tone listed and reply with JSON only, shaped exactly like: \
{\"categories\":[\
{\"id\":\"emotion_tone\",\"name\":\"Emotion Tone\",\"tones\":[\
{\"name\":\"anger\",\"score\":0.0},{\"name\":\"disgust\",\"score\":0.0},\
{\"name\":\"fear\",\"score\":0.0},{\"name\":\"joy\",\"score\":0.0},\
{\"name\":\"sadness\",\"score\":0.0}]},\
{\"id\":\"language_tone\",\"name\":\"Language Tone\",\"tones\":[\
{\"name\":\"analytical\",\"score\":0.0},{\"name\":\"confident\",\"score\":0.0},\
{\"name\":\"tentative\",\"score\":0.0}]},\
{\"id\":\"social_tone\",\"name\":\"Social Tone\",\"tones\":[\
{\"name\":\"openness\",\"score\":0.0},{\"name\":\"conscientiousness\",\"score\":0.0},\
{\"name\":\"extraversion\",\"score\":0.0},{\"name\":\"agreeableness\",\"score\":0.0},\
{\"name\":\"emotional range\",\"score\":0.0}]}]}";

const VISION_INSTRUCTIONS: &str = "Name the most prominent things in this picture, most \
prominent first, using one or two plain words each. Reply with JSON only, shaped like \
{\"labels\":[\"dog\",\"ball\"]}.";

/// Chat message exchanged with the Ollama API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
    /// Base64-encoded images for multimodal models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            images: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct LabelsReply {
    #[serde(default)]
    labels: Vec<String>,
}

/// Ollama-backed implementation of the language collaborators.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    vision_model: String,
    system_prompt: String,
    history: Mutex<Vec<ChatMessage>>,
}

impl OllamaClient {
    /// Builds a client for the configured server and models.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &OllamaConfig, robot: &RobotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .with_context(|| "Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            system_prompt: system_prompt(&robot.name),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Ensures Ollama is running and both models are available.
    ///
    /// # Details
    /// Starts `ollama serve` when nothing answers on the configured URL, then
    /// pulls any missing model with the Ollama CLI. A missing vision model is
    /// not fatal because only the picture intent needs it.
    ///
    /// # Errors
    /// Returns an error if the service cannot be started or the chat model
    /// cannot be downloaded.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ensure_service().await?;
        self.ensure_model(&self.model).await?;
        if let Err(err) = self.ensure_model(&self.vision_model).await {
            warn!(model = %self.vision_model, error = %err, "vision model unavailable");
        }
        Ok(())
    }

    async fn ensure_service(&self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }
        info!(url = %self.base_url, "ollama not running, attempting to start");
        tokio::process::Command::new("ollama")
            .arg("serve")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .with_context(|| "Failed to start Ollama. Please install from https://ollama.ai")?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        if !self.is_running().await {
            bail!("Failed to start Ollama service. Please install Ollama from https://ollama.ai");
        }
        info!("ollama service is running");
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok()
    }

    async fn has_model(&self, model: &str) -> Result<bool> {
        let tags: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .with_context(|| "Failed to query Ollama models")?
            .json()
            .await
            .with_context(|| "Failed to parse Ollama response")?;
        Ok(tags.models.iter().any(|tag| tag.name == model))
    }

    async fn ensure_model(&self, model: &str) -> Result<()> {
        if self.has_model(model).await? {
            debug!(model, "model is ready");
            return Ok(());
        }
        info!(model, "model not found, downloading; this may take several minutes");
        let status = tokio::process::Command::new("ollama")
            .arg("pull")
            .arg(model)
            .status()
            .await
            .with_context(|| "Failed to execute ollama pull")?;
        if !status.success() {
            bail!("Failed to download model {model}");
        }
        info!(model, "model downloaded");
        Ok(())
    }

    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        format: Option<&'static str>,
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            format,
        };
        let response: ChatResponse = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .with_context(|| "Failed to send request to Ollama")?
            .error_for_status()?
            .json()
            .await
            .with_context(|| "Failed to parse Ollama response")?;
        Ok(response.message.content.trim().to_string())
    }

    fn remember(&self, user_text: &str, reply: &str) {
        if let Ok(mut history) = self.history.lock() {
            history.push(ChatMessage::new("user", user_text));
            history.push(ChatMessage::new("assistant", reply));
            let overflow = history.len().saturating_sub(MAX_HISTORY);
            history.drain(..overflow);
        }
    }
}

#[async_trait]
impl Conversation for OllamaClient {
    async fn classify(&self, utterance: &str) -> Result<Reply> {
        let mut messages = vec![ChatMessage::new("system", self.system_prompt.clone())];
        if let Ok(history) = self.history.lock() {
            messages.extend(history.iter().cloned());
        }
        messages.push(ChatMessage::new("user", utterance));
        let reply = self.chat(&self.model, messages, None).await?;
        self.remember(utterance, &reply);
        Ok(Reply::new(reply))
    }
}

#[async_trait]
impl Translator for OllamaClient {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let prompt = format!(
            "Translate the following text from {} to {}. Reply with the translation only.\n\n{}",
            language_label(from),
            language_label(to),
            text
        );
        let messages = vec![ChatMessage::new("user", prompt)];
        self.chat(&self.model, messages, None).await
    }

    async fn is_translatable(&self, from: &str, to: &str) -> Result<bool> {
        Ok(supports_pair(from, to))
    }
}

#[async_trait]
impl ToneAnalyzer for OllamaClient {
    async fn analyze_tone(&self, text: &str) -> Result<ToneReport> {
        let messages = vec![
            ChatMessage::new("system", TONE_INSTRUCTIONS),
            ChatMessage::new("user", text),
        ];
        let content = self.chat(&self.model, messages, Some("json")).await?;
        parse_tone_report(&content)
    }
}

#[async_trait]
impl ImageClassifier for OllamaClient {
    async fn classify_image(&self, path: &Path) -> Result<Vec<ImageLabel>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut message = ChatMessage::new("user", VISION_INSTRUCTIONS);
        message.images.push(STANDARD.encode(bytes));
        let content = self
            .chat(&self.vision_model, vec![message], Some("json"))
            .await?;
        parse_labels(&content)
    }
}

fn system_prompt(name: &str) -> String {
    format!(
        "You are {name}, a friendly desktop robot. Keep replies short and conversational \
         because every reply is spoken aloud. When the user asks for one of the actions \
         below, answer with one short sentence that contains the quoted trigger phrase \
         word for word. Never use a trigger phrase otherwise.\n{}",
        IntentResolver::new().phrase_catalog()
    )
}

fn language_label(code: &str) -> String {
    match language_by_code(code) {
        Some(language) => language.display_name(),
        None if code == "en" => "English".to_string(),
        None => code.to_string(),
    }
}

/// Whether both codes are languages the assistant can speak.
fn supports_pair(from: &str, to: &str) -> bool {
    let known = |code: &str| code == "en" || language_by_code(code).is_some();
    from != to && known(from) && known(to)
}

/// Models sometimes wrap JSON in a markdown fence even in JSON mode.
fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_tone_report(content: &str) -> Result<ToneReport> {
    serde_json::from_str(strip_fence(content)).with_context(|| "Tone reply was not valid JSON")
}

fn parse_labels(content: &str) -> Result<Vec<ImageLabel>> {
    let reply: LabelsReply =
        serde_json::from_str(strip_fence(content)).with_context(|| "Label reply was not valid JSON")?;
    Ok(reply
        .labels
        .into_iter()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .take(MAX_LABELS)
        .map(|label| ImageLabel { label })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_json;

    fn client(url: &str) -> OllamaClient {
        let config = OllamaConfig {
            url: format!("{url}/"),
            ..OllamaConfig::default()
        };
        OllamaClient::new(&config, &RobotConfig::default()).unwrap()
    }

    #[test]
    fn system_prompt_lists_trigger_phrases() {
        let prompt = system_prompt("Watson");
        assert!(prompt.starts_with("You are Watson"));
        assert!(prompt.contains("\"the current weather at\""));
        assert!(prompt.contains("\"goodbye\""));
    }

    #[test]
    fn translation_pairs_need_known_languages() {
        assert!(supports_pair("en", "fr"));
        assert!(supports_pair("es", "en"));
        assert!(!supports_pair("en", "en"));
        assert!(!supports_pair("en", "tlh"));
        assert_eq!(language_label("pt"), "Portuguese");
        assert_eq!(language_label("en"), "English");
    }

    #[test]
    fn tone_reply_parses_with_or_without_fence() {
        let raw = r#"{"categories":[{"id":"emotion_tone","name":"Emotion Tone","tones":[{"name":"joy","score":0.8}]}]}"#;
        let fenced = format!("```json\n{raw}\n```");
        assert_eq!(parse_tone_report(raw).unwrap(), parse_tone_report(&fenced).unwrap());
        assert!(parse_tone_report("I feel happy").is_err());
    }

    #[test]
    fn labels_are_normalized_and_capped() {
        let labels = parse_labels(r#"{"labels":[" Cat ","","Sofa","Lamp"]}"#).unwrap();
        assert_eq!(
            labels,
            vec![
                ImageLabel { label: "cat".into() },
                ImageLabel { label: "sofa".into() },
            ]
        );
        assert!(parse_labels("{}").unwrap().is_empty());
    }

    #[test]
    fn request_omits_empty_optional_fields() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage::new("user", "hi")],
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[tokio::test]
    async fn conversation_keeps_history() {
        let (url, request) =
            serve_json(200, r#"{"message":{"role":"assistant","content":" Hello there! "}}"#).await;
        let ollama = client(&url);
        let reply = ollama.classify("hi").await.unwrap();
        assert_eq!(reply.description, "Hello there!");

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /api/chat"));
        assert!(request.contains("\"stream\":false"));
        assert!(request.contains("You are Watson"));
        let history = ollama.history.lock().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello there!");
    }

    #[tokio::test]
    async fn history_is_capped() {
        let ollama = client("http://127.0.0.1:9");
        for i in 0..15 {
            ollama.remember(&format!("q{i}"), &format!("a{i}"));
        }
        let history = ollama.history.lock().unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].content, "q5");
    }

    #[tokio::test]
    async fn tone_request_asks_for_json() {
        let body = r#"{"message":{"role":"assistant","content":"{\"categories\":[{\"id\":\"emotion_tone\",\"name\":\"Emotion Tone\",\"tones\":[{\"name\":\"anger\",\"score\":0.7}]}]}"}}"#;
        let (url, request) = serve_json(200, body).await;
        let report = client(&url).analyze_tone("so annoyed").await.unwrap();
        assert_eq!(report.categories[0].tones[0].name, "anger");
        assert!(request.await.unwrap().contains("\"format\":\"json\""));
    }

    #[tokio::test]
    async fn server_errors_surface() {
        let (url, _request) = serve_json(500, r#"{"error":"boom"}"#).await;
        assert!(client(&url).classify("hi").await.is_err());
    }
}
