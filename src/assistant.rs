/*
 * @file assistant.rs
 * @brief Runtime wiring for the intentbot voice assistant
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

//! Runtime wiring: configuration, collaborators, listener and dispatcher.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{load_app_config, AppConfig, Credentials};
use crate::device::{CommandCamera, WavPlayer};
use crate::dispatcher::Dispatcher;
use crate::listener::{spawn_console_listener, spawn_microphone_listener, ListenGate};
use crate::ollama::OllamaClient;
use crate::pico::indicator_from_config;
use crate::services::{
    Headlines, KeywordSearch, Messenger, NewsService, Observation, Services, WeatherService,
};
use crate::speech::SayVoice;
use crate::web::{NewsApi, TwcWeather, TwilioMessenger, TwitterSearch};

/// Utterances that may wait while a turn is in progress.
const UTTERANCE_QUEUE: usize = 16;

/// How the assistant is launched.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub config_path: PathBuf,
    /// Read typed lines from stdin instead of the microphone.
    pub text_mode: bool,
}

/// Runs the assistant until the user says goodbye or presses Ctrl-C.
///
/// # Details
/// Loads configuration and credentials, makes sure Ollama is serving the
/// configured models, builds every collaborator and then drains the
/// utterance queue through the [`Dispatcher`].
///
/// # Arguments
/// * `options` - Configuration path and input mode.
///
/// # Errors
/// Returns an error if Ollama cannot be prepared or the listener thread
/// cannot be started.
pub async fn run_voice_assistant(options: RunOptions) -> Result<()> {
    let config = load_app_config(&options.config_path);
    let credentials = Credentials::from_env();

    let ollama = Arc::new(OllamaClient::new(&config.ollama, &config.robot)?);
    ollama.ensure_ready().await?;
    let services = build_services(&config, &credentials, ollama)?;

    let gate = ListenGate::new();
    let (tx, mut rx) = mpsc::channel(UTTERANCE_QUEUE);
    if options.text_mode {
        info!("reading utterances from stdin");
        spawn_console_listener(gate.clone(), tx)?;
    } else {
        spawn_microphone_listener(config.listen.clone(), gate.clone(), tx)?;
    }

    let mut dispatcher = Dispatcher::new(&config, services, gate);
    dispatcher.greet().await;
    let interrupted = tokio::select! {
        () = dispatcher.run(&mut rx) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("interrupt received");
        dispatcher.farewell().await;
    }
    info!("assistant stopped");
    Ok(())
}

/// Builds the production collaborators.
///
/// # Details
/// Ollama covers conversation, translation, tone and vision. Web services
/// without an API key are replaced by [`Unconfigured`] so the matching
/// requests end in an apology. Picture messaging is only enabled when the
/// Twilio account, both phone numbers and the upload URL are all present.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built.
pub fn build_services(
    config: &AppConfig,
    credentials: &Credentials,
    ollama: Arc<OllamaClient>,
) -> Result<Services> {
    let weather: Arc<dyn WeatherService> = match &credentials.twc_api_key {
        Some(key) => Arc::new(TwcWeather::new(&config.weather, key.as_str())?),
        None => Arc::new(Unconfigured::missing("weather", "TWC_API_KEY")),
    };
    let news: Arc<dyn NewsService> = match &credentials.newsapi_key {
        Some(key) => Arc::new(NewsApi::new(&config.news, key.as_str())?),
        None => Arc::new(Unconfigured::missing("news", "NEWSAPI_KEY")),
    };
    let search: Arc<dyn KeywordSearch> = match &credentials.twitter_bearer_token {
        Some(token) => Arc::new(TwitterSearch::new(token.as_str())?),
        None => Arc::new(Unconfigured::missing("keyword search", "TWITTER_BEARER_TOKEN")),
    };
    Ok(Services {
        conversation: ollama.clone(),
        voice: Arc::new(SayVoice::new(&config.speech)),
        translator: ollama.clone(),
        tone: ollama.clone(),
        weather,
        news,
        search,
        camera: Arc::new(CommandCamera::new(&config.camera)),
        vision: ollama,
        messenger: build_messenger(config, credentials)?,
        indicator: indicator_from_config(&config.serial),
        sounds: Arc::new(WavPlayer),
    })
}

fn build_messenger(
    config: &AppConfig,
    credentials: &Credentials,
) -> Result<Option<Arc<dyn Messenger>>> {
    let messaging = &config.messaging;
    let (Some(sid), Some(token)) = (
        &credentials.twilio_account_sid,
        &credentials.twilio_auth_token,
    ) else {
        info!("twilio credentials missing, pictures will not be sent");
        return Ok(None);
    };
    if [&messaging.to_phone, &messaging.from_phone, &messaging.upload_url]
        .iter()
        .any(|value| value.trim().is_empty())
    {
        warn!("messaging phones or upload url missing, pictures will not be sent");
        return Ok(None);
    }
    let messenger = TwilioMessenger::new(messaging, sid.as_str(), token.as_str())?;
    Ok(Some(Arc::new(messenger)))
}

/// Stand-in for a web service whose credential is not set.
struct Unconfigured {
    service: &'static str,
    variable: &'static str,
}

impl Unconfigured {
    fn missing(service: &'static str, variable: &'static str) -> Self {
        warn!(service, variable, "credential missing, requests will fail");
        Self { service, variable }
    }

    fn fail<T>(&self) -> Result<T> {
        bail!("{} is not configured, set {}", self.service, self.variable)
    }
}

#[async_trait]
impl WeatherService for Unconfigured {
    async fn fetch_weather(&self, _zip: &str) -> Result<Observation> {
        self.fail()
    }

    async fn fetch_golf_weather(&self, _zip: &str) -> Result<Option<String>> {
        self.fail()
    }
}

#[async_trait]
impl NewsService for Unconfigured {
    async fn fetch_top_news(&self) -> Result<Headlines> {
        self.fail()
    }
}

#[async_trait]
impl KeywordSearch for Unconfigured {
    async fn search_keyword(&self, _keyword: &str, _limit: usize) -> Result<Vec<String>> {
        self.fail()
    }
}
