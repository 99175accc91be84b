/*
 * @file dispatcher.rs
 * @brief Intent dispatch and turn handling
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

//! Turn-by-turn intent dispatch.
//!
//! The dispatcher consumes one utterance at a time. It first checks whether
//! the dialog is collecting a follow-up value, then (for requests carrying the
//! attention word) asks the conversation backend for a reply, speaks it and
//! runs the intent the reply resolves to. Every external call goes through
//! [`Services`]; failures become a spoken apology and the turn ends normally.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SoundConfig, ThresholdConfig, TimingConfig};
use crate::dialog::{find_language, Awaiting, DialogState, Language, ZipFollowUp};
use crate::intent::{Intent, IntentResolver};
use crate::listener::ListenGate;
use crate::sentiment::{sanitize, SentimentAggregator, SentimentOutcome};
use crate::services::{Color, Headlines, Light, Observation, Services, ToneReport, VoiceProfile};
use crate::zip::ZipWordParser;

/// Language every utterance is translated from.
const SOURCE_LANGUAGE: &str = "en";

/// Most headlines read out per news request.
const MAX_HEADLINES: usize = 3;

const TRANSLATE_PROMPT: &str = "Please, tell me the phrase to translate.";
const ZIP_PROMPT: &str = "Please, tell me the zip code.";
const WAKE_UP: &str = "Okay!, I'm up now and ready to go again!";
const NOT_ENOUGH_TWEETS: &str = "Sorry!, Not enough tweets collected to perform sentiment analysis";
const NOTHING_SEEN: &str = "I couldn't make out anything in that picture.";
const NO_CLEAR_TONE: &str = "I couldn't pick out a clear tone in what you said.";
const UNKNOWN_LANGUAGE: &str = "Sorry, I don't know how to translate to that language.";

const CONVERSATION_APOLOGY: &str = "Sorry, I couldn't reach my conversation service.";
const WEATHER_APOLOGY: &str = "Sorry, cannot get the weather right now!";
const GOLF_APOLOGY: &str = "Sorry, cannot get the golfing conditions right now!";
const NEWS_APOLOGY: &str = "Sorry, cannot get the news right now!";
const TRANSLATE_APOLOGY: &str = "Sorry, I couldn't translate that right now.";
const TONE_APOLOGY: &str = "Sorry, I couldn't analyze your tone right now.";
const SENTIMENT_APOLOGY: &str = "Sorry, I couldn't analyze the sentiment right now.";
const CAMERA_APOLOGY: &str = "Sorry, I couldn't take a picture right now.";
const MESSAGE_APOLOGY: &str = "Sorry, I couldn't send the picture right now.";

/// How a single utterance was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Not addressed to the assistant, or the assistant has shut down.
    Ignored,
    Completed,
    /// The goodbye intent ran; no further turns are processed.
    Shutdown,
}

/// Owns the dialog state and drives collaborators for each turn.
pub struct Dispatcher {
    services: Services,
    state: DialogState,
    sentiment: SentimentAggregator,
    resolver: IntentResolver,
    zip: ZipWordParser,
    robot_name: String,
    voice: VoiceProfile,
    thresholds: ThresholdConfig,
    units: String,
    sounds: SoundConfig,
    timing: TimingConfig,
    gate: ListenGate,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, services: Services, gate: ListenGate) -> Self {
        Self {
            services,
            state: DialogState::new(),
            sentiment: SentimentAggregator::new(config.thresholds),
            resolver: IntentResolver::new(),
            zip: ZipWordParser::new(config.weather.default_zip.clone()),
            robot_name: config.robot.name.clone(),
            voice: config.robot.voice(),
            thresholds: config.thresholds,
            units: config.weather.units.clone(),
            sounds: config.sounds.clone(),
            timing: config.timing.clone(),
            gate,
        }
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn sentiment(&self) -> &SentimentAggregator {
        &self.sentiment
    }

    /// Introduces the assistant and lights the listening indicator.
    pub async fn greet(&self) {
        self.light(Light::Listening).await;
        let name = &self.robot_name;
        self.say(&format!(
            "Hello! I'm {name}.  Try saying, {name}, followed by what you want.  \
             To get help say, {name}, help me."
        ))
        .await;
    }

    /// Says goodbye after an interrupt and stops accepting turns.
    pub async fn farewell(&mut self) {
        let name = &self.robot_name;
        self.say(&format!(
            "Okay! I caught the signal. It's been fun!  This is {name} saying, Goodbye!"
        ))
        .await;
        self.light(Light::Off).await;
        self.state.halt();
    }

    /// Processes queued utterances in arrival order until shutdown or until
    /// the queue closes.
    pub async fn run(&mut self, utterances: &mut mpsc::Receiver<String>) {
        while let Some(utterance) = utterances.recv().await {
            if self.handle_utterance(&utterance).await == TurnOutcome::Shutdown {
                info!("assistant shut down");
                break;
            }
        }
    }

    /// Handles one utterance end to end.
    ///
    /// # Details
    /// Completed turns always finish with the indicator back on
    /// [`Light::Listening`], whatever happened along the way.
    ///
    /// # Arguments
    /// * `utterance` - Raw transcribed text.
    ///
    /// # Returns
    /// * `TurnOutcome` - Whether the turn was ignored, completed or shut down.
    pub async fn handle_utterance(&mut self, utterance: &str) -> TurnOutcome {
        if self.state.is_halted() {
            debug!(utterance, "ignoring utterance after shutdown");
            return TurnOutcome::Ignored;
        }
        let outcome = self.run_turn(utterance.trim()).await;
        if outcome == TurnOutcome::Completed {
            self.light(Light::Listening).await;
        }
        outcome
    }

    async fn run_turn(&mut self, utterance: &str) -> TurnOutcome {
        let mut message = Cow::Borrowed(utterance);
        match self.state.take_awaiting() {
            Awaiting::None => {}
            Awaiting::Language => {
                self.choose_language(utterance).await;
                return TurnOutcome::Completed;
            }
            Awaiting::TranslationPhrase => {
                self.translate_phrase(utterance).await;
                return TurnOutcome::Completed;
            }
            Awaiting::TonePhrase => {
                self.analyze_phrase(utterance).await;
                return TurnOutcome::Completed;
            }
            Awaiting::SentimentKeyword => {
                self.search_sentiment(&utterance.to_lowercase()).await;
                return TurnOutcome::Completed;
            }
            Awaiting::Zip(follow_up) => {
                let zip = self.zip.parse(utterance);
                info!(%zip, ?follow_up, "collected zip code");
                self.state.remember_zip(zip.clone());
                match follow_up {
                    ZipFollowUp::Weather => {
                        self.report_weather(&zip).await;
                        return TurnOutcome::Completed;
                    }
                    ZipFollowUp::GolfWeather => {
                        self.report_golf_weather(&zip).await;
                        return TurnOutcome::Completed;
                    }
                    ZipFollowUp::Converse => {
                        message = Cow::Owned(format!("{} {}", self.robot_name, zip));
                    }
                }
            }
        }

        let Some(request) = strip_attention(&message, &self.robot_name) else {
            debug!(utterance, "not addressed to the assistant");
            return TurnOutcome::Ignored;
        };
        self.light(Light::Speaking).await;
        let reply = match self.services.conversation.classify(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "conversation request failed");
                self.say(CONVERSATION_APOLOGY).await;
                return TurnOutcome::Completed;
            }
        };
        let Some(intent) = self.resolver.resolve(&reply.description) else {
            debug!(request = %request, "conversation returned nothing to act on");
            return TurnOutcome::Completed;
        };
        info!(%intent, request = %request, "resolved intent");
        self.say(&reply.description).await;
        self.execute(intent, &reply.description).await
    }

    async fn execute(&mut self, intent: Intent, description: &str) -> TurnOutcome {
        match intent {
            Intent::SentimentSearch => self.state.expect(Awaiting::SentimentKeyword),
            Intent::ToneAnalysis => self.state.expect(Awaiting::TonePhrase),
            Intent::CollectZip => self.state.expect(Awaiting::Zip(ZipFollowUp::Converse)),
            Intent::CollectLanguage => self.state.expect(Awaiting::Language),
            Intent::Weather => match self.state.last_zip().map(str::to_owned) {
                Some(zip) => self.report_weather(&zip).await,
                None => self.collect_zip(ZipFollowUp::Weather).await,
            },
            Intent::GolfWeather => match self.state.last_zip().map(str::to_owned) {
                Some(zip) => self.report_golf_weather(&zip).await,
                None => self.collect_zip(ZipFollowUp::GolfWeather).await,
            },
            Intent::News => self.report_news().await,
            Intent::TranslateSetup => match find_language(description) {
                Some(language) => self.arm_translation(language).await,
                None => warn!(description, "translation requested without a known language"),
            },
            Intent::TakePicture => self.take_picture().await,
            Intent::Sleep => self.sleep().await,
            Intent::DiscoParty => self.disco_party().await,
            Intent::Goodbye => {
                self.light(Light::Off).await;
                self.state.halt();
                return TurnOutcome::Shutdown;
            }
            Intent::TranslatePhrase | Intent::None => {}
        }
        TurnOutcome::Completed
    }

    async fn collect_zip(&mut self, follow_up: ZipFollowUp) {
        self.say(ZIP_PROMPT).await;
        self.state.expect(Awaiting::Zip(follow_up));
    }

    /// Arms translation for the language the user named.
    ///
    /// # Details
    /// The answer is also passed to the conversation backend so its history
    /// keeps the exchange, and its reply is spoken. The language itself comes
    /// from the user's words, whatever the reply says.
    async fn choose_language(&mut self, utterance: &str) {
        let Some(language) = find_language(utterance) else {
            info!(utterance, "no known language named");
            self.say(UNKNOWN_LANGUAGE).await;
            return;
        };
        self.light(Light::Speaking).await;
        match self.services.conversation.classify(utterance).await {
            Ok(reply) => self.say(&reply.description).await,
            Err(err) => warn!(error = %err, "conversation request failed"),
        }
        self.arm_translation(language).await;
    }

    /// Selects the target language and waits for the phrase to translate.
    async fn arm_translation(&mut self, language: Language) {
        match self
            .services
            .translator
            .is_translatable(SOURCE_LANGUAGE, language.code)
            .await
        {
            Ok(true) => {
                self.state.set_target_language(language);
                self.say(TRANSLATE_PROMPT).await;
                self.state.expect(Awaiting::TranslationPhrase);
            }
            Ok(false) => {
                info!(language = language.code, "translation pair unsupported");
                self.say(&format!(
                    "I cannot translate between English and {}.",
                    language.display_name()
                ))
                .await;
            }
            Err(err) => {
                warn!(error = %err, "translation capability check failed");
                self.say(TRANSLATE_APOLOGY).await;
            }
        }
    }

    async fn translate_phrase(&mut self, phrase: &str) {
        let language = self.state.target_language();
        match self
            .services
            .translator
            .translate(phrase, SOURCE_LANGUAGE, language.code)
            .await
        {
            Ok(translation) => self.say_as(&translation, &language.voice()).await,
            Err(err) => {
                warn!(error = %err, language = language.code, "translation failed");
                self.say(TRANSLATE_APOLOGY).await;
            }
        }
    }

    async fn analyze_phrase(&mut self, phrase: &str) {
        match self.services.tone.analyze_tone(phrase).await {
            Ok(report) => {
                let spoken = describe_tone(&report, self.thresholds.tone)
                    .unwrap_or_else(|| NO_CLEAR_TONE.to_string());
                self.say(&spoken).await;
            }
            Err(err) => {
                warn!(error = %err, "tone analysis failed");
                self.say(TONE_APOLOGY).await;
            }
        }
    }

    async fn search_sentiment(&mut self, keyword: &str) {
        let snippets = match self
            .services
            .search
            .search_keyword(keyword, self.thresholds.max_tweets)
            .await
        {
            Ok(snippets) => snippets,
            Err(err) => {
                warn!(error = %err, keyword, "keyword search failed");
                self.say(SENTIMENT_APOLOGY).await;
                return;
            }
        };
        for snippet in &snippets {
            self.sentiment.ingest(sanitize(snippet));
        }
        if self.sentiment.has_enough() {
            self.say(&format!("Analyzing tone of {} tweets", self.sentiment.len()))
                .await;
        }
        match self.sentiment.aggregate(self.services.tone.as_ref()).await {
            Ok(SentimentOutcome::InsufficientData { count }) => {
                info!(count, keyword, "not enough snippets for sentiment");
                self.say(NOT_ENOUGH_TWEETS).await;
            }
            Ok(SentimentOutcome::LowConfidence) => {
                debug!(keyword, "no confident emotion");
            }
            Ok(SentimentOutcome::Emotion { label, color, .. }) => {
                self.say(&format!("Current emotion around {keyword} is {label}"))
                    .await;
                if let Some(color) = color {
                    self.light(Light::Shine(color)).await;
                    tokio::time::sleep(Duration::from_secs(self.timing.emotion_hold_secs)).await;
                }
            }
            Err(err) => {
                warn!(error = %err, keyword, "sentiment analysis failed");
                self.say(SENTIMENT_APOLOGY).await;
            }
        }
    }

    async fn report_weather(&self, zip: &str) {
        match self.services.weather.fetch_weather(zip).await {
            Ok(observation) => {
                self.say(&describe_observation(&observation, &self.units)).await;
            }
            Err(err) => {
                warn!(error = %err, zip, "weather request failed");
                self.say(WEATHER_APOLOGY).await;
            }
        }
    }

    async fn report_golf_weather(&self, zip: &str) {
        match self.services.weather.fetch_golf_weather(zip).await {
            Ok(Some(category)) if !category.trim().is_empty() => {
                self.say(&format!("The current golfing condition is {category}."))
                    .await;
            }
            Ok(_) => {
                self.say(
                    "The current golfing condition is not known at this time. \
                     It may not be the best time to play.",
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, zip, "golf forecast request failed");
                self.say(GOLF_APOLOGY).await;
            }
        }
    }

    async fn report_news(&self) {
        match self.services.news.fetch_top_news().await {
            Ok(headlines) => self.say(&describe_headlines(&headlines)).await,
            Err(err) => {
                warn!(error = %err, "news request failed");
                self.say(NEWS_APOLOGY).await;
            }
        }
    }

    async fn take_picture(&self) {
        self.play(&self.sounds.camera_shutter).await;
        let path = match self.services.camera.capture_image().await {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "camera capture failed");
                self.say(CAMERA_APOLOGY).await;
                return;
            }
        };
        let _capture = CaptureGuard::new(path.clone());
        let labels = match self.services.vision.classify_image(&path).await {
            Ok(labels) => labels,
            Err(err) => {
                warn!(error = %err, "image classification failed");
                self.say(CAMERA_APOLOGY).await;
                return;
            }
        };
        if labels.is_empty() {
            self.say(NOTHING_SEEN).await;
            return;
        }
        let seen: Vec<&str> = labels.iter().map(|label| label.label.as_str()).collect();
        let description = format!("I believe I see a {}", seen.join(" or a "));
        self.say(&description).await;
        if let Err(err) = self.deliver_picture(&path, &description).await {
            warn!(error = %err, "picture delivery failed");
            self.say(MESSAGE_APOLOGY).await;
        }
    }

    async fn deliver_picture(&self, path: &Path, description: &str) -> anyhow::Result<()> {
        let Some(messenger) = &self.services.messenger else {
            debug!("no messenger configured, keeping picture local");
            return Ok(());
        };
        let url = messenger.upload_image(path).await?;
        messenger.send_message(description, &url).await
    }

    async fn sleep(&self) {
        self.gate.pause();
        self.play(&self.sounds.snore).await;
        tokio::time::sleep(Duration::from_secs(self.timing.sleep_secs)).await;
        self.say(WAKE_UP).await;
        self.gate.resume();
    }

    async fn disco_party(&self) {
        self.gate.pause();
        let flashes = disco_colors(self.timing.disco_flashes);
        let interval = Duration::from_millis(self.timing.disco_interval_ms);
        let indicator = self.services.indicator.clone();
        let show = async move {
            for color in flashes {
                if let Err(err) = indicator.set(Light::Shine(color)).await {
                    debug!(error = %err, "disco flash failed");
                }
                tokio::time::sleep(interval).await;
            }
        };
        tokio::join!(self.play(&self.sounds.disco_party), show);
        self.gate.resume();
    }

    async fn say(&self, text: &str) {
        self.say_as(text, &self.voice).await;
    }

    async fn say_as(&self, text: &str, profile: &VoiceProfile) {
        if text.trim().is_empty() {
            return;
        }
        let _muted = self.gate.mute();
        if let Err(err) = self.services.voice.speak(text, profile).await {
            warn!(error = %err, "speech failed");
        }
    }

    async fn light(&self, light: Light) {
        if let Err(err) = self.services.indicator.set(light).await {
            debug!(error = %err, ?light, "indicator update failed");
        }
    }

    async fn play(&self, path: &Path) {
        let _muted = self.gate.mute();
        if let Err(err) = self.services.sounds.play(path).await {
            warn!(error = %err, path = %path.display(), "sound effect failed");
        }
    }
}

/// Removes a captured picture once the turn is done with it.
struct CaptureGuard(PathBuf);

impl CaptureGuard {
    fn new(path: PathBuf) -> Self {
        Self(path)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}

/// Returns the request following the attention word, if the utterance
/// starts with it.
///
/// # Details
/// Matching is case-insensitive and must end on a word boundary, so
/// `"Watsonville"` does not address `"Watson"`. Names outside ASCII compare
/// through their lowercase forms. Punctuation right after the name is
/// dropped.
pub fn strip_attention(utterance: &str, name: &str) -> Option<String> {
    let trimmed = utterance.trim_start();
    if name.is_empty() {
        return None;
    }
    let mut utterance_chars = trimmed.char_indices();
    let mut end = 0;
    for expected in name.chars() {
        let (index, found) = utterance_chars.next()?;
        if !found.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        end = index + found.len_utf8();
    }
    let rest = &trimmed[end..];
    if rest.chars().next().is_some_and(char::is_alphanumeric) {
        return None;
    }
    let request = rest
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ':'))
        .trim_end();
    Some(request.to_string())
}

/// Speaks the categories whose tones reach `threshold`.
fn describe_tone(report: &ToneReport, threshold: f64) -> Option<String> {
    let mut spoken = String::from("Your tone when speaking is as follows, ");
    let mut any = false;
    for category in &report.categories {
        let tones: Vec<&str> = category
            .tones
            .iter()
            .filter(|tone| tone.score >= threshold)
            .map(|tone| tone.name.as_str())
            .collect();
        if tones.is_empty() {
            continue;
        }
        any = true;
        spoken.push_str(&format!("{}, {}, ", category.name, tones.join(", ")));
    }
    any.then(|| spoken.trim_end().trim_end_matches(',').to_string())
}

fn describe_observation(observation: &Observation, units: &str) -> String {
    let (degrees, speed) = match units {
        "m" => ("celsius", "kilometers per hour"),
        _ => ("fahrenheit", "miles per hour"),
    };
    let mut spoken = format!(
        "The current temperature is {} degrees {degrees}",
        observation.temp
    );
    match &observation.pressure_desc {
        Some(pressure) => spoken.push_str(&format!(" and the pressure is {pressure}.")),
        None => spoken.push('.'),
    }
    spoken.push_str(&format!("  It feels like {}", observation.feels_like));
    match observation.wind_speed {
        Some(wind) => spoken.push_str(&format!(", and the wind is blowing at {wind} {speed}.")),
        None => spoken.push('.'),
    }
    if let Some(gust) = observation.gust {
        spoken.push_str(&format!("  And gusting to {gust} {speed}."));
    }
    spoken
}

fn describe_headlines(headlines: &Headlines) -> String {
    let mut spoken = format!("Here is the top news for today from {}.  ", headlines.source);
    for title in headlines.titles.iter().take(MAX_HEADLINES) {
        spoken.push_str(&format!("{}.  ", title.trim_end_matches('.')));
    }
    spoken.trim_end().to_string()
}

fn disco_colors(count: u32) -> Vec<Color> {
    let mut rng = rand::thread_rng();
    (0..count)
        .filter_map(|_| Color::PALETTE.choose(&mut rng).copied())
        .collect()
}
