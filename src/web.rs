/*
 * @file web.rs
 * @brief Weather, news, search and messaging HTTP clients
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

//! HTTP collaborators: weather, news, keyword search and picture messaging.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::config::{MessagingConfig, NewsConfig, WeatherConfig};
use crate::services::{Headlines, KeywordSearch, Messenger, NewsService, Observation, WeatherService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const TWITTER_API: &str = "https://api.twitter.com";

const TWILIO_API: &str = "https://api.twilio.com";

/// Bounds accepted by the recent-search `max_results` parameter.
const SEARCH_PAGE_MIN: usize = 10;
const SEARCH_PAGE_MAX: usize = 100;

/// Field name the upload service expects the picture under.
const UPLOAD_FIELD: &str = "userPhoto";

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to build HTTP client")
}

#[derive(Deserialize)]
struct ObservationResponse {
    observation: ObservationBody,
}

#[derive(Deserialize)]
struct ObservationBody {
    temp: f64,
    feels_like: f64,
    wspd: Option<f64>,
    gust: Option<f64>,
    pressure_desc: Option<String>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecasts: Vec<ForecastHour>,
}

#[derive(Deserialize)]
struct ForecastHour {
    golf_category: Option<String>,
}

/// The Weather Company current observations and hourly golf forecast.
pub struct TwcWeather {
    client: reqwest::Client,
    config: WeatherConfig,
    api_key: String,
}

impl TwcWeather {
    pub fn new(config: &WeatherConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    fn location_url(&self, zip: &str, product: &str) -> String {
        format!(
            "{}/api/weather/v1/location/{zip}:4:US/{product}",
            self.config.host.trim_end_matches('/')
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "weather request");
        self.client
            .get(url)
            .query(&[
                ("units", self.config.units.as_str()),
                ("language", self.config.language.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .with_context(|| "Failed to reach the weather service")?
            .error_for_status()?
            .json()
            .await
            .with_context(|| "Failed to parse weather response")
    }
}

#[async_trait]
impl WeatherService for TwcWeather {
    async fn fetch_weather(&self, zip: &str) -> Result<Observation> {
        let response: ObservationResponse =
            self.get_json(self.location_url(zip, "observations.json")).await?;
        let body = response.observation;
        Ok(Observation {
            temp: body.temp,
            feels_like: body.feels_like,
            wind_speed: body.wspd,
            gust: body.gust,
            pressure_desc: body.pressure_desc,
        })
    }

    async fn fetch_golf_weather(&self, zip: &str) -> Result<Option<String>> {
        let response: ForecastResponse = self
            .get_json(self.location_url(zip, "forecast/hourly/48hour.json"))
            .await?;
        Ok(response
            .forecasts
            .into_iter()
            .next()
            .and_then(|hour| hour.golf_category)
            .filter(|category| !category.trim().is_empty()))
    }
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    title: Option<String>,
    source: Option<ArticleSource>,
}

#[derive(Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// NewsAPI top headlines for one source.
pub struct NewsApi {
    client: reqwest::Client,
    config: NewsConfig,
    api_key: String,
}

impl NewsApi {
    pub fn new(config: &NewsConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl NewsService for NewsApi {
    async fn fetch_top_news(&self) -> Result<Headlines> {
        let url = format!("{}/v2/top-headlines", self.config.host.trim_end_matches('/'));
        let response: NewsResponse = self
            .client
            .get(url)
            .query(&[("sources", self.config.source.as_str())])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .with_context(|| "Failed to reach the news service")?
            .error_for_status()?
            .json()
            .await
            .with_context(|| "Failed to parse news response")?;
        let source = response
            .articles
            .iter()
            .find_map(|article| article.source.as_ref()?.name.clone())
            .unwrap_or_else(|| self.config.source.clone());
        let titles = response
            .articles
            .into_iter()
            .filter_map(|article| article.title)
            .filter(|title| !title.trim().is_empty())
            .collect();
        Ok(Headlines { source, titles })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Deserialize)]
struct Tweet {
    text: String,
}

/// Twitter v2 recent search with an app bearer token.
pub struct TwitterSearch {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterSearch {
    pub fn new(bearer_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: TWITTER_API.to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl KeywordSearch for TwitterSearch {
    async fn search_keyword(&self, keyword: &str, limit: usize) -> Result<Vec<String>> {
        let page = limit.clamp(SEARCH_PAGE_MIN, SEARCH_PAGE_MAX).to_string();
        let response: SearchResponse = self
            .client
            .get(format!("{}/2/tweets/search/recent", self.base_url))
            .query(&[("query", keyword), ("max_results", page.as_str())])
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .with_context(|| "Failed to reach the search service")?
            .error_for_status()?
            .json()
            .await
            .with_context(|| "Failed to parse search response")?;
        Ok(response
            .data
            .into_iter()
            .take(limit)
            .map(|tweet| tweet.text)
            .collect())
    }
}

/// Uploads pictures to a file host and sends them as Twilio MMS.
pub struct TwilioMessenger {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    config: MessagingConfig,
}

impl TwilioMessenger {
    pub fn new(
        config: &MessagingConfig,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: TWILIO_API.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            config: config.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn upload_image(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "picture.jpg".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let url = self
            .client
            .post(&self.config.upload_url)
            .multipart(Form::new().part(UPLOAD_FIELD, part))
            .send()
            .await
            .with_context(|| "Failed to upload picture")?
            .error_for_status()?
            .text()
            .await?;
        let url = url.trim().to_string();
        if url.is_empty() {
            bail!("Upload service returned no picture URL");
        }
        Ok(url)
    }

    async fn send_message(&self, body: &str, media_url: &str) -> Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        self.client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", self.config.to_phone.as_str()),
                ("From", self.config.from_phone.as_str()),
                ("Body", body),
                ("MediaUrl", media_url),
            ])
            .send()
            .await
            .with_context(|| "Failed to reach Twilio")?
            .error_for_status()?;
        Ok(())
    }
}
