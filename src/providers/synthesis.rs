//! Clients for the external audio synthesis service.

use crate::music_store::MusicError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur when asking the synthesis service for audio.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response carries no audio location")]
    MissingAudio,

    #[error("Request timeout")]
    Timeout,
}

impl From<SynthesisError> for MusicError {
    fn from(err: SynthesisError) -> Self {
        MusicError::SynthesisFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SynthesisError::Timeout
        } else if err.is_decode() {
            SynthesisError::InvalidResponse(err.to_string())
        } else {
            SynthesisError::Connection(err.to_string())
        }
    }
}

/// A usable artifact reference returned by the synthesis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub audio_location: String,
    pub title: String,
    pub duration_seconds: Option<u32>,
}

/// An uploaded image to generate music from.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// Title for a text generation: the secondary prompt when one is given, otherwise the primary.
pub fn title_for_prompts(prompt: &str, secondary_prompt: Option<&str>) -> String {
    match secondary_prompt.map(str::trim) {
        Some(secondary) if !secondary.is_empty() => secondary.to_string(),
        _ => prompt.trim().to_string(),
    }
}

#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize_from_text(
        &self,
        prompt: &str,
        secondary_prompt: Option<&str>,
    ) -> Result<SynthesizedAudio, SynthesisError>;

    async fn synthesize_from_image(
        &self,
        image: &ImageInput,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

#[derive(Serialize)]
struct TextSynthesisRequest<'a> {
    prompt1: &'a str,
    prompt2: &'a str,
}

const AUDIO_LOCATION_KEYS: &[&str] = &["musicURL", "musicUrl", "music_url"];

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn duration_field(value: &Value) -> Option<u32> {
    value
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| *d >= 0.0)
        .map(|d| d.round() as u32)
}

/// The service nests the text result under `response`, image results are top level.
fn payload_of(body: &Value) -> &Value {
    match body.get("response") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    }
}

/// HTTP client for the synthesis service.
pub struct HttpSynthesisClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSynthesisClient {
    /// # Arguments
    /// * `base_url` - Base URL of the synthesis service (e.g., "http://localhost:8000")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn read_body(response: reqwest::Response) -> Result<Value, SynthesisError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Synthesis service returned {}: {}", status, message);
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize_from_text(
        &self,
        prompt: &str,
        secondary_prompt: Option<&str>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let url = format!("{}/generate_audio", self.base_url);
        info!("Requesting text synthesis from {}", url);
        let response = self
            .client
            .post(&url)
            .json(&TextSynthesisRequest {
                prompt1: prompt,
                prompt2: secondary_prompt.unwrap_or(""),
            })
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let payload = payload_of(&body);
        let audio_location =
            string_field(payload, AUDIO_LOCATION_KEYS).ok_or(SynthesisError::MissingAudio)?;
        debug!("Text synthesis produced {}", audio_location);

        Ok(SynthesizedAudio {
            audio_location,
            title: title_for_prompts(prompt, secondary_prompt),
            duration_seconds: duration_field(payload),
        })
    }

    async fn synthesize_from_image(
        &self,
        image: &ImageInput,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let url = format!("{}/generate_audio_from_image", self.base_url);
        info!(
            "Requesting image synthesis from {} for {}",
            url, image.file_name
        );
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        let body = Self::read_body(response).await?;
        let payload = payload_of(&body);
        let audio_location =
            string_field(payload, AUDIO_LOCATION_KEYS).ok_or(SynthesisError::MissingAudio)?;
        let title = string_field(payload, &["title"]).ok_or_else(|| {
            SynthesisError::InvalidResponse("image synthesis response has no title".to_string())
        })?;

        Ok(SynthesizedAudio {
            audio_location,
            title,
            duration_seconds: duration_field(payload),
        })
    }
}

/// Stand-in used when no synthesis service is configured. Produces deterministic
/// `example.com` locations without any network access.
#[derive(Default)]
pub struct PlaceholderSynthesisProvider;

#[async_trait]
impl SynthesisProvider for PlaceholderSynthesisProvider {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn synthesize_from_text(
        &self,
        prompt: &str,
        secondary_prompt: Option<&str>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        Ok(SynthesizedAudio {
            audio_location: format!(
                "https://example.com/fake_music_{}.mp3",
                prompt.trim().replace(' ', "_")
            ),
            title: title_for_prompts(prompt, secondary_prompt),
            duration_seconds: None,
        })
    }

    async fn synthesize_from_image(
        &self,
        image: &ImageInput,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let file_name = if image.file_name.trim().is_empty() {
            "image"
        } else {
            image.file_name.trim()
        };
        Ok(SynthesizedAudio {
            audio_location: format!(
                "https://example.com/fake_image_music_{}.mp3",
                file_name.replace(' ', "_")
            ),
            title: format!("Music generated from {}", file_name),
            duration_seconds: None,
        })
    }
}
