//! Stable Audio API client

use async_trait::async_trait;
use longplay_common::{Error, Result};
use std::time::Duration;
use tracing::debug;

use super::{GeneratedAudio, MusicProvider, ProviderCaps, STABLE_AUDIO_CAPS};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Music generation via Stability AI's Stable Audio text-to-audio API.
///
/// Flat rate per generation with a hard 190 second ceiling. Best at
/// atmospheric textures and transitional material, which is exactly
/// what the non-hero slots ask for.
pub struct StableAudioProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl StableAudioProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl MusicProvider for StableAudioProvider {
    fn caps(&self) -> &ProviderCaps {
        &STABLE_AUDIO_CAPS
    }

    async fn generate(&self, prompt: &str, duration_ms: u64) -> Result<GeneratedAudio> {
        let url = format!(
            "{}/v2beta/audio/stable-audio-2/text-to-audio",
            self.base_url.trim_end_matches('/')
        );
        // The API takes whole seconds
        let duration_seconds = duration_ms / 1000;

        debug!(duration_seconds, "requesting Stable Audio generation");

        let form = reqwest::multipart::Form::new()
            .text("prompt", prompt.to_string())
            .text("duration", duration_seconds.to_string())
            .text("model", self.model.clone())
            .text("output_format", "mp3");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "audio/*")
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("stable_audio: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::PAYMENT_REQUIRED
        {
            return Err(Error::QuotaExceeded(format!(
                "stable_audio returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "stable_audio returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("stable_audio: {}", e)))?;

        Ok(GeneratedAudio {
            bytes: bytes.to_vec(),
            reported_duration_ms: Some(duration_seconds * 1000),
            reported_bpm: None,
        })
    }
}
