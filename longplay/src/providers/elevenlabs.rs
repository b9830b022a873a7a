//! ElevenLabs Music API client

use async_trait::async_trait;
use longplay_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{GeneratedAudio, MusicProvider, ProviderCaps, ELEVENLABS_CAPS};

/// Generation can take a while for 5 minute tracks
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct ComposeRequest<'a> {
    prompt: &'a str,
    music_length_ms: u64,
}

/// Music generation via the ElevenLabs Music API.
///
/// Metered pricing (~$0.30/min), ceiling of 5 minutes per track. Used
/// for hero slots where length and structure matter.
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MusicProvider for ElevenLabsProvider {
    fn caps(&self) -> &ProviderCaps {
        &ELEVENLABS_CAPS
    }

    async fn generate(&self, prompt: &str, duration_ms: u64) -> Result<GeneratedAudio> {
        let url = format!("{}/v1/music", self.base_url.trim_end_matches('/'));

        debug!(duration_ms, "requesting ElevenLabs composition");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&ComposeRequest {
                prompt,
                music_length_ms: duration_ms,
            })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("elevenlabs: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::PAYMENT_REQUIRED
        {
            return Err(Error::QuotaExceeded(format!(
                "elevenlabs returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "elevenlabs returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("elevenlabs: {}", e)))?;

        Ok(GeneratedAudio {
            bytes: bytes.to_vec(),
            // The API returns the rendered length, not a report header;
            // callers measure the real duration after decode.
            reported_duration_ms: Some(duration_ms),
            reported_bpm: None,
        })
    }
}
