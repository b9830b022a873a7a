//! Planning oracle: the external judgment call
//!
//! The oracle is an LLM acting as curator: given the concept, the
//! candidate library tracks, and the duration target, it returns a
//! proposed slot sequence mixing reuse with new generation. This
//! module defines the request/response contract and the live
//! chat-completions client; the oracle's creative judgment is opaque
//! and may be non-deterministic, so everything downstream treats the
//! proposal as untrusted input and validates it.

use async_trait::async_trait;
use longplay_common::model::{TrackMetadata, TrackSlot};
use longplay_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Input handed to the oracle for one planning call.
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    pub concept: &'a str,
    /// Deterministic genre hypothesis; the oracle may override it
    pub genre_hint: &'a str,
    pub candidates: &'a [TrackMetadata],
    pub target_duration_minutes: u32,
}

fn default_bpm_range() -> (f32, f32) {
    (120.0, 130.0)
}

/// The oracle's raw answer: a plan-shaped proposal that has not yet
/// passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProposal {
    pub genre: String,
    #[serde(default = "default_bpm_range")]
    pub bpm_range: (f32, f32),
    pub slots: Vec<TrackSlot>,
}

/// Pluggable judgment strategy. Unit tests use a deterministic stub;
/// production uses [`ChatOracle`].
#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// Model identifier recorded in the plan for provenance.
    fn model(&self) -> &str;

    async fn propose(&self, ctx: &PlanContext<'_>) -> Result<PlanProposal>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

const SYSTEM_PROMPT: &str = r#"You are the lead curator for a long-form instrumental mix channel.
Given a concept, a duration target, and a list of candidate library
tracks (free to reuse), produce a single continuous tracklist.

Rules:
- Hit the duration target; track count is flexible.
- Prefer reusing candidate tracks that fit the genre, BPM (within ~5)
  and the energy arc; request new generation only to fill gaps.
- Keep a coherent energy arc: restrained intro, one or two peaks,
  controlled cooldown and outro.
- Each slot's duration range must stay between 120000 and 480000 ms.
- Reused slots must reference a candidate id from the provided list.

Respond with JSON only, no preamble, in this shape:
{
  "genre": "string",
  "bpm_range": [120.0, 128.0],
  "slots": [
    {
      "order": 1,
      "role": "intro|build|peak|sustain|cooldown|outro",
      "title": "Evocative Track Title",
      "duration_min_ms": 150000,
      "duration_max_ms": 210000,
      "bpm_target": 122.0,
      "energy": 3,
      "source": "library",
      "track_id": "candidate id"
    },
    {
      "order": 2,
      "role": "build",
      "title": "Another Title",
      "duration_min_ms": 160000,
      "duration_max_ms": 200000,
      "bpm_target": 124.0,
      "energy": 5,
      "source": "generate",
      "request": {
        "genre": "string",
        "subgenre": "optional string",
        "mood": "texture and atmosphere description",
        "instruments": ["descriptor", "descriptor"],
        "exclusions": ["vocals", "sudden changes"]
      }
    }
  ]
}
If the concept cannot be planned, respond with {"rejected": "reason"}."#;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Candidate summary serialized into the user prompt. Only the fields
/// the curator needs; timestamps render as ISO strings or "never".
#[derive(Serialize)]
struct CandidateSummary<'a> {
    id: &'a str,
    title: &'a str,
    genre: &'a str,
    bpm: f32,
    energy: u8,
    role: &'a str,
    duration_ms: u64,
    last_used: String,
}

/// Live oracle speaking the OpenAI-compatible chat-completions
/// protocol (OpenRouter in production).
pub struct ChatOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatOracle {
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

    fn user_prompt(ctx: &PlanContext<'_>) -> String {
        let summaries: Vec<CandidateSummary<'_>> = ctx
            .candidates
            .iter()
            .map(|t| CandidateSummary {
                id: &t.id,
                title: &t.title,
                genre: &t.genre,
                bpm: t.bpm,
                energy: t.energy,
                role: t.role.as_str(),
                duration_ms: t.duration_ms,
                last_used: t
                    .last_used_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string()),
            })
            .collect();
        let candidates_json =
            serde_json::to_string_pretty(&summaries).unwrap_or_else(|_| "[]".to_string());

        format!(
            "CONCEPT: \"{}\"\nGENRE HINT: {}\nTARGET DURATION: {} minutes\n\n\
             CANDIDATE LIBRARY TRACKS (free to reuse):\n{}\n\n\
             Build the tracklist. For each slot set source to \"library\" or \"generate\".",
            ctx.concept, ctx.genre_hint, ctx.target_duration_minutes, candidates_json
        )
    }
}

#[async_trait]
impl PlanningOracle for ChatOracle {
    fn model(&self) -> &str {
        &self.model
    }

    async fn propose(&self, ctx: &PlanContext<'_>) -> Result<PlanProposal> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        // Re-invocations with identical inputs are permitted; each call
        // is logged rather than deduplicated.
        info!(
            concept = ctx.concept,
            candidates = ctx.candidates.len(),
            target_minutes = ctx.target_duration_minutes,
            model = %self.model,
            "invoking planning oracle"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_prompt(ctx),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("oracle: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "oracle returned {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("oracle: {}", e)))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::plan_invalid("response", "oracle returned no content"))?;

        parse_proposal(&content)
    }
}

/// Parse the oracle's JSON answer, tolerating markdown code fences and
/// surfacing an explicit rejection as `PlanningInvalid`.
pub fn parse_proposal(content: &str) -> Result<PlanProposal> {
    let stripped = strip_code_fences(content.trim());

    let value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| Error::plan_invalid("response", format!("not valid JSON: {}", e)))?;

    if let Some(reason) = value.get("rejected").and_then(|v| v.as_str()) {
        return Err(Error::plan_invalid("concept", reason.to_string()));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::plan_invalid("response", format!("unexpected plan shape: {}", e)))
}

/// Models occasionally wrap JSON in ``` fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop the fence line (which may carry a language tag)
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
