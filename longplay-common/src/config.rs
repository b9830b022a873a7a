//! Configuration loading
//!
//! Resolution order, highest priority first:
//! 1. Explicit config path (command-line argument)
//! 2. `LONGPLAY_CONFIG` environment variable
//! 3. `~/.config/longplay/config.toml`
//! 4. Compiled defaults
//!
//! Secrets (API keys, tokens) additionally override from environment
//! variables after the file is loaded, so they never need to live in
//! the TOML file.

use crate::fade_curves::FadeCurve;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Planning oracle endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "anthropic/claude-sonnet-4.5".to_string(),
        }
    }
}

/// Generation provider credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub elevenlabs_base_url: String,
    pub elevenlabs_api_key: String,
    pub stability_base_url: String,
    pub stability_api_key: String,
    pub stable_audio_model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            elevenlabs_base_url: "https://api.elevenlabs.io".to_string(),
            elevenlabs_api_key: String::new(),
            stability_base_url: "https://api.stability.ai".to_string(),
            stability_api_key: String::new(),
            stable_audio_model: "stable-audio-2".to_string(),
        }
    }
}

/// Which store backs the track library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local directory (offline runs, tests)
    Fs,
    /// Remote library gateway over HTTP
    Http,
}

/// Library store location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    pub backend: StoreBackend,
    /// Gateway base URL (http backend)
    pub base_url: String,
    /// Bearer token for the gateway (http backend)
    pub api_token: String,
    /// Store root directory (fs backend)
    pub root: PathBuf,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            base_url: String::new(),
            api_token: String::new(),
            root: PathBuf::from("library-store"),
        }
    }
}

/// Mix composer tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    /// Crossfade length per junction
    pub crossfade_ms: u64,
    /// Apply the single global peak-normalization pass
    pub normalize: bool,
    /// Peak target for normalization, dBFS
    pub target_dbfs: f32,
    pub crossfade_curve: FadeCurve,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            crossfade_ms: 5_000,
            normalize: true,
            target_dbfs: -1.0,
            crossfade_curve: FadeCurve::EqualPower,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub oracle: OracleSettings,
    pub providers: ProviderSettings,
    pub library: LibrarySettings,
    pub mix: MixSettings,
    /// Local working directory for session output
    pub output_dir: PathBuf,
}

impl Settings {
    /// Load settings following the documented resolution order.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match Self::resolve_config_path(explicit) {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("failed to parse {}: {}", path.display(), e))
                })?
            }
            None => Settings::default(),
        };

        if settings.output_dir.as_os_str().is_empty() {
            settings.output_dir = PathBuf::from("output");
        }
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("LONGPLAY_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let default = dirs::config_dir()?.join("longplay").join("config.toml");
        default.exists().then_some(default)
    }

    /// Environment variables win over the config file for secrets and
    /// endpoints. The provider key names match what the provider
    /// dashboards hand out.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OPENROUTER_API_KEY") {
            self.oracle.api_key = v;
        }
        if let Ok(v) = std::env::var("OPENROUTER_MODEL") {
            self.oracle.model = v;
        }
        if let Ok(v) = std::env::var("OPENROUTER_BASE_URL") {
            self.oracle.base_url = v;
        }
        if let Ok(v) = std::env::var("ELEVENLABS_API_KEY") {
            self.providers.elevenlabs_api_key = v;
        }
        if let Ok(v) = std::env::var("STABILITY_API_KEY") {
            self.providers.stability_api_key = v;
        }
        if let Ok(v) = std::env::var("LONGPLAY_LIBRARY_URL") {
            self.library.base_url = v;
            self.library.backend = StoreBackend::Http;
        }
        if let Ok(v) = std::env::var("LONGPLAY_LIBRARY_TOKEN") {
            self.library.api_token = v;
        }
        if let Ok(v) = std::env::var("LONGPLAY_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
    }
}
