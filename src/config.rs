use crate::agent::backend::BackendParameters;
use crate::agent::template::{PromptTemplate, PromptTemplateSetting};
use crate::bridge::channel::Capacity;
use crate::defaults;
use crate::error::{BridgeError, Result};
use crate::synth::transcode::AudioEncoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Highest accepted output sample rate in Hz.
const MAX_SAMPLING_RATE: u32 = 192_000;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub synthesizer: SynthesizerConfig,
    pub bridge: BridgeConfig,
}

/// Conversational agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// `"alpaca"`, a `{ template = "..." }` table, or absent for chat history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<PromptTemplateSetting>,
    pub prompt_preamble: String,
    /// Passed to the inference backend untouched.
    pub backend_parameters: BackendParameters,
}

/// Decoded audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub sampling_rate: u32,
    pub audio_encoding: AudioEncoding,
}

/// Bridging channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Queue depth per channel; 0 means unbounded.
    pub channel_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prompt_template: None,
            prompt_preamble: defaults::PROMPT_PREAMBLE.to_string(),
            backend_parameters: BackendParameters::new(),
        }
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            sampling_rate: defaults::SAMPLE_RATE,
            audio_encoding: AudioEncoding::Linear16,
        }
    }
}

impl BridgeConfig {
    pub fn capacity(&self) -> Capacity {
        Capacity::from_config(self.channel_capacity)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BridgeError::ConfigFileNotFound {
                path: path.display().to_string(),
            },
            _ => BridgeError::Io(e),
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(BridgeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMBRIDGE_PROMPT_TEMPLATE → agent.prompt_template (by name)
    /// - STREAMBRIDGE_PROMPT_PREAMBLE → agent.prompt_preamble
    /// - STREAMBRIDGE_SAMPLING_RATE → synthesizer.sampling_rate
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(template) = env_var("PROMPT_TEMPLATE") {
            self.agent.prompt_template = Some(PromptTemplateSetting::Named(template));
        }

        if let Some(preamble) = env_var("PROMPT_PREAMBLE") {
            self.agent.prompt_preamble = preamble;
        }

        if let Some(rate) = env_var("SAMPLING_RATE") {
            self.synthesizer.sampling_rate =
                rate.parse().map_err(|e| BridgeError::ConfigParse {
                    message: format!(
                        "{}_SAMPLING_RATE='{}': {}",
                        defaults::ENV_PREFIX,
                        rate,
                        e
                    ),
                })?;
        }

        Ok(self)
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        PromptTemplate::resolve(self.agent.prompt_template.as_ref())?;

        let rate = self.synthesizer.sampling_rate;
        if rate == 0 || rate > MAX_SAMPLING_RATE {
            return Err(BridgeError::ConfigInvalidValue {
                key: "synthesizer.sampling_rate".to_string(),
                message: format!("must be between 1 and {}, got {}", MAX_SAMPLING_RATE, rate),
            });
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/streambridge/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("streambridge").join("config.toml"))
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", defaults::ENV_PREFIX, suffix))
        .ok()
        .filter(|value| !value.is_empty())
}
