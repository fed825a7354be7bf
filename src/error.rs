//! Error types for streambridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Unknown prompt template '{name}'")]
    UnknownPromptTemplate { name: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Bridging errors
    #[error("Channel '{channel}' is closed")]
    ChannelClosed { channel: String },

    #[error("Worker '{worker}' is not accepting submissions")]
    WorkerUnavailable { worker: String },

    #[error("Task on worker '{worker}' panicked")]
    WorkerTaskPanicked { worker: String },

    #[error("Stream ended before its terminal marker")]
    StreamInterrupted,

    // Inference errors
    #[error("Inference failed: {message}")]
    Inference { message: String },

    // Audio errors
    #[error("Audio decode failed: {message}")]
    Decode { message: String },

    #[error("Audio transcode failed: {message}")]
    Transcode { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BridgeError::ConfigFileNotFound { .. }
                | BridgeError::ConfigParse { .. }
                | BridgeError::ConfigInvalidValue { .. }
                | BridgeError::UnknownPromptTemplate { .. }
                | BridgeError::Config(_)
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BridgeError>;
