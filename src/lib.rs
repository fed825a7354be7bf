//! streambridge - blocking producers as async streams
//!
//! Runs blocking work (model inference that reports tokens through callbacks,
//! codec decode routines) on dedicated worker threads and hands the results
//! to async code as ordered streams with a single end-of-stream signal.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod agent;
pub mod bridge;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod synth;

// Bridging primitives
pub use bridge::{
    BridgeReceiver, BridgeSender, Capacity, Flow, StreamConsumer, Submission, WorkerThread,
};

// Agent
pub use agent::{
    ConversationalAgent, InferenceBackend, MockBackend, Prompt, PromptTemplate, TokenStream,
};

// Audio
pub use synth::{AudioChunk, AudioDecodePipeline, AudioEncoding, ChunkDecoder, WavChunkDecoder};

// Error handling
pub use error::{BridgeError, Result};

// Config
pub use config::{AgentConfig, BridgeConfig, Config, SynthesizerConfig};

// Station framework (for advanced users)
pub use bridge::{ErrorReporter, LogReporter, Station, StationError, StationRunner};

/// Build version string.
pub fn version_string() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
