//! Default configuration constants for streambridge.
//!
//! Shared between the config layer, the agent and the decode pipeline so the
//! same values are used everywhere.

/// Default output sample rate in Hz for decoded audio.
///
/// 16kHz is what telephony-grade speech synthesis and most speech models expect.
pub const SAMPLE_RATE: u32 = 16000;

/// Named template that flattens history into a single instruction block.
pub const ALPACA_TEMPLATE_NAME: &str = "alpaca";

/// Instruction-style layout used by the `alpaca` template.
pub const ALPACA_TEMPLATE_WITH_HISTORY: &str = "### Instruction:
Your previous conversation history:
{history}

Current instruction/message to respond to: {input}
### Response:";

/// Default system preamble when the config does not provide one.
pub const PROMPT_PREAMBLE: &str = "You are a helpful assistant.";

/// Thread name of the agent's inference worker.
pub const AGENT_WORKER_NAME: &str = "agent-predict";

/// Thread name of the audio decode worker.
pub const DECODER_WORKER_NAME: &str = "audio-decode";

/// Characters that close a sentence when grouping streamed tokens.
pub const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', '\n'];

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "STREAMBRIDGE";
