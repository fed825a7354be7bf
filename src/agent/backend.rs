//! Inference backend seam and a scripted mock backend.

use crate::agent::template::Prompt;
use crate::error::{BridgeError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Opaque backend settings, passed through from configuration untouched.
pub type BackendParameters = BTreeMap<String, Value>;

/// Aggregate result of one prediction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Generation {
    /// Full generated text.
    pub text: String,
    /// Number of tokens emitted through `on_new_token`.
    pub token_count: usize,
}

impl Generation {
    pub fn new(text: impl Into<String>, token_count: usize) -> Self {
        Self {
            text: text.into(),
            token_count,
        }
    }
}

/// Hooks a backend calls while it generates, on the thread running `predict`.
pub trait CompletionCallbacks: Send {
    /// Called once per generated token.
    fn on_new_token(&mut self, token: &str);

    /// Called once when generation has finished.
    fn on_complete(&mut self, result: &Generation);
}

/// Callbacks that discard everything (non-streaming calls).
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardCallbacks;

impl CompletionCallbacks for DiscardCallbacks {
    fn on_new_token(&mut self, _token: &str) {}

    fn on_complete(&mut self, _result: &Generation) {}
}

/// Trait for a blocking inference engine.
///
/// `predict` blocks for the whole generation and reports tokens through the
/// given callbacks as it goes. Implementations are only ever called from the
/// agent's worker thread, one call at a time.
pub trait InferenceBackend: Send + 'static {
    /// Applies backend parameters. Called once, when the agent is built.
    fn configure(&mut self, _parameters: &BackendParameters) -> Result<()> {
        Ok(())
    }

    /// Generates a completion for `prompt`.
    fn predict(
        &mut self,
        prompt: &Prompt,
        callbacks: &mut dyn CompletionCallbacks,
    ) -> Result<Generation>;

    /// Name of the loaded model, for logging.
    fn model_name(&self) -> &str;
}

/// Scripted backend for tests and the CLI demo.
///
/// Replies with a fixed response, split into word tokens.
#[derive(Debug, Clone)]
pub struct MockBackend {
    model_name: String,
    response: String,
    should_fail: bool,
    token_delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<Prompt>>>,
    parameters: BackendParameters,
}

impl MockBackend {
    /// Create a new mock backend with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock response".to_string(),
            should_fail: false,
            token_delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
            parameters: BackendParameters::new(),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on predict
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sleep between tokens to simulate a slow model
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Shared log of every prompt passed to `predict`.
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<Prompt>>> {
        self.prompts.clone()
    }

    /// Parameters received through `configure`.
    pub fn parameters(&self) -> &BackendParameters {
        &self.parameters
    }

    /// Splits text into tokens that keep their trailing whitespace.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split_inclusive(' ').map(str::to_string).collect()
    }
}

impl InferenceBackend for MockBackend {
    fn configure(&mut self, parameters: &BackendParameters) -> Result<()> {
        if let Some(value) = parameters.get("temperature")
            && !value.is_number()
        {
            return Err(BridgeError::ConfigInvalidValue {
                key: "agent.backend_parameters.temperature".to_string(),
                message: format!("expected a number, got {}", value),
            });
        }
        self.parameters = parameters.clone();
        Ok(())
    }

    fn predict(
        &mut self,
        prompt: &Prompt,
        callbacks: &mut dyn CompletionCallbacks,
    ) -> Result<Generation> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if self.should_fail {
            return Err(BridgeError::Inference {
                message: "mock inference failure".to_string(),
            });
        }

        let tokens = Self::tokenize(&self.response);
        for token in &tokens {
            if let Some(delay) = self.token_delay {
                std::thread::sleep(delay);
            }
            callbacks.on_new_token(token);
        }

        let generation = Generation::new(self.response.clone(), tokens.len());
        callbacks.on_complete(&generation);
        Ok(generation)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingCallbacks {
        tokens: Vec<String>,
        completions: Vec<Generation>,
    }

    impl CompletionCallbacks for RecordingCallbacks {
        fn on_new_token(&mut self, token: &str) {
            self.tokens.push(token.to_string());
        }

        fn on_complete(&mut self, result: &Generation) {
            self.completions.push(result.clone());
        }
    }

    fn text_prompt() -> Prompt {
        Prompt::Text("Hi".to_string())
    }

    #[test]
    fn test_mock_backend_streams_tokens_then_completes() {
        let mut backend = MockBackend::new("mock").with_response("Hello there friend");
        let mut callbacks = RecordingCallbacks::default();

        let generation = backend.predict(&text_prompt(), &mut callbacks).unwrap();

        assert_eq!(callbacks.tokens, vec!["Hello ", "there ", "friend"]);
        assert_eq!(callbacks.completions, vec![generation.clone()]);
        assert_eq!(generation, Generation::new("Hello there friend", 3));
    }

    #[test]
    fn test_mock_backend_failure() {
        let mut backend = MockBackend::new("mock").with_failure();
        let mut callbacks = RecordingCallbacks::default();

        let err = backend.predict(&text_prompt(), &mut callbacks).unwrap_err();
        assert!(matches!(err, BridgeError::Inference { .. }));
        assert!(callbacks.tokens.is_empty());
        assert!(callbacks.completions.is_empty());
    }

    #[test]
    fn test_mock_backend_records_prompts() {
        let mut backend = MockBackend::new("mock");
        let log = backend.prompt_log();

        backend.predict(&text_prompt(), &mut DiscardCallbacks).unwrap();
        backend
            .predict(&Prompt::Text("again".to_string()), &mut DiscardCallbacks)
            .unwrap();

        let prompts = log.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1], Prompt::Text("again".to_string()));
    }

    #[test]
    fn test_mock_backend_configure_validates_temperature() {
        let mut backend = MockBackend::new("mock");

        let mut good = BackendParameters::new();
        good.insert("temperature".to_string(), json!(0.2));
        good.insert("n_ctx".to_string(), json!(2048));
        backend.configure(&good).unwrap();
        assert_eq!(backend.parameters(), &good);

        let mut bad = BackendParameters::new();
        bad.insert("temperature".to_string(), json!("hot"));
        let err = backend.configure(&bad).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_tokenize_empty_response() {
        assert!(MockBackend::tokenize("").is_empty());
    }

    #[test]
    fn test_backend_trait_is_object_safe() {
        let mut backend: Box<dyn InferenceBackend> =
            Box::new(MockBackend::new("boxed").with_response("ok"));
        assert_eq!(backend.model_name(), "boxed");
        let generation = backend.predict(&text_prompt(), &mut DiscardCallbacks).unwrap();
        assert_eq!(generation.text, "ok");
    }
}
