//! Conversational agent over a blocking inference backend.
//!
//! The backend runs on the agent's single worker thread. Every call, streamed
//! or not, is one job on that thread, so history is rendered and appended by
//! one call at a time even when callers overlap. The history lock is only
//! held to render a prompt or append an exchange, never across `predict`.

use crate::agent::backend::{CompletionCallbacks, DiscardCallbacks, Generation, InferenceBackend};
use crate::agent::callback::{CallbackOutput, StreamingCallback};
use crate::agent::history::{ConversationHistory, ConversationTurn};
use crate::agent::template::{Prompt, PromptTemplate};
use crate::bridge::channel::{BridgeReceiver, Capacity, channel};
use crate::bridge::stream::StreamConsumer;
use crate::bridge::worker::WorkerThread;
use crate::config::AgentConfig;
use crate::defaults;
use crate::error::Result;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use tracing::{debug, info, warn};

/// Agent that owns a conversation history and one inference worker.
pub struct ConversationalAgent<B: InferenceBackend> {
    template: Arc<PromptTemplate>,
    backend: Arc<Mutex<B>>,
    history: Arc<Mutex<ConversationHistory>>,
    worker: WorkerThread,
    capacity: Capacity,
    model_name: String,
}

impl<B: InferenceBackend> ConversationalAgent<B> {
    /// Builds an agent with unbounded session channels.
    ///
    /// Fails with a configuration error if the prompt template is unknown or
    /// malformed, or the backend rejects its parameters.
    pub fn new(config: &AgentConfig, backend: B) -> Result<Self> {
        Self::with_capacity(config, backend, Capacity::Unbounded)
    }

    /// Builds an agent whose session channels use `capacity`.
    pub fn with_capacity(config: &AgentConfig, mut backend: B, capacity: Capacity) -> Result<Self> {
        let template = PromptTemplate::resolve(config.prompt_template.as_ref())?;
        backend.configure(&config.backend_parameters)?;
        let worker = WorkerThread::spawn(defaults::AGENT_WORKER_NAME)?;
        let model_name = backend.model_name().to_string();

        info!(
            template = template.label(),
            model = %model_name,
            "conversational agent ready"
        );

        Ok(Self {
            template: Arc::new(template),
            backend: Arc::new(Mutex::new(backend)),
            history: Arc::new(Mutex::new(ConversationHistory::new(
                config.prompt_preamble.clone(),
            ))),
            worker,
            capacity,
            model_name,
        })
    }

    /// Generates a full reply without streaming.
    ///
    /// Returns the reply text and an interrupt flag that is always `false`.
    pub async fn respond(
        &self,
        human_input: &str,
        conversation_id: &str,
        is_interrupt: bool,
    ) -> Result<(String, bool)> {
        let turn = self.turn(human_input);

        let generation = self
            .worker
            .submit(move || turn.run(&mut DiscardCallbacks))?
            .join()
            .await??;

        debug!(
            conversation_id,
            is_interrupt,
            response = %generation.text,
            "LLM response"
        );
        Ok((generation.text, false))
    }

    /// Starts a generation and returns its tokens as a stream.
    ///
    /// The stream is finite, ordered, and single-use. Dropping it early does
    /// not cancel the backend call: the reply is still generated and still
    /// appended to the history.
    pub fn generate_response(
        &self,
        human_input: &str,
        conversation_id: &str,
        is_interrupt: bool,
    ) -> Result<TokenStream> {
        let turn = self.turn(human_input);
        let (tx, rx) = channel(self.capacity);
        let mut callbacks = StreamingCallback::new(tx);

        debug!(conversation_id, is_interrupt, "starting streamed generation");

        let submission = self.worker.submit(move || {
            match turn.run(&mut callbacks) {
                Ok(generation) => {
                    if !callbacks.is_terminated() {
                        callbacks.on_complete(&generation);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "streamed generation failed");
                    callbacks.on_error(err);
                }
            }
        })?;
        // The job reports through the channel; its return value is not needed.
        drop(submission);

        Ok(TokenStream::new(rx))
    }

    /// Snapshot of the conversation so far, preamble first.
    ///
    /// Does not wait for an in-flight generation.
    pub fn history(&self) -> Vec<ConversationTurn> {
        lock(&self.history).turns().to_vec()
    }

    /// Renders the prompt the next call would send for `input`.
    pub fn render_prompt(&self, input: &str) -> Prompt {
        self.template.render(&lock(&self.history), input)
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn turn(&self, input: &str) -> Turn<B> {
        Turn {
            backend: self.backend.clone(),
            history: self.history.clone(),
            template: self.template.clone(),
            input: input.to_string(),
        }
    }

    /// Waits for queued generations to finish and stops the worker.
    ///
    /// Blocks the caller.
    pub fn shutdown(self) -> Result<()> {
        self.worker.shutdown()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking backend poisons its lock; the history is never left half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One exchange, run as a job on the worker thread.
struct Turn<B> {
    backend: Arc<Mutex<B>>,
    history: Arc<Mutex<ConversationHistory>>,
    template: Arc<PromptTemplate>,
    input: String,
}

impl<B: InferenceBackend> Turn<B> {
    /// Render from current history, predict, then append.
    ///
    /// Only the worker thread locks the backend. Jobs run one at a time, so
    /// no other exchange lands between the render and the append.
    fn run(self, callbacks: &mut dyn CompletionCallbacks) -> Result<Generation> {
        let prompt = self.template.render(&lock(&self.history), &self.input);
        let generation = lock(&self.backend).predict(&prompt, callbacks)?;
        lock(&self.history).push_exchange(self.input, generation.text.clone());
        Ok(generation)
    }
}

/// Tokens of one streamed generation.
pub struct TokenStream {
    inner: StreamConsumer<CallbackOutput, String>,
}

impl TokenStream {
    fn new(rx: BridgeReceiver<CallbackOutput>) -> Self {
        Self {
            inner: StreamConsumer::new(rx, CallbackOutput::into_flow),
        }
    }

    /// True once the session's terminal marker has been consumed.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    /// Groups tokens into sentences.
    pub fn sentences(self) -> SentenceStream<Self> {
        SentenceStream::new(self)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Buffers a token stream and yields one trimmed sentence at a time.
///
/// A sentence ends with a token ending in `.`, `!`, `?` or a newline. Any
/// remainder is yielded when the token stream ends. Errors pass through and
/// end the stream.
pub struct SentenceStream<S> {
    tokens: S,
    buffer: String,
    done: bool,
}

impl<S> SentenceStream<S> {
    pub fn new(tokens: S) -> Self {
        Self {
            tokens,
            buffer: String::new(),
            done: false,
        }
    }

    fn take_buffer(&mut self) -> Option<String> {
        let sentence = self.buffer.trim().to_string();
        self.buffer.clear();
        (!sentence.is_empty()).then_some(sentence)
    }
}

impl<S> Stream for SentenceStream<S>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(Pin::new(&mut self.tokens).poll_next(cx)) {
                Some(Ok(token)) => {
                    if token.is_empty() {
                        continue;
                    }
                    self.buffer.push_str(&token);
                    if token.ends_with(defaults::SENTENCE_ENDINGS)
                        && let Some(sentence) = self.take_buffer()
                    {
                        return Poll::Ready(Some(Ok(sentence)));
                    }
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    self.done = true;
                    return Poll::Ready(self.take_buffer().map(Ok));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::backend::MockBackend;
    use crate::agent::history::Role;
    use crate::agent::template::PromptTemplateSetting;
    use crate::error::BridgeError;
    use futures_util::StreamExt;
    use futures_util::stream;

    fn alpaca_config(preamble: &str) -> AgentConfig {
        AgentConfig {
            prompt_template: Some(PromptTemplateSetting::Named("alpaca".to_string())),
            prompt_preamble: preamble.to_string(),
            ..AgentConfig::default()
        }
    }

    #[tokio::test]
    async fn test_respond_returns_text_and_no_interrupt() {
        let agent = ConversationalAgent::new(
            &alpaca_config("You are helpful."),
            MockBackend::new("mock").with_response("Hello! How can I help?"),
        )
        .unwrap();

        let (text, should_interrupt) = agent.respond("Hi", "conv-1", false).await.unwrap();

        assert_eq!(text, "Hello! How can I help?");
        assert!(!should_interrupt);
    }

    #[tokio::test]
    async fn test_respond_appends_exactly_one_exchange() {
        let agent = ConversationalAgent::new(
            &alpaca_config("You are helpful."),
            MockBackend::new("mock").with_response("Sure."),
        )
        .unwrap();
        assert_eq!(agent.history().len(), 1);

        agent.respond("Hi", "conv-1", false).await.unwrap();

        let history = agent.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], ConversationTurn::system("You are helpful."));
        assert_eq!(history[1], ConversationTurn::human("Hi"));
        assert_eq!(history[2], ConversationTurn::agent("Sure."));
    }

    #[tokio::test]
    async fn test_alpaca_prompt_includes_previous_exchange() {
        let backend = MockBackend::new("mock").with_response("Hey");
        let log = backend.prompt_log();
        let agent = ConversationalAgent::new(&alpaca_config("Be brief."), backend).unwrap();

        agent.respond("Hi", "c", false).await.unwrap();
        agent.respond("Again", "c", false).await.unwrap();

        let prompts = log.lock().unwrap();
        let Prompt::Text(second) = &prompts[1] else {
            panic!("alpaca should render a text prompt");
        };
        assert!(second.contains("System: Be brief.\nHuman: Hi\nAI: Hey"));
        assert!(second.contains("respond to: Again"));
    }

    #[test]
    fn test_unknown_template_fails_construction() {
        let config = AgentConfig {
            prompt_template: Some(PromptTemplateSetting::Named("unknown".to_string())),
            ..AgentConfig::default()
        };
        let result = ConversationalAgent::new(&config, MockBackend::new("mock"));
        assert!(matches!(
            result,
            Err(BridgeError::UnknownPromptTemplate { ref name }) if name == "unknown"
        ));
    }

    #[test]
    fn test_default_template_is_chat() {
        let agent = ConversationalAgent::new(&AgentConfig::default(), MockBackend::new("m")).unwrap();
        assert_eq!(agent.template(), &PromptTemplate::ChatHistoryPlaceholder);
        assert_eq!(agent.model_name(), "m");

        let Prompt::Messages(turns) = agent.render_prompt("hello") else {
            panic!("chat template should render messages");
        };
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1], ConversationTurn::human("hello"));
    }

    #[tokio::test]
    async fn test_generate_response_streams_tokens_in_order() {
        let agent = ConversationalAgent::new(
            &AgentConfig::default(),
            MockBackend::new("mock").with_response("one two three"),
        )
        .unwrap();

        let tokens: Vec<String> = agent
            .generate_response("count", "c", false)
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;

        assert_eq!(tokens, vec!["one ", "two ", "three"]);
        assert_eq!(agent.history().len(), 3);
    }

    #[tokio::test]
    async fn test_generate_response_propagates_backend_failure() {
        let agent = ConversationalAgent::new(
            &AgentConfig::default(),
            MockBackend::new("mock").with_failure(),
        )
        .unwrap();

        let mut stream = agent.generate_response("x", "c", false).unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Err(BridgeError::Inference { .. }))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(agent.history().len(), 1);
    }

    #[tokio::test]
    async fn test_respond_failure_leaves_agent_usable() {
        let agent = ConversationalAgent::new(
            &AgentConfig::default(),
            MockBackend::new("mock").with_failure(),
        )
        .unwrap();

        assert!(agent.respond("a", "c", false).await.is_err());
        assert!(agent.respond("b", "c", false).await.is_err());
        assert_eq!(agent.history().len(), 1);
    }

    #[tokio::test]
    async fn test_sentences_groups_tokens() {
        let tokens = stream::iter(
            ["Hello", " there.", " How", " are", " you?", " Fine"]
                .into_iter()
                .map(|t| Ok(t.to_string())),
        );

        let sentences: Vec<String> = SentenceStream::new(tokens)
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(sentences, vec!["Hello there.", "How are you?", "Fine"]);
    }

    #[tokio::test]
    async fn test_sentences_pass_errors_through() {
        let tokens = stream::iter(vec![
            Ok("Partial".to_string()),
            Err(BridgeError::StreamInterrupted),
            Ok("ignored.".to_string()),
        ]);

        let mut sentences = SentenceStream::new(tokens);
        assert!(matches!(
            sentences.next().await,
            Some(Err(BridgeError::StreamInterrupted))
        ));
        assert!(sentences.next().await.is_none());
    }

    #[tokio::test]
    async fn test_generate_response_sentences() {
        let agent = ConversationalAgent::new(
            &AgentConfig::default(),
            MockBackend::new("mock").with_response("Hi there. Nice day!"),
        )
        .unwrap();

        let sentences: Vec<String> = agent
            .generate_response("hi", "c", false)
            .unwrap()
            .sentences()
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(sentences, vec!["Hi there.", "Nice day!"]);
    }
}
