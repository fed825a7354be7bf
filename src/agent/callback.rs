//! Callback adapter: turns backend callbacks into channel messages.

use crate::agent::backend::{CompletionCallbacks, Generation};
use crate::bridge::channel::BridgeSender;
use crate::bridge::stream::Flow;
use crate::error::BridgeError;
use tracing::trace;

/// One message on a generation session's channel.
#[derive(Debug)]
pub enum CallbackOutput {
    /// A newly generated token.
    Token(String),
    /// Generation finished; terminal marker.
    Finish(Generation),
    /// Generation failed; terminal marker.
    Failed(BridgeError),
}

impl CallbackOutput {
    /// True for the messages that end a session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallbackOutput::Token(_))
    }

    /// Stream classification: tokens are yielded, terminals end the stream.
    pub fn into_flow(self) -> Flow<String> {
        match self {
            CallbackOutput::Token(token) => Flow::Yield(token),
            CallbackOutput::Finish(_) => Flow::Finish,
            CallbackOutput::Failed(err) => Flow::Fail(err),
        }
    }
}

/// Forwards backend callbacks onto one session's channel.
///
/// Created fresh for every generation and never shared between sessions.
/// Each callback is a single non-blocking write (blocking only under a
/// bounded capacity policy). A send that fails because the consumer stopped
/// reading is ignored; the backend call runs to completion regardless.
pub struct StreamingCallback {
    tx: BridgeSender<CallbackOutput>,
    terminated: bool,
}

impl StreamingCallback {
    pub fn new(tx: BridgeSender<CallbackOutput>) -> Self {
        Self {
            tx,
            terminated: false,
        }
    }

    /// True once a terminal message has been written.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Writes the failure terminal for this session.
    pub fn on_error(&mut self, err: BridgeError) {
        self.write(CallbackOutput::Failed(err));
    }

    fn write(&mut self, output: CallbackOutput) {
        if output.is_terminal() {
            self.terminated = true;
        }
        if self.tx.send(output).is_err() {
            trace!("session consumer gone, dropping callback output");
        }
    }
}

impl CompletionCallbacks for StreamingCallback {
    fn on_new_token(&mut self, token: &str) {
        self.write(CallbackOutput::Token(token.to_string()));
    }

    fn on_complete(&mut self, result: &Generation) {
        self.write(CallbackOutput::Finish(result.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::unbounded;

    #[tokio::test]
    async fn test_callbacks_become_messages_in_order() {
        let (tx, mut rx) = unbounded();
        let mut adapter = StreamingCallback::new(tx);

        adapter.on_new_token("Hel");
        adapter.on_new_token("lo");
        assert!(!adapter.is_terminated());
        adapter.on_complete(&Generation::new("Hello", 2));
        assert!(adapter.is_terminated());
        drop(adapter);

        assert!(matches!(rx.recv().await, Some(CallbackOutput::Token(t)) if t == "Hel"));
        assert!(matches!(rx.recv().await, Some(CallbackOutput::Token(t)) if t == "lo"));
        assert!(
            matches!(rx.recv().await, Some(CallbackOutput::Finish(g)) if g.text == "Hello")
        );
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_writes_after_consumer_drop_are_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);

        let mut adapter = StreamingCallback::new(tx);
        adapter.on_new_token("lost");
        adapter.on_complete(&Generation::default());
        assert!(adapter.is_terminated());
    }

    #[test]
    fn test_on_error_is_terminal() {
        let (tx, _rx) = unbounded();
        let mut adapter = StreamingCallback::new(tx);
        adapter.on_error(BridgeError::StreamInterrupted);
        assert!(adapter.is_terminated());
    }

    #[test]
    fn test_into_flow() {
        assert!(matches!(
            CallbackOutput::Token("a".to_string()).into_flow(),
            Flow::Yield(t) if t == "a"
        ));
        assert!(matches!(
            CallbackOutput::Finish(Generation::default()).into_flow(),
            Flow::Finish
        ));
        assert!(matches!(
            CallbackOutput::Failed(BridgeError::StreamInterrupted).into_flow(),
            Flow::Fail(BridgeError::StreamInterrupted)
        ));
    }

    #[test]
    fn test_is_terminal() {
        assert!(!CallbackOutput::Token(String::new()).is_terminal());
        assert!(CallbackOutput::Finish(Generation::default()).is_terminal());
        assert!(CallbackOutput::Failed(BridgeError::StreamInterrupted).is_terminal());
    }
}
