//! Conversational agent: prompt templates, history, and streamed generation
//! over a blocking inference backend.

pub mod backend;
pub mod callback;
pub mod conversational;
pub mod history;
pub mod template;

pub use backend::{
    BackendParameters, CompletionCallbacks, DiscardCallbacks, Generation, InferenceBackend,
    MockBackend,
};
pub use callback::{CallbackOutput, StreamingCallback};
pub use conversational::{ConversationalAgent, SentenceStream, TokenStream};
pub use history::{ConversationHistory, ConversationTurn, Role};
pub use template::{Prompt, PromptTemplate, PromptTemplateSetting, TextTemplate};
