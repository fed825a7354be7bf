//! Conversation history owned by an agent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Agent,
}

impl Role {
    /// Prefix used when the history is flattened into text.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::Human => "Human",
            Role::Agent => "AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }
}

/// Ordered conversation turns, always starting with the system preamble.
///
/// The preamble cannot be replaced or removed; the only mutation is
/// appending a completed human/agent exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    /// Creates a history containing only the system preamble.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::system(preamble)],
        }
    }

    /// Appends one exchange: the human input followed by the agent reply.
    pub fn push_exchange(&mut self, human: impl Into<String>, agent: impl Into<String>) {
        self.turns.push(ConversationTurn::human(human));
        self.turns.push(ConversationTurn::agent(agent));
    }

    /// All turns, preamble first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The system preamble.
    pub fn preamble(&self) -> &str {
        // Index 0 is set in `new` and never removed.
        self.turns.first().map(|t| t.content.as_str()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the preamble is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Flattens the history into `Role: content` lines.
    pub fn buffer_string(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.prefix(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
