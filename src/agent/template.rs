//! Prompt templates.
//!
//! The configured setting is resolved once, when the agent is built, into a
//! `PromptTemplate`. Unknown names and malformed custom templates fail there
//! and never reach a generation call.

use crate::agent::history::{ConversationHistory, ConversationTurn};
use crate::defaults;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prompt template as written in configuration.
///
/// A bare string names a built-in template; a table carries a custom text
/// template. An absent setting selects the chat-history layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptTemplateSetting {
    Named(String),
    Custom { template: String },
}

/// A resolved prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Instruction layout; history is flattened into one text block.
    Alpaca(TextTemplate),
    /// History turns are passed to the backend as discrete messages,
    /// followed by the human input.
    ChatHistoryPlaceholder,
    /// Caller-supplied text with `{history}` and `{input}` placeholders.
    Custom(TextTemplate),
}

/// What the backend receives for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<ConversationTurn>),
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::Text(text) => f.write_str(text),
            Prompt::Messages(turns) => {
                for (i, turn) in turns.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}: {}", turn.role, turn.content)?;
                }
                Ok(())
            }
        }
    }
}

impl PromptTemplate {
    /// Resolves a configured setting.
    pub fn resolve(setting: Option<&PromptTemplateSetting>) -> Result<Self> {
        match setting {
            None => Ok(PromptTemplate::ChatHistoryPlaceholder),
            Some(PromptTemplateSetting::Named(name)) => Self::named(name),
            Some(PromptTemplateSetting::Custom { template }) => {
                Ok(PromptTemplate::Custom(TextTemplate::parse(template)?))
            }
        }
    }

    /// Looks up a built-in template by name.
    pub fn named(name: &str) -> Result<Self> {
        match name {
            defaults::ALPACA_TEMPLATE_NAME => Ok(PromptTemplate::Alpaca(TextTemplate::parse(
                defaults::ALPACA_TEMPLATE_WITH_HISTORY,
            )?)),
            _ => Err(BridgeError::UnknownPromptTemplate {
                name: name.to_string(),
            }),
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            PromptTemplate::Alpaca(_) => "alpaca",
            PromptTemplate::ChatHistoryPlaceholder => "chat",
            PromptTemplate::Custom(_) => "custom",
        }
    }

    /// Builds the prompt for `input` given the history so far.
    pub fn render(&self, history: &ConversationHistory, input: &str) -> Prompt {
        match self {
            PromptTemplate::Alpaca(template) | PromptTemplate::Custom(template) => {
                Prompt::Text(template.render(&history.buffer_string(), input))
            }
            PromptTemplate::ChatHistoryPlaceholder => {
                let mut turns = history.turns().to_vec();
                turns.push(ConversationTurn::human(input));
                Prompt::Messages(turns)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    History,
    Input,
}

/// Text template with `{history}` and `{input}` placeholders.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTemplate {
    segments: Vec<Segment>,
}

impl TextTemplate {
    /// Parses and validates a template.
    ///
    /// Fails on unknown placeholders, unbalanced braces, or a missing `{input}`.
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |message: String| BridgeError::ConfigInvalidValue {
            key: "agent.prompt_template".to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(invalid(format!("unclosed placeholder '{{{}'", name)));
                    }
                    let segment = match name.trim() {
                        "history" => Segment::History,
                        "input" => Segment::Input,
                        other => return Err(invalid(format!("unknown placeholder '{}'", other))),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Input) {
            return Err(invalid("template must contain an {input} placeholder".to_string()));
        }

        Ok(Self { segments })
    }

    /// Substitutes both placeholders in a single pass.
    pub fn render(&self, history: &str, input: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::History => out.push_str(history),
                Segment::Input => out.push_str(input),
            }
        }
        out
    }

    /// True if the template references `{history}`.
    pub fn uses_history(&self) -> bool {
        self.segments.contains(&Segment::History)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_setting_resolves_to_chat() {
        let template = PromptTemplate::resolve(None).unwrap();
        assert_eq!(template, PromptTemplate::ChatHistoryPlaceholder);
        assert_eq!(template.label(), "chat");
    }

    #[test]
    fn test_alpaca_resolves() {
        let setting = PromptTemplateSetting::Named("alpaca".to_string());
        let template = PromptTemplate::resolve(Some(&setting)).unwrap();
        assert!(matches!(template, PromptTemplate::Alpaca(_)));
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let setting = PromptTemplateSetting::Named("unknown".to_string());
        let err = PromptTemplate::resolve(Some(&setting)).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownPromptTemplate { ref name } if name == "unknown"));
        assert!(err.is_config());
    }

    #[test]
    fn test_alpaca_render_flattens_history() {
        let template = PromptTemplate::named("alpaca").unwrap();
        let mut history = ConversationHistory::new("You are helpful.");
        history.push_exchange("Hi", "Hello!");

        let prompt = template.render(&history, "What is Rust?");
        assert_eq!(
            prompt,
            Prompt::Text(
                "### Instruction:\n\
                 Your previous conversation history:\n\
                 System: You are helpful.\nHuman: Hi\nAI: Hello!\n\n\
                 Current instruction/message to respond to: What is Rust?\n\
                 ### Response:"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_chat_render_keeps_discrete_turns() {
        let mut history = ConversationHistory::new("sys");
        history.push_exchange("a", "b");

        let prompt = PromptTemplate::ChatHistoryPlaceholder.render(&history, "c");
        assert_eq!(
            prompt,
            Prompt::Messages(vec![
                ConversationTurn::system("sys"),
                ConversationTurn::human("a"),
                ConversationTurn::agent("b"),
                ConversationTurn::human("c"),
            ])
        );
        assert_eq!(prompt.to_string(), "System: sys\nHuman: a\nAI: b\nHuman: c");
    }

    #[test]
    fn test_input_containing_placeholder_text_is_not_reexpanded() {
        let template = TextTemplate::parse("{history}|{input}").unwrap();
        assert_eq!(template.render("{input}", "{history}"), "{input}|{history}");
    }

    #[test]
    fn test_custom_template_escapes_braces() {
        let template = TextTemplate::parse("{{json}} {input}").unwrap();
        assert_eq!(template.render("", "x"), "{json} x");
        assert!(!template.uses_history());
    }

    #[test]
    fn test_custom_template_requires_input() {
        let err = TextTemplate::parse("Only {history}").unwrap_err();
        assert!(err.to_string().contains("{input}"));
        assert!(err.is_config());
    }

    #[test]
    fn test_custom_template_rejects_unknown_placeholder() {
        let err = TextTemplate::parse("{input} {mood}").unwrap_err();
        assert!(err.to_string().contains("unknown placeholder 'mood'"));
    }

    #[test]
    fn test_custom_template_rejects_unbalanced_braces() {
        assert!(TextTemplate::parse("{input").is_err());
        assert!(TextTemplate::parse("{input} }").is_err());
    }

    #[test]
    fn test_setting_deserializes_from_string_or_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            prompt_template: PromptTemplateSetting,
        }

        let named: Wrapper = toml::from_str(r#"prompt_template = "alpaca""#).unwrap();
        assert_eq!(
            named.prompt_template,
            PromptTemplateSetting::Named("alpaca".to_string())
        );

        let custom: Wrapper =
            toml::from_str(r#"prompt_template = { template = "Q: {input}\nA:" }"#).unwrap();
        assert_eq!(
            custom.prompt_template,
            PromptTemplateSetting::Custom {
                template: "Q: {input}\nA:".to_string()
            }
        );
    }
}
