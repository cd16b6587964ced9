use crate::error::AssistantError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Variable name the assistant expects the caller's bearer token under.
pub const TOKEN_VARIABLE: &str = "USER_JWT_TOKEN";

fn assistant_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("valid assistant id regex")
    })
}

/// Opaque identifier of the remote assistant.
///
/// Only the textual shape is checked; the voice service decides whether it exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantId(String);

impl AssistantId {
    pub fn parse(value: &str) -> Result<Self, AssistantError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AssistantError::InvalidConfiguration(
                "missing assistant id".into(),
            ));
        }
        if !assistant_id_re().is_match(value) {
            return Err(AssistantError::InvalidConfiguration(
                "assistant id must be a valid UUID".into(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssistantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A complete conversational turn.
    Message,
    /// Live speech-to-text of a turn in progress.
    Transcript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    pub text: String,
    pub kind: MessageKind,
}

impl IncomingMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            kind: MessageKind::Message,
        }
    }
}

/// Lifecycle and content events raised by a voice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    CallStart,
    CallEnd,
    Message(IncomingMessage),
    Error(String),
}

/// Message the client pushes into a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    AddMessage { message: ConversationEntry },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

impl OutboundMessage {
    /// A message the user did not speak but which the assistant should treat as user input.
    pub fn synthetic_user(content: impl Into<String>) -> Self {
        Self::AddMessage {
            message: ConversationEntry {
                role: Role::User,
                content: content.into(),
            },
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::AddMessage { message } => &message.content,
        }
    }
}

/// Values the assistant can interpolate into its prompts and tool calls.
pub type VariableValues = BTreeMap<String, String>;

pub fn token_variables(token: &BearerToken) -> VariableValues {
    let mut vars = VariableValues::new();
    vars.insert(TOKEN_VARIABLE.into(), token.expose().to_string());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_id_accepts_uuid_shape_in_any_case() {
        assert!(AssistantId::parse("0f8fad5b-d9cb-469f-a165-70867728950e").is_ok());
        assert!(AssistantId::parse("0F8FAD5B-D9CB-469F-A165-70867728950E").is_ok());
    }

    #[test]
    fn assistant_id_rejects_other_shapes() {
        for bad in [
            "",
            "assistant-1",
            "0f8fad5bd9cb469fa16570867728950e",
            "{0f8fad5b-d9cb-469f-a165-70867728950e}",
            "0f8fad5b-d9cb-469f-a165-70867728950",
            "0f8fad5b-d9cb-469f-a165-70867728950g",
        ] {
            let err = AssistantId::parse(bad).unwrap_err();
            assert!(
                matches!(err, AssistantError::InvalidConfiguration(_)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let t = BearerToken::new("eyJhbGciOi.secret");
        assert!(!format!("{t:?}").contains("secret"));
        assert_eq!(t.authorization_value(), "Bearer eyJhbGciOi.secret");
    }

    #[test]
    fn synthetic_message_serializes_as_add_message() {
        let msg = OutboundMessage::synthetic_user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "add-message",
                "message": { "role": "user", "content": "hello" }
            })
        );
    }
}
