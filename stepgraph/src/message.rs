//! Conversation message primitive.
//!
//! Messages are the payload of transcript-style `Append` channels: user
//! requests, model replies, and tool results, in invocation order. The engine
//! itself never inspects message content; it only concatenates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The originator of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt or instruction.
    System,
    /// End-user input.
    User,
    /// Model output, including requested actions.
    Assistant,
    /// Result of an executed action fed back to the model.
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation transcript.
///
/// # Examples
///
/// ```
/// use stepgraph::message::{Message, Role};
///
/// let question = Message::user("What should a senior cat eat?");
/// assert!(question.has_role(Role::User));
///
/// let reply = Message::assistant("Let me research that.");
/// assert_eq!(reply.content, "Let me research that.");
///
/// // Messages serialize for storage in JSON channels.
/// let json = serde_json::to_string(&question).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(question, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a tool-result message.
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Returns `true` if this message has the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convenience_constructors_set_roles() {
        assert!(Message::system("s").has_role(Role::System));
        assert!(Message::user("u").has_role(Role::User));
        assert!(Message::assistant("a").has_role(Role::Assistant));
        assert!(Message::tool("t").has_role(Role::Tool));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::tool("done")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["content"], "done");
    }

    #[test]
    fn serde_round_trip() {
        let original = Message::assistant("plan written");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }
}
