//! Conversation turn types shared by the adapter, history, and orchestrator.

use serde::{Deserialize, Serialize};

/// Who said a turn. The wire role name is protocol-dependent
/// (Gemini renders `Assistant` as `"model"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Line prefix used in the flat history log.
    pub fn log_prefix(self) -> &'static str {
        match self {
            Role::User => "User: ",
            Role::Assistant => "Nova: ",
        }
    }
}

/// One role-tagged message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One user submission, owned by the orchestrator for the duration of the
/// exchange. Attachment and web context are pre-rendered opaque text.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub user_text: String,
    pub attachment: Option<String>,
    pub web_context: Option<String>,
}

impl ChatRequest {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            ..Default::default()
        }
    }
}
