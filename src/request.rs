//! OpenAI-compatible wire types for streaming chat completions

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message (query)
    User,
    /// Assistant message (model output)
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message (OpenAI-compatible format)
///
/// The optional `name` field tags each message with the agent and round it
/// belongs to (`agent{agent_id}-{round_id}`), which lets a shared history
/// carry interleaved turns from several agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Participant name, `agent{agent_id}-{round_id}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message content
    pub content: String,
}

impl Message {
    /// Create a message tagged with a participant name
    pub fn named(role: Role, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            name: Some(name.into()),
            content: content.into(),
        }
    }

    /// Create an untagged user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            name: None,
            content: content.into(),
        }
    }
}

/// Streaming chat-completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered conversation context; the fresh query is always last
    pub messages: Vec<Message>,
    /// Always true; token-level timing requires streaming
    pub stream: bool,
    /// Output token budget for this request
    pub max_tokens: u32,
    /// 0.0 for deterministic sampling, reproducible benchmarks
    pub temperature: f32,
    /// Asks the server to append a terminal usage record to the stream
    pub stream_options: StreamOptions,
}

/// Streaming options
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    /// Request the terminal usage record
    pub include_usage: bool,
}

/// One parsed SSE chunk of a streaming response
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    /// Incremental choices (empty for metadata-only chunks)
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage statistics, present only on the terminal chunk
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A single choice within a streamed chunk
#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content delta
    #[serde(default)]
    pub delta: Delta,
    /// Populated on the last content chunk
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message delta
#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated
    #[serde(default)]
    pub completion_tokens: u32,
}
