//! Streaming chat-completion client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Client;
use std::time::Instant;

use crate::error::DispatchError;
use crate::request::{ChatChunk, ChatRequest};

/// vLLM-style servers ignore the key but still expect the header.
const DUMMY_API_KEY: &str = "EMPTY";

/// Measurements from one fully streamed chat completion
#[derive(Debug, Clone)]
pub struct StreamedCompletion {
    /// Accumulated response body
    pub body: String,
    /// Time to first token, seconds (0.0 if no token ever arrived)
    pub ttft: f64,
    /// First token to completion, seconds (0.0 if no token ever arrived)
    pub generation_time: f64,
    /// Prompt tokens from the terminal usage record (0 if absent)
    pub prompt_tokens: u32,
    /// Generated tokens from the terminal usage record (0 if absent)
    pub completion_tokens: u32,
    /// Wall-clock launch time
    pub launch_time: DateTime<Utc>,
    /// Wall-clock completion time
    pub finish_time: DateTime<Utc>,
}

/// A streaming chat-completion endpoint.
///
/// The trait is the seam between the dispatch bridge and the network;
/// tests substitute scripted implementations.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Drive one streaming request to completion, measuring as it goes
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        extra_headers: &[(String, String)],
    ) -> Result<StreamedCompletion, DispatchError>;
}

/// OpenAI-compatible streaming client bound to one endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client for the given base URL.
    ///
    /// The URL is normalized to end with `/v1`.
    pub fn new(base_url: &str) -> Self {
        let base_url = if base_url.ends_with("/v1") {
            base_url.to_string()
        } else {
            format!("{}/v1", base_url.trim_end_matches('/'))
        };
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// The chat completions endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Extract the payload of an SSE `data:` line; `None` for other lines
    /// and for the `[DONE]` sentinel.
    fn parse_sse_line(line: &str) -> Option<&str> {
        let data = line.strip_prefix("data: ")?;
        if data == "[DONE]" {
            None
        } else {
            Some(data)
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        extra_headers: &[(String, String)],
    ) -> Result<StreamedCompletion, DispatchError> {
        let launch_time = Utc::now();
        let start = Instant::now();

        let mut builder = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {DUMMY_API_KEY}"))
            .header("Content-Type", "application/json");
        for (key, value) in extra_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut body = String::new();
        let mut first_token: Option<Instant> = None;
        let mut prompt_tokens = 0u32;
        let mut completion_tokens = 0u32;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete lines, keeping any partial tail buffered
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if line.is_empty() {
                    continue;
                }
                let Some(data) = Self::parse_sse_line(&line) else {
                    continue;
                };
                let parsed: ChatChunk = serde_json::from_str(data).map_err(|e| {
                    DispatchError::Stream(format!("unparseable chunk: {e} (data: {data})"))
                })?;

                for choice in &parsed.choices {
                    if let Some(content) = &choice.delta.content {
                        if first_token.is_none() && !content.is_empty() {
                            first_token = Some(Instant::now());
                        }
                        body.push_str(content);
                    }
                }
                if let Some(usage) = parsed.usage {
                    prompt_tokens = usage.prompt_tokens;
                    completion_tokens = usage.completion_tokens;
                }
            }
        }

        let done = Instant::now();
        let ttft = first_token
            .map(|t| t.duration_since(start).as_secs_f64())
            .unwrap_or(0.0);
        let generation_time = first_token
            .map(|t| done.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);

        Ok(StreamedCompletion {
            body,
            ttft,
            generation_time,
            prompt_tokens,
            completion_tokens,
            launch_time,
            finish_time: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(
            OpenAiClient::new("http://localhost:8000").chat_url(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            OpenAiClient::new("http://localhost:8000/").chat_url(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            OpenAiClient::new("http://localhost:8000/v1").chat_url(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(
            OpenAiClient::parse_sse_line("data: {\"choices\":[]}"),
            Some("{\"choices\":[]}")
        );
        assert_eq!(OpenAiClient::parse_sse_line("data: [DONE]"), None);
        assert_eq!(OpenAiClient::parse_sse_line(": keepalive"), None);
        assert_eq!(OpenAiClient::parse_sse_line("event: ping"), None);
    }
}
