//! Asynchronous request dispatch bridge
//!
//! The executor owns one immutable (endpoint, model) binding per agent and a
//! handle to the runtime it spawns onto. `launch` never blocks: the control
//! loop keeps ticking while an arbitrary number of streaming requests are in
//! flight, and every completion comes back through the caller's inbox channel
//! to be drained on a later tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::client::{ChatClient, OpenAiClient};
use crate::error::DispatchError;
use crate::request::{ChatRequest, Message, StreamOptions};

/// One completed request, as delivered to the owning session's inbox
#[derive(Debug, Clone)]
pub struct Completion {
    /// Streamed response body
    pub body: String,
    /// Time to first token, seconds
    pub ttft: f64,
    /// First token to completion, seconds
    pub generation_time: f64,
    /// Prompt tokens (0 if the endpoint reported no usage)
    pub prompt_tokens: u32,
    /// Generated tokens (0 if the endpoint reported no usage)
    pub completion_tokens: u32,
    /// Wall-clock launch time
    pub launch_time: DateTime<Utc>,
    /// Wall-clock completion time
    pub finish_time: DateTime<Utc>,
    /// Agent that served the request
    pub agent_id: usize,
    /// Round the request belonged to
    pub round_id: usize,
    /// Echo of the dispatched context
    pub input: Vec<Message>,
}

/// Outcome of one dispatched request
pub type CompletionResult = Result<Completion, DispatchError>;

/// Sender half of a session's completion inbox
pub type CompletionSender = mpsc::UnboundedSender<CompletionResult>;

/// Receiver half of a session's completion inbox
pub type CompletionReceiver = mpsc::UnboundedReceiver<CompletionResult>;

struct AgentBinding {
    client: Arc<dyn ChatClient>,
    model: String,
}

/// Fire-and-forget dispatcher shared by all sessions
pub struct RequestExecutor {
    agents: Vec<AgentBinding>,
    handle: Handle,
}

impl RequestExecutor {
    /// Build an executor with one OpenAI-compatible client per agent.
    ///
    /// Must be called from within a tokio runtime; the current runtime
    /// becomes the dispatch context for every launched request.
    pub fn new(base_urls: &[String], models: &[String]) -> Self {
        let agents = base_urls
            .iter()
            .zip(models)
            .map(|(url, model)| AgentBinding {
                client: Arc::new(OpenAiClient::new(url)) as Arc<dyn ChatClient>,
                model: model.clone(),
            })
            .collect();
        Self {
            agents,
            handle: Handle::current(),
        }
    }

    /// Build an executor over caller-supplied clients (test seam)
    pub fn with_clients(clients: Vec<Arc<dyn ChatClient>>, models: Vec<String>) -> Self {
        let agents = clients
            .into_iter()
            .zip(models)
            .map(|(client, model)| AgentBinding { client, model })
            .collect();
        Self {
            agents,
            handle: Handle::current(),
        }
    }

    /// Number of configured agent bindings
    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    /// Launch one streaming request; returns immediately.
    ///
    /// The result, success or failure, is delivered through `completion_tx`
    /// from the dispatch context. Failures are not retried.
    pub fn launch(
        &self,
        messages: Vec<Message>,
        max_tokens: u32,
        agent_id: usize,
        round_id: usize,
        extra_headers: Vec<(String, String)>,
        completion_tx: CompletionSender,
    ) {
        let Some(binding) = self.agents.get(agent_id) else {
            let _ = completion_tx.send(Err(DispatchError::UnknownAgent(agent_id)));
            return;
        };
        let client = Arc::clone(&binding.client);
        let model = binding.model.clone();
        let input = messages.clone();

        self.handle.spawn(async move {
            tracing::debug!(agent_id, round_id, model = %model, "dispatching request");
            let request = ChatRequest {
                model,
                messages,
                stream: true,
                max_tokens,
                temperature: 0.0,
                stream_options: StreamOptions {
                    include_usage: true,
                },
            };
            let result = client
                .stream_chat(&request, &extra_headers)
                .await
                .map(|c| Completion {
                    body: c.body,
                    ttft: c.ttft,
                    generation_time: c.generation_time,
                    prompt_tokens: c.prompt_tokens,
                    completion_tokens: c.completion_tokens,
                    launch_time: c.launch_time,
                    finish_time: c.finish_time,
                    agent_id,
                    round_id,
                    input,
                });
            if let Err(e) = &result {
                tracing::error!(agent_id, round_id, error = %e, "request dispatch failed");
            }
            if completion_tx.send(result).is_err() {
                tracing::debug!(agent_id, round_id, "inbox closed before completion arrived");
            }
        });
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field(
                "models",
                &self.agents.iter().map(|a| &a.model).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StreamedCompletion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        body: String,
        prompt_tokens: u32,
        completion_tokens: u32,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(body: &str, prompt_tokens: u32, completion_tokens: u32) -> Self {
            Self {
                body: body.to_string(),
                prompt_tokens,
                completion_tokens,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream_chat(
            &self,
            _request: &ChatRequest,
            _extra_headers: &[(String, String)],
        ) -> Result<StreamedCompletion, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let launch_time = Utc::now();
            Ok(StreamedCompletion {
                body: self.body.clone(),
                ttft: 0.01,
                generation_time: 0.02,
                prompt_tokens: self.prompt_tokens,
                completion_tokens: self.completion_tokens,
                launch_time,
                finish_time: Utc::now(),
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn stream_chat(
            &self,
            _request: &ChatRequest,
            _extra_headers: &[(String, String)],
        ) -> Result<StreamedCompletion, DispatchError> {
            Err(DispatchError::Stream("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_launch_delivers_completion() {
        let client = Arc::new(ScriptedClient::new("reply", 10, 5));
        let executor = RequestExecutor::with_clients(
            vec![client.clone() as Arc<dyn ChatClient>],
            vec!["mock-model".to_string()],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        executor.launch(
            vec![Message::user("hi")],
            5,
            0,
            3,
            vec![("x-user-id".to_string(), "1".to_string())],
            tx,
        );

        let completion = rx.recv().await.unwrap().unwrap();
        assert_eq!(completion.body, "reply");
        assert_eq!(completion.prompt_tokens, 10);
        assert_eq!(completion.completion_tokens, 5);
        assert_eq!(completion.agent_id, 0);
        assert_eq!(completion.round_id, 3);
        assert_eq!(completion.input, vec![Message::user("hi")]);
        assert!(completion.finish_time >= completion.launch_time);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_delivers_failure() {
        let executor = RequestExecutor::with_clients(
            vec![Arc::new(FailingClient) as Arc<dyn ChatClient>],
            vec!["mock-model".to_string()],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        executor.launch(Vec::new(), 5, 0, 0, Vec::new(), tx);

        let result = rx.recv().await.unwrap();
        assert!(matches!(result, Err(DispatchError::Stream(_))));
    }

    #[tokio::test]
    async fn test_unknown_agent_is_reported() {
        let executor = RequestExecutor::with_clients(
            vec![Arc::new(ScriptedClient::new("x", 0, 0)) as Arc<dyn ChatClient>],
            vec!["mock-model".to_string()],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        executor.launch(Vec::new(), 5, 7, 0, Vec::new(), tx);

        let result = rx.recv().await.unwrap();
        assert!(matches!(result, Err(DispatchError::UnknownAgent(7))));
    }
}
