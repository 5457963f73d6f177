//! Shared conversational history across all agents of one session

use crate::request::{Message, Role};
use crate::trace::InputRef;

/// Append-only record of per-agent-per-round utterances.
///
/// Owned by exactly one session. Entries are keyed by (agent, round); an
/// assistant entry never precedes its paired user entry.
#[derive(Debug, Default)]
pub struct ChatHistory {
    entries: Vec<HistoryEntry>,
}

#[derive(Debug)]
struct HistoryEntry {
    role: Role,
    agent_id: usize,
    round_id: usize,
    content: String,
}

impl HistoryEntry {
    fn to_message(&self) -> Message {
        Message::named(
            self.role,
            format!("agent{}-{}", self.agent_id, self.round_id),
            self.content.clone(),
        )
    }
}

impl ChatHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user query for (agent, round).
    ///
    /// Panics if an assistant reply was already recorded for that key; that
    /// ordering is a trace or scheduling bug, not a recoverable condition.
    pub fn on_user_query(&mut self, query: &str, agent_id: usize, round_id: usize) {
        assert!(
            !self.contains(Role::Assistant, agent_id, round_id),
            "assistant reply already recorded for agent {agent_id} round {round_id}"
        );
        self.entries.push(HistoryEntry {
            role: Role::User,
            agent_id,
            round_id,
            content: query.to_string(),
        });
    }

    /// Record an assistant reply for (agent, round).
    ///
    /// Panics if the history holds no user query yet, or if a reply was
    /// already recorded for that key.
    pub fn on_agent_response(&mut self, response: &str, agent_id: usize, round_id: usize) {
        assert!(!self.entries.is_empty(), "expected a user query first");
        assert!(
            !self.contains(Role::Assistant, agent_id, round_id),
            "duplicate assistant reply for agent {agent_id} round {round_id}"
        );
        self.entries.push(HistoryEntry {
            role: Role::Assistant,
            agent_id,
            round_id,
            content: response.to_string(),
        });
    }

    /// Assemble the context for a new query by (agent, round).
    ///
    /// For each input reference, in the given order: the referenced user
    /// entries (channel input/both), then the referenced assistant entries
    /// (channel output/both). The requesting agent's own fresh query for the
    /// current round is appended last, so the newly issued query is always
    /// the final message sent.
    pub fn messages_for(
        &self,
        input_from: &[InputRef],
        agent_id: usize,
        round_id: usize,
    ) -> Vec<Message> {
        let mut messages = Vec::new();
        for input_ref in input_from {
            if input_ref.channel().includes_input() {
                self.collect(&mut messages, Role::User, input_ref.agent_id(), input_ref.round_id());
            }
            if input_ref.channel().includes_output() {
                self.collect(
                    &mut messages,
                    Role::Assistant,
                    input_ref.agent_id(),
                    input_ref.round_id(),
                );
            }
        }
        self.collect(&mut messages, Role::User, agent_id, round_id);
        messages
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, role: Role, agent_id: usize, round_id: usize) -> bool {
        self.entries
            .iter()
            .any(|e| e.role == role && e.agent_id == agent_id && e.round_id == round_id)
    }

    fn collect(&self, out: &mut Vec<Message>, role: Role, agent_id: usize, round_id: usize) {
        out.extend(
            self.entries
                .iter()
                .filter(|e| e.role == role && e.agent_id == agent_id && e.round_id == round_id)
                .map(HistoryEntry::to_message),
        );
    }
}
