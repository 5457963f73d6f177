//! Per-user session state machine

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::config::UserConfig;
use crate::error::DispatchError;
use crate::executor::{Completion, CompletionReceiver, CompletionSender, RequestExecutor};
use crate::history::ChatHistory;
use crate::summary::RequestRow;

/// Fixed user-turn filler; traces carry conversation structure and token
/// budgets, not prompt text.
const SYNTHETIC_USER_QUERY: &str = "hihihihihi";

/// Pacing warnings are emitted at most once per this interval.
const PACING_WARNING_INTERVAL: Duration = Duration::from_secs(10);

/// One simulated user's multi-round conversation lifecycle.
///
/// A session is a closed loop: round N+1 is issued only after every round-N
/// request has completed *and* the configured think time has elapsed, so a
/// slow endpoint stretches the session rather than piling up requests.
/// Completions arrive on a single-consumer inbox drained once per tick,
/// which keeps all state mutation on the control loop without locks.
pub struct UserSession {
    config: UserConfig,
    history: ChatHistory,
    round_id: usize,
    last_request_time: Option<Instant>,
    in_flight: usize,
    finished: bool,
    last_pacing_warning: Option<Instant>,
    pacing_warnings: usize,
    rows: Vec<RequestRow>,
    completion_tx: CompletionSender,
    completion_rx: CompletionReceiver,
}

impl UserSession {
    /// Create a session for an admitted user
    pub fn new(config: UserConfig) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            config,
            history: ChatHistory::new(),
            round_id: 0,
            last_request_time: None,
            in_flight: 0,
            finished: false,
            last_pacing_warning: None,
            pacing_warnings: 0,
            rows: Vec::new(),
            completion_tx,
            completion_rx,
        }
    }

    /// Advance the session state machine by one tick.
    ///
    /// Drains completed requests first, then decides whether to issue the
    /// next round. Never blocks. A dispatch failure surfaces here and is
    /// fatal to the run.
    pub fn step(
        &mut self,
        now: Instant,
        executor: &RequestExecutor,
    ) -> Result<(), DispatchError> {
        self.drain_completions()?;

        if self.finished {
            return Ok(());
        }

        let num_rounds = self.config.trace.len();
        if self.round_id >= num_rounds && self.in_flight == 0 {
            self.finished = true;
            tracing::debug!(user_id = self.config.user_id, "session finished");
            return Ok(());
        }

        match self.last_request_time {
            // First invocation: round 0 goes out immediately, no think time.
            None => self.issue_current_round(now, executor),
            Some(last)
                if now.duration_since(last).as_secs_f64() > self.config.gap_between_requests =>
            {
                if self.in_flight > 0 {
                    self.warn_pacing(now);
                    return Ok(());
                }
                self.issue_current_round(now, executor);
            }
            _ => {}
        }

        Ok(())
    }

    /// Whether the trace is exhausted and every request has completed
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Number of issued requests whose completion has not been observed
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Simulated user id
    pub fn user_id(&self) -> usize {
        self.config.user_id
    }

    /// Pacing warnings emitted so far
    pub fn pacing_warnings(&self) -> usize {
        self.pacing_warnings
    }

    /// Measurement rows accumulated so far, one per completed request
    pub fn rows(&self) -> &[RequestRow] {
        &self.rows
    }

    /// Consume the session, yielding its rows
    pub fn into_rows(self) -> Vec<RequestRow> {
        self.rows
    }

    fn drain_completions(&mut self) -> Result<(), DispatchError> {
        loop {
            match self.completion_rx.try_recv() {
                Ok(Ok(completion)) => self.apply_completion(completion),
                Ok(Err(e)) => return Err(e),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        self.history
            .on_agent_response(&completion.body, completion.agent_id, completion.round_id);
        self.in_flight -= 1;
        tracing::debug!(
            user_id = self.config.user_id,
            agent_id = completion.agent_id,
            round_id = completion.round_id,
            prompt_tokens = completion.prompt_tokens,
            generation_tokens = completion.completion_tokens,
            "request finished"
        );
        self.rows.push(RequestRow {
            prompt_tokens: completion.prompt_tokens,
            generation_tokens: completion.completion_tokens,
            ttft: completion.ttft,
            generation_time: completion.generation_time,
            user_id: self.config.user_id,
            round_id: completion.round_id,
            launch_time: completion.launch_time,
            finish_time: completion.finish_time,
            agent_id: completion.agent_id,
            input: completion.input,
            output: completion.body,
        });
    }

    fn issue_current_round(&mut self, now: Instant, executor: &RequestExecutor) {
        let trace = std::sync::Arc::clone(&self.config.trace);
        let round = &trace[self.round_id];

        for request_id in 0..round.len() {
            let agent_id = round.agent_id[request_id];
            let max_tokens = round.output_tokens[request_id];
            let input_from = &round.input_from[request_id];

            self.history
                .on_user_query(SYNTHETIC_USER_QUERY, agent_id, self.round_id);
            let messages = self.history.messages_for(input_from, agent_id, self.round_id);
            executor.launch(
                messages,
                max_tokens,
                agent_id,
                self.round_id,
                vec![("x-user-id".to_string(), self.config.user_id.to_string())],
                self.completion_tx.clone(),
            );
            self.in_flight += 1;
        }

        self.round_id += 1;
        self.last_request_time = Some(now);
    }

    fn warn_pacing(&mut self, now: Instant) {
        let due = self
            .last_pacing_warning
            .map_or(true, |last| now.duration_since(last) >= PACING_WARNING_INTERVAL);
        if due {
            tracing::warn!(
                user_id = self.config.user_id,
                in_flight = self.in_flight,
                "session has unfinished requests and cannot keep the configured pacing"
            );
            self.last_pacing_warning = Some(now);
            self.pacing_warnings += 1;
        }
    }
}
