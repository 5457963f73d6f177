//! Session admission, ticking, retirement, and summary production

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::config::{UserConfig, WorkloadConfig};
use crate::error::BenchResult;
use crate::executor::RequestExecutor;
use crate::session::UserSession;
use crate::summary::{RequestRow, WindowSummary};
use crate::trace::{self, TraceRound};

/// Manages the closed population of simulated users.
///
/// One session is admitted per unconsumed trace, in file order, at the
/// configured cadence; admission stops permanently once the traces are
/// exhausted. Finished sessions are retired each tick and their rows folded
/// into the historical table.
pub struct SessionManager {
    config: WorkloadConfig,
    traces: Vec<Arc<Vec<TraceRound>>>,
    sessions: Vec<UserSession>,
    history_rows: Vec<RequestRow>,
    next_user_id: usize,
    last_user_join: Option<Instant>,
    admitting: bool,
    start_time: Option<DateTime<Utc>>,
}

impl SessionManager {
    /// Load every trace file and prepare for admission.
    ///
    /// Malformed trace lines are skipped inside the loader; only IO failures
    /// are fatal here.
    pub fn new(config: WorkloadConfig) -> BenchResult<Self> {
        let mut traces = Vec::with_capacity(config.trace_files.len());
        for path in &config.trace_files {
            let rounds = trace::load_trace(path)?;
            tracing::info!(
                path = %path.display(),
                rounds = rounds.len(),
                "loaded trace"
            );
            traces.push(Arc::new(rounds));
        }

        tracing::info!(
            new_user_interval = config.new_user_interval,
            user_request_interval = config.user_request_interval,
            users = traces.len(),
            "session manager ready"
        );

        Ok(Self {
            config,
            traces,
            sessions: Vec::new(),
            history_rows: Vec::new(),
            next_user_id: 0,
            last_user_join: None,
            admitting: true,
            start_time: None,
        })
    }

    /// Total number of requests across all loaded traces
    pub fn total_requests(&self) -> usize {
        self.traces
            .iter()
            .map(|t| t.iter().map(TraceRound::len).sum::<usize>())
            .sum()
    }

    /// Requests completed so far, historical and in-progress sessions included
    pub fn completed_requests(&self) -> usize {
        self.history_rows.len() + self.sessions.iter().map(|s| s.rows().len()).sum::<usize>()
    }

    /// Number of live sessions
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Halt any further admission (used on interrupt)
    pub fn stop_admission(&mut self) {
        self.admitting = false;
    }

    /// One control-loop tick: admit if due, step every live session, retire
    /// the finished ones.
    ///
    /// Returns `false` once admission is exhausted and no live sessions
    /// remain. A dispatch failure from any session aborts the tick.
    pub fn step(&mut self, now: Instant, executor: &RequestExecutor) -> BenchResult<bool> {
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
        }

        if self.admitting && self.admission_due(now) {
            self.admit_user(now);
        }

        for session in &mut self.sessions {
            session.step(now, executor)?;
        }

        self.retire_finished();

        Ok(self.admitting || !self.sessions.is_empty())
    }

    /// Point-in-time summary over `[window_start, window_end]`.
    ///
    /// The window start is clamped up to the process start and the end down
    /// to the latest observed finish timestamp. Returns `None` until at least
    /// one request has completed.
    pub fn summary(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Option<WindowSummary> {
        let mut rows: Vec<&RequestRow> = self.history_rows.iter().collect();
        for session in &self.sessions {
            rows.extend(session.rows());
        }
        if rows.is_empty() {
            return None;
        }

        let pending = self
            .sessions
            .iter()
            .filter(|s| s.in_flight() > 0)
            .count();
        let start_time = self.start_time?;
        let max_finish = rows.iter().map(|r| r.finish_time).max()?;

        let start = window_start.max(start_time);
        let end = window_end.min(max_finish);

        Some(WindowSummary::from_rows(&rows, start, end, pending))
    }

    /// Consume the manager, yielding every accumulated row: retired sessions
    /// first, then the still-live ones, each in completion order.
    pub fn into_rows(self) -> Vec<RequestRow> {
        let mut rows = self.history_rows;
        for session in self.sessions {
            rows.extend(session.into_rows());
        }
        rows
    }

    fn admission_due(&self, now: Instant) -> bool {
        self.last_user_join.map_or(true, |last| {
            now.duration_since(last).as_secs_f64() > self.config.new_user_interval
        })
    }

    fn admit_user(&mut self, now: Instant) {
        let Some(trace) = self.traces.get(self.next_user_id) else {
            self.admitting = false;
            return;
        };
        let user_id = self.next_user_id + 1;
        let user_config = UserConfig::new_user(user_id, &self.config, Arc::clone(trace));
        self.sessions.push(UserSession::new(user_config));
        self.next_user_id += 1;
        self.last_user_join = Some(now);
        tracing::info!(
            user_id,
            active_sessions = self.sessions.len(),
            "admitted new user"
        );

        if self.next_user_id == self.traces.len() {
            self.admitting = false;
            tracing::info!("all traces consumed, admission closed");
        }
    }

    fn retire_finished(&mut self) {
        if !self.sessions.iter().any(UserSession::finished) {
            return;
        }

        let mut live = Vec::with_capacity(self.sessions.len());
        let mut retired = 0;
        for session in self.sessions.drain(..) {
            if session.finished() {
                retired += 1;
                self.history_rows.extend(session.into_rows());
            } else {
                live.push(session);
            }
        }
        self.sessions = live;
        tracing::info!(
            retired,
            active_sessions = self.sessions.len(),
            "removed finished sessions"
        );
    }
}
