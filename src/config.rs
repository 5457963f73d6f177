//! Workload and per-user configuration

use std::path::PathBuf;
use std::sync::Arc;

use crate::trace::TraceRound;

/// Process-lifetime workload configuration
///
/// Built once at startup. Model and endpoint lists are resolved to exactly
/// one entry per agent: a single value broadcasts to every agent, any other
/// length mismatch is rejected.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of conversational agents per session
    pub num_agents: usize,
    /// Model identifier per agent (length == num_agents)
    pub models: Vec<String>,
    /// Endpoint base URL per agent (length == num_agents)
    pub base_urls: Vec<String>,
    /// Minimum think time between a session's rounds, seconds
    pub user_request_interval: f64,
    /// Gap between admitting new simulated users, seconds
    pub new_user_interval: f64,
    /// One trace file per simulated user, consumed in order
    pub trace_files: Vec<PathBuf>,
}

impl WorkloadConfig {
    /// Build and validate a workload configuration
    pub fn new(
        num_agents: usize,
        models: Vec<String>,
        base_urls: Vec<String>,
        user_request_interval: f64,
        new_user_interval: f64,
        trace_files: Vec<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if num_agents == 0 {
            return Err(ConfigError::InvalidAgentCount(
                "agent count must be at least 1".into(),
            ));
        }
        let models = broadcast(models, num_agents).map_err(ConfigError::InvalidModels)?;
        let base_urls = broadcast(base_urls, num_agents).map_err(ConfigError::InvalidEndpoints)?;
        for (label, value) in [
            ("user request interval", user_request_interval),
            ("new user interval", new_user_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidInterval(format!(
                    "{label} must be a non-negative number, got {value}"
                )));
            }
        }
        if trace_files.is_empty() {
            return Err(ConfigError::NoTraces);
        }

        Ok(Self {
            num_agents,
            models,
            base_urls,
            user_request_interval,
            new_user_interval,
            trace_files,
        })
    }
}

/// Broadcast a single value to `n` agents, or require exactly `n` values.
fn broadcast(values: Vec<String>, n: usize) -> Result<Vec<String>, String> {
    match values.len() {
        1 => Ok(vec![values.into_iter().next().expect("one value"); n]),
        len if len == n => Ok(values),
        len => Err(format!("expected 1 or {n} values, got {len}")),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid agent count
    #[error("invalid agent count: {0}")]
    InvalidAgentCount(String),

    /// Model list does not match the agent count
    #[error("invalid model binding: {0}")]
    InvalidModels(String),

    /// Endpoint list does not match the agent count
    #[error("invalid endpoint binding: {0}")]
    InvalidEndpoints(String),

    /// Negative or non-finite interval
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// No trace files supplied
    #[error("no trace files supplied")]
    NoTraces,
}

/// Per-user configuration derived from the workload on admission
#[derive(Debug, Clone)]
pub struct UserConfig {
    /// Simulated user id (1-based, admission order)
    pub user_id: usize,
    /// Number of conversational agents
    pub num_agents: usize,
    /// Minimum think time between rounds, seconds
    pub gap_between_requests: f64,
    /// This user's trace
    pub trace: Arc<Vec<TraceRound>>,
}

impl UserConfig {
    /// Derive a user config from the workload config and an assigned trace
    pub fn new_user(
        user_id: usize,
        workload: &WorkloadConfig,
        trace: Arc<Vec<TraceRound>>,
    ) -> Self {
        Self {
            user_id,
            num_agents: workload.num_agents,
            gap_between_requests: workload.user_request_interval,
            trace,
        }
    }
}
