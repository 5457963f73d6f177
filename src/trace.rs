//! Trace records: one JSON round per line, one file per simulated user

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which side of a prior exchange feeds the next query's context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The prior user query only
    Input,
    /// The prior assistant reply only
    Output,
    /// Both sides of the exchange
    Both,
}

impl Channel {
    /// Whether the prior user query is included
    pub fn includes_input(self) -> bool {
        matches!(self, Channel::Input | Channel::Both)
    }

    /// Whether the prior assistant reply is included
    pub fn includes_output(self) -> bool {
        matches!(self, Channel::Output | Channel::Both)
    }
}

/// Reference to a prior exchange: `[round_id, agent_id, channel]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRef(pub usize, pub usize, pub Channel);

impl InputRef {
    /// Round the referenced exchange happened in
    pub fn round_id(&self) -> usize {
        self.0
    }

    /// Agent that handled the referenced exchange
    pub fn agent_id(&self) -> usize {
        self.1
    }

    /// Which side(s) of the exchange to include
    pub fn channel(&self) -> Channel {
        self.2
    }
}

/// One round of a trace: parallel per-request arrays
///
/// All three fields are required and must agree in length; each index is one
/// request issued concurrently within the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRound {
    /// Target agent per request
    pub agent_id: Vec<usize>,
    /// Output token budget per request
    pub output_tokens: Vec<u32>,
    /// Context references per request
    pub input_from: Vec<Vec<InputRef>>,
}

impl TraceRound {
    /// Number of requests in this round
    pub fn len(&self) -> usize {
        self.agent_id.len()
    }

    /// Whether the round carries no requests
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty()
    }

    fn is_consistent(&self) -> bool {
        !self.agent_id.is_empty()
            && self.output_tokens.len() == self.agent_id.len()
            && self.input_from.len() == self.agent_id.len()
    }
}

/// Load a trace file, one independently parsed round per line.
///
/// Malformed lines (bad JSON, missing fields, mismatched per-request arrays)
/// are skipped with a warning; only IO failures are fatal.
pub fn load_trace(path: &Path) -> std::io::Result<Vec<TraceRound>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rounds = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceRound>(line) {
            Ok(round) if round.is_consistent() => rounds.push(round),
            Ok(_) => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    "trace round has mismatched per-request arrays, skipping"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed trace line"
                );
            }
        }
    }

    Ok(rounds)
}
