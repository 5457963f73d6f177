//! agentic-bench: trace-driven multi-agent conversational traffic benchmark
//!
//! Simulates many independent multi-round conversations against one or more
//! OpenAI-compatible streaming chat-completion endpoints and measures serving
//! performance: time-to-first-token, per-request generation throughput, and
//! window-bounded aggregate request/token rates.
//!
//! The engine is built around a non-blocking control loop:
//!
//! - [`manager::SessionManager`] admits one simulated user per trace at a
//!   configured cadence, ticks every live session, and retires finished ones.
//! - [`session::UserSession`] is a closed-loop state machine: a user never
//!   starts its next round until the previous round is fully served and a
//!   minimum think time has elapsed.
//! - [`executor::RequestExecutor`] dispatches streaming requests onto the
//!   runtime fire-and-forget; completions flow back through per-session
//!   inboxes drained once per tick, so no state needs locking.
//! - [`history::ChatHistory`] keeps the shared conversational context across
//!   all agents within a session.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod manager;
pub mod output;
pub mod request;
pub mod session;
pub mod summary;
pub mod trace;

pub use client::{ChatClient, OpenAiClient, StreamedCompletion};
pub use config::{UserConfig, WorkloadConfig};
pub use error::{BenchError, BenchResult, DispatchError};
pub use executor::{Completion, RequestExecutor};
pub use history::ChatHistory;
pub use manager::SessionManager;
pub use session::UserSession;
pub use summary::{LatencyPercentiles, RequestRow, WindowSummary};
pub use trace::{Channel, InputRef, TraceRound};
