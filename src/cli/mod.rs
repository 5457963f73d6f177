//! CLI argument parsing and the benchmark driver loop

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::WorkloadConfig;
use crate::executor::RequestExecutor;
use crate::manager::SessionManager;
use crate::output::CsvExporter;

/// Cadence of the control loop; sessions are paced in wall-clock time, so
/// the tick only bounds scheduling granularity, not throughput.
const STEP_INTERVAL: Duration = Duration::from_millis(100);

/// Multi-agent conversational traffic benchmark for LLM serving endpoints
#[derive(Parser, Debug)]
#[command(name = "agentic-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of conversational agents per simulated user
    #[arg(long)]
    pub num_agents: usize,

    /// Model name per agent; a single value applies to all agents
    #[arg(long, num_args = 1.., required = true)]
    pub model: Vec<String>,

    /// Endpoint base URL per agent; a single value applies to all agents
    #[arg(long, num_args = 1.., required = true)]
    pub base_url: Vec<String>,

    /// Minimum think time between a user's rounds, seconds
    #[arg(long)]
    pub user_request_interval: f64,

    /// Gap between admitting new simulated users, seconds
    #[arg(long)]
    pub new_user_interval: f64,

    /// Trace file per simulated user, consumed in order
    #[arg(long, num_args = 1.., required = true)]
    pub trace_file: Vec<PathBuf>,

    /// Output CSV for the per-request row table
    #[arg(long, default_value = "summary.csv")]
    pub output: PathBuf,

    /// Seconds between periodic performance summaries
    #[arg(long, default_value_t = 30)]
    pub summary_interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run the benchmark to completion (or interrupt) and dump the results
    pub async fn run(&self) -> Result<()> {
        let config = WorkloadConfig::new(
            self.num_agents,
            self.model.clone(),
            self.base_url.clone(),
            self.user_request_interval,
            self.new_user_interval,
            self.trace_file.clone(),
        )
        .context("invalid workload configuration")?;

        self.print_banner(&config);

        let executor = RequestExecutor::new(&config.base_urls, &config.models);
        let mut manager = SessionManager::new(config).context("failed to load traces")?;

        let total_requests = manager.total_requests();
        let progress = ProgressBar::new(total_requests as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .expect("valid progress template")
                .progress_chars("#>-"),
        );

        let summary_interval = Duration::from_secs(self.summary_interval);
        let mut ticker = tokio::time::interval(STEP_INTERVAL);
        let mut last_summary = Instant::now();
        let mut last_summary_wall = Utc::now();
        let mut interrupted = false;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                biased;

                _ = &mut ctrl_c => {
                    tracing::info!("interrupted, stopping admission and issuance");
                    manager.stop_admission();
                    interrupted = true;
                    break;
                }

                _ = ticker.tick() => {
                    let keep_going = manager
                        .step(Instant::now(), &executor)
                        .context("benchmark aborted")?;
                    progress.set_position(manager.completed_requests() as u64);

                    if last_summary.elapsed() >= summary_interval {
                        if let Some(summary) = manager.summary(last_summary_wall, Utc::now()) {
                            progress.suspend(|| println!("\n{summary}\n"));
                        }
                        last_summary = Instant::now();
                        last_summary_wall = Utc::now();
                    }

                    if !keep_going {
                        break;
                    }
                }
            }
        }

        progress.finish_and_clear();
        if interrupted {
            tracing::info!("dumping results collected before the interrupt");
        }

        if let Some(summary) = manager.summary(DateTime::<Utc>::MIN_UTC, Utc::now()) {
            println!("\n{summary}\n");
        }

        let rows = manager.into_rows();
        tracing::info!(
            rows = rows.len(),
            output = %self.output.display(),
            "finished benchmarking, dumping summary"
        );
        CsvExporter::export(&rows, &self.output)
            .with_context(|| format!("failed to write {}", self.output.display()))?;

        Ok(())
    }

    fn print_banner(&self, config: &WorkloadConfig) {
        println!("{}", "=".repeat(70));
        println!("   agentic-bench - multi-agent LLM serving benchmark");
        println!("{}", "=".repeat(70));
        println!("  Agents:                {}", config.num_agents);
        println!("  Models:                {}", config.models.join(", "));
        println!("  Endpoints:             {}", config.base_urls.join(", "));
        println!("  Think time per user:   {}s", config.user_request_interval);
        println!("  New user interval:     {}s", config.new_user_interval);
        println!("  Traces:                {}", config.trace_files.len());
        println!("  Output:                {}", self.output.display());
        println!("{}", "=".repeat(70));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_broadcast_model() {
        let cli = Cli::parse_from([
            "agentic-bench",
            "--num-agents",
            "3",
            "--model",
            "llama",
            "--base-url",
            "http://localhost:8000",
            "--user-request-interval",
            "2.0",
            "--new-user-interval",
            "5.0",
            "--trace-file",
            "a.jsonl",
            "b.jsonl",
        ]);
        assert_eq!(cli.num_agents, 3);
        assert_eq!(cli.model, vec!["llama"]);
        assert_eq!(cli.trace_file.len(), 2);
        assert_eq!(cli.output, PathBuf::from("summary.csv"));
        assert_eq!(cli.summary_interval, 30);
    }

    #[test]
    fn test_cli_parses_per_agent_models() {
        let cli = Cli::parse_from([
            "agentic-bench",
            "--num-agents",
            "2",
            "--model",
            "m1",
            "m2",
            "--base-url",
            "http://a",
            "http://b",
            "--user-request-interval",
            "1",
            "--new-user-interval",
            "1",
            "--trace-file",
            "t.jsonl",
            "--output",
            "out.csv",
        ]);
        assert_eq!(cli.model, vec!["m1", "m2"]);
        assert_eq!(cli.base_url.len(), 2);
        assert_eq!(cli.output, PathBuf::from("out.csv"));
    }
}
