//! Per-request rows and window-bounded performance summaries

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::request::Message;

/// One completed request's measurements
#[derive(Debug, Clone, Serialize)]
pub struct RequestRow {
    /// Prompt tokens reported by the endpoint (0 if no usage record arrived)
    pub prompt_tokens: u32,
    /// Generated tokens reported by the endpoint (0 if no usage record arrived)
    pub generation_tokens: u32,
    /// Time to first token, seconds (0.0 if no token ever arrived)
    pub ttft: f64,
    /// First token to completion, seconds (0.0 if no token ever arrived)
    pub generation_time: f64,
    /// Owning simulated user
    pub user_id: usize,
    /// Round the request belonged to
    pub round_id: usize,
    /// When the request was launched
    pub launch_time: DateTime<Utc>,
    /// When the response completed
    pub finish_time: DateTime<Utc>,
    /// Agent that served the request
    pub agent_id: usize,
    /// The dispatched context, exactly as sent
    pub input: Vec<Message>,
    /// The streamed response body
    pub output: String,
}

/// Point-in-time performance summary over a clamped time window.
///
/// Every rate divides by the same window duration; none of the figures are
/// per-row rates except the explicitly per-request generation throughput.
#[derive(Debug, Clone)]
pub struct WindowSummary {
    /// Window start (already clamped by the caller)
    pub window_start: DateTime<Utc>,
    /// Window end (already clamped by the caller)
    pub window_end: DateTime<Utc>,
    /// Window duration, seconds
    pub duration_secs: f64,
    /// Requests launched inside the window
    pub launched_requests: usize,
    /// Requests finished inside the window
    pub finished_requests: usize,
    /// Live sessions with at least one request in flight
    pub pending_sessions: usize,
    /// (finished + pending) / duration
    pub request_rate: f64,
    /// finished / duration
    pub finished_rate: f64,
    /// Summed prompt tokens / duration
    pub prompt_tokens_per_sec: f64,
    /// Summed generation tokens / duration
    pub generation_tokens_per_sec: f64,
    /// Mean over rows of generation_tokens / generation_time
    pub mean_generation_speed_per_request: f64,
    /// Mean time to first token, seconds
    pub mean_ttft: f64,
    /// TTFT distribution over the finished rows, seconds
    pub ttft_percentiles: LatencyPercentiles,
}

impl WindowSummary {
    /// Aggregate rows over `[start, end]`.
    ///
    /// Launched counts rows by launch timestamp, every other statistic is
    /// computed over rows whose finish timestamp falls inside the window.
    pub fn from_rows(
        rows: &[&RequestRow],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        pending_sessions: usize,
    ) -> Self {
        let launched_requests = rows
            .iter()
            .filter(|r| r.launch_time >= start && r.launch_time <= end)
            .count();
        let finished: Vec<&&RequestRow> = rows
            .iter()
            .filter(|r| r.finish_time >= start && r.finish_time <= end)
            .collect();
        let finished_requests = finished.len();

        let duration_secs = (end - start).num_microseconds().unwrap_or(0) as f64 / 1e6;
        let rate = if duration_secs > 0.0 {
            1.0 / duration_secs
        } else {
            0.0
        };

        let prompt_tokens: u64 = finished.iter().map(|r| r.prompt_tokens as u64).sum();
        let generation_tokens: u64 = finished.iter().map(|r| r.generation_tokens as u64).sum();

        let per_request_speeds: Vec<f64> = finished
            .iter()
            .filter(|r| r.generation_time > 0.0)
            .map(|r| r.generation_tokens as f64 / r.generation_time)
            .collect();
        let ttfts: Vec<f64> = finished.iter().map(|r| r.ttft).collect();

        Self {
            window_start: start,
            window_end: end,
            duration_secs,
            launched_requests,
            finished_requests,
            pending_sessions,
            request_rate: (finished_requests + pending_sessions) as f64 * rate,
            finished_rate: finished_requests as f64 * rate,
            prompt_tokens_per_sec: prompt_tokens as f64 * rate,
            generation_tokens_per_sec: generation_tokens as f64 * rate,
            mean_generation_speed_per_request: mean(&per_request_speeds),
            mean_ttft: mean(&ttfts),
            ttft_percentiles: LatencyPercentiles::from_values(&ttfts),
        }
    }
}

impl std::fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "==================== Performance summary ======================")?;
        writeln!(f, "  Processing speed:        {:.4} reqs/s", self.finished_rate)?;
        writeln!(f, "  Overall request rate:    {:.4} reqs/s", self.request_rate)?;
        writeln!(f, "  Requests on-the-fly:     {}", self.pending_sessions)?;
        writeln!(
            f,
            "  Input tokens per second:   {:.4} tokens/s",
            self.prompt_tokens_per_sec
        )?;
        writeln!(
            f,
            "  Output tokens per second:  {:.4} tokens/s",
            self.generation_tokens_per_sec
        )?;
        writeln!(
            f,
            "  Generation throughput:     {:.4} tokens/req/s",
            self.mean_generation_speed_per_request
        )?;
        writeln!(
            f,
            "  Average TTFT:              {:.4}s (p50 {:.4}s, p99 {:.4}s)",
            self.mean_ttft, self.ttft_percentiles.p50, self.ttft_percentiles.p99
        )?;
        writeln!(
            f,
            "  Launched / finished:       {} / {}",
            self.launched_requests, self.finished_requests
        )?;
        writeln!(
            f,
            "  Time range: {} - {} ({:.2}s)",
            self.window_start, self.window_end, self.duration_secs
        )?;
        write!(f, "===============================================================")
    }
}

/// Latency distribution (values in seconds)
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyPercentiles {
    /// Minimum value
    pub min: f64,
    /// Median
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from a slice of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            min: sorted[0],
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p99: percentile(&sorted, 0.99),
            max: sorted[sorted.len() - 1],
            mean: mean(&sorted),
        }
    }
}

/// Percentile from sorted values using linear interpolation
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(launch_secs: i64, finish_secs: i64, prompt: u32, generated: u32) -> RequestRow {
        RequestRow {
            prompt_tokens: prompt,
            generation_tokens: generated,
            ttft: 0.5,
            generation_time: 2.0,
            user_id: 1,
            round_id: 0,
            launch_time: Utc.timestamp_opt(launch_secs, 0).unwrap(),
            finish_time: Utc.timestamp_opt(finish_secs, 0).unwrap(),
            agent_id: 0,
            input: Vec::new(),
            output: String::new(),
        }
    }

    #[test]
    fn test_covering_window_rates_are_exact() {
        let rows = vec![
            row(100, 105, 10, 20),
            row(101, 106, 10, 20),
            row(102, 107, 10, 20),
            row(103, 108, 10, 20),
        ];
        let refs: Vec<&RequestRow> = rows.iter().collect();
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(120, 0).unwrap();

        let summary = WindowSummary::from_rows(&refs, start, end, 0);
        assert_eq!(summary.launched_requests, 4);
        assert_eq!(summary.finished_requests, 4);
        assert!((summary.duration_secs - 20.0).abs() < 1e-9);
        assert!((summary.finished_rate - 4.0 / 20.0).abs() < 1e-9);
        assert!((summary.request_rate - 4.0 / 20.0).abs() < 1e-9);
        assert!((summary.prompt_tokens_per_sec - 40.0 / 20.0).abs() < 1e-9);
        assert!((summary.generation_tokens_per_sec - 80.0 / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_excludes_outside_rows() {
        let rows = vec![row(100, 105, 10, 20), row(200, 205, 10, 20)];
        let refs: Vec<&RequestRow> = rows.iter().collect();
        let start = Utc.timestamp_opt(90, 0).unwrap();
        let end = Utc.timestamp_opt(110, 0).unwrap();

        let summary = WindowSummary::from_rows(&refs, start, end, 0);
        assert_eq!(summary.launched_requests, 1);
        assert_eq!(summary.finished_requests, 1);
    }

    #[test]
    fn test_pending_sessions_count_toward_request_rate() {
        let rows = vec![row(100, 105, 10, 20)];
        let refs: Vec<&RequestRow> = rows.iter().collect();
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(110, 0).unwrap();

        let summary = WindowSummary::from_rows(&refs, start, end, 3);
        assert!((summary.request_rate - 4.0 / 10.0).abs() < 1e-9);
        assert!((summary.finished_rate - 1.0 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_request_speed_skips_zero_generation_time() {
        let mut degenerate = row(100, 101, 10, 0);
        degenerate.generation_time = 0.0;
        let normal = row(100, 105, 10, 20); // 20 tokens / 2.0s = 10 tokens/s
        let rows = vec![degenerate, normal];
        let refs: Vec<&RequestRow> = rows.iter().collect();
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(110, 0).unwrap();

        let summary = WindowSummary::from_rows(&refs, start, end, 0);
        assert!((summary.mean_generation_speed_per_request - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_reports_zeros() {
        let refs: Vec<&RequestRow> = Vec::new();
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(110, 0).unwrap();

        let summary = WindowSummary::from_rows(&refs, start, end, 0);
        assert_eq!(summary.finished_requests, 0);
        assert_eq!(summary.mean_ttft, 0.0);
        assert_eq!(summary.mean_generation_speed_per_request, 0.0);
    }

    #[test]
    fn test_percentile_calculation() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let p = LatencyPercentiles::from_values(&values);

        assert_eq!(p.min, 1.0);
        assert_eq!(p.max, 10.0);
        assert!((p.p50 - 5.5).abs() < 0.01);
        assert!((p.mean - 5.5).abs() < 0.01);
    }

    #[test]
    fn test_percentile_single_value() {
        let p = LatencyPercentiles::from_values(&[42.0]);
        assert_eq!(p.min, 42.0);
        assert_eq!(p.p50, 42.0);
        assert_eq!(p.max, 42.0);
    }

    #[test]
    fn test_percentile_empty() {
        let p = LatencyPercentiles::from_values(&[]);
        assert_eq!(p.min, 0.0);
        assert_eq!(p.max, 0.0);
        assert_eq!(p.mean, 0.0);
    }

    #[test]
    fn test_summary_display_renders_banner() {
        let rows = vec![row(100, 105, 10, 20)];
        let refs: Vec<&RequestRow> = rows.iter().collect();
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let end = Utc.timestamp_opt(110, 0).unwrap();

        let rendered = WindowSummary::from_rows(&refs, start, end, 0).to_string();
        assert!(rendered.contains("Performance summary"));
        assert!(rendered.contains("Processing speed"));
        assert!(rendered.contains("reqs/s"));
    }
}
