//! CSV export of the per-request row table

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::summary::RequestRow;

/// Writes the final row table
pub struct CsvExporter;

impl CsvExporter {
    /// Export one row per completed request.
    ///
    /// Timestamps are unix seconds with microsecond precision; the input
    /// context is JSON-encoded into a single column.
    pub fn export(rows: &[RequestRow], path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output file: {}", path.display()))?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record([
            "prompt_tokens",
            "generation_tokens",
            "ttft",
            "generation_time",
            "user_id",
            "round_id",
            "launch_time",
            "finish_time",
            "agent_id",
            "input",
            "output",
        ])?;

        for row in rows {
            wtr.write_record([
                row.prompt_tokens.to_string(),
                row.generation_tokens.to_string(),
                format!("{:.6}", row.ttft),
                format!("{:.6}", row.generation_time),
                row.user_id.to_string(),
                row.round_id.to_string(),
                format!("{:.6}", unix_seconds(row.launch_time)),
                format!("{:.6}", unix_seconds(row.finish_time)),
                row.agent_id.to_string(),
                serde_json::to_string(&row.input)?,
                row.output.clone(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

fn unix_seconds(ts: chrono::DateTime<chrono::Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Message;
    use chrono::{TimeZone, Utc};

    fn sample_row() -> RequestRow {
        RequestRow {
            prompt_tokens: 10,
            generation_tokens: 5,
            ttft: 0.25,
            generation_time: 1.5,
            user_id: 1,
            round_id: 0,
            launch_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            finish_time: Utc.timestamp_opt(1_700_000_002, 0).unwrap(),
            agent_id: 0,
            input: vec![Message::user("hi")],
            output: "hello".to_string(),
        }
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        CsvExporter::export(&[sample_row(), sample_row()], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("prompt_tokens,generation_tokens,ttft"));
        assert_eq!(lines.count(), 2);
        assert!(content.contains("1700000000.000000"));
    }

    #[test]
    fn test_export_encodes_input_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        CsvExporter::export(&[sample_row()], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"\"role\"\":\"\"user\"\""));
    }
}
