use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::models::record::UsageRecord;
use crate::core::usage::scanner;

// ── Session log structs ───────────────────────────────────────────────

#[derive(Deserialize)]
struct JsonlUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct JsonlMessage {
    model: Option<String>,
    usage: Option<JsonlUsage>,
}

#[derive(Deserialize)]
struct JsonlLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    timestamp: Option<String>,
    message: Option<JsonlMessage>,
}

/// Why a single log line contributed nothing.
///
/// Every variant is an expected steady-state condition; the fold counts
/// them and moves on to the next line.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("line is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("line is not a usage event")]
    NotUsage,
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event has no timestamp")]
    NoTimestamp,
}

/// Failure to read a whole log file. Only that file is dropped from the fold.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A counted assistant turn, already keyed by day and normalized model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub day: String,
    pub model: String,
    pub input: u64,
    pub output: u64,
}

/// Aggregation key: one record per (day, normalized model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub day: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
}

/// Running (day, model) totals. Folding is additive, so the result does not
/// depend on the order files or lines are visited in.
#[derive(Debug, Default)]
pub struct Aggregation {
    totals: HashMap<UsageKey, TokenTotals>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: UsageEvent) {
        let entry = self
            .totals
            .entry(UsageKey {
                day: event.day,
                model: event.model,
            })
            .or_default();
        entry.input = entry.input.saturating_add(event.input);
        entry.output = entry.output.saturating_add(event.output);
    }

    pub fn merge(&mut self, other: Aggregation) {
        for (key, totals) in other.totals {
            let entry = self.totals.entry(key).or_default();
            entry.input = entry.input.saturating_add(totals.input);
            entry.output = entry.output.saturating_add(totals.output);
        }
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Flatten into upload records, sorted by day then model.
    pub fn into_records(self) -> Vec<UsageRecord> {
        let mut entries: Vec<(UsageKey, TokenTotals)> = self.totals.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(key, totals)| UsageRecord {
                date: key.day,
                model: key.model,
                input: totals.input,
                output: totals.output,
            })
            .collect()
    }
}

/// Per-file line counts, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub counted: usize,
    pub skipped: usize,
}

/// Map a raw model id onto its family name. First match wins.
pub fn normalize_model(model: &str) -> String {
    if model.contains("opus") {
        "Opus".to_string()
    } else if model.contains("sonnet") {
        "Sonnet".to_string()
    } else if model.contains("haiku") {
        "Haiku".to_string()
    } else {
        model.to_string()
    }
}

/// Calendar-day prefix of an ISO-8601 timestamp (its first 10 characters).
fn day_prefix(timestamp: &str) -> &str {
    match timestamp.char_indices().nth(10) {
        Some((idx, _)) => &timestamp[..idx],
        None => timestamp,
    }
}

/// Cheap substring check before paying for a full JSON parse.
fn is_candidate_line(line: &str) -> bool {
    line.contains("assistant") && line.contains("usage")
}

/// Parse one log line into a usage event.
pub fn parse_line(raw: &[u8]) -> Result<UsageEvent, LineError> {
    let line = std::str::from_utf8(raw)?;
    if !is_candidate_line(line) {
        return Err(LineError::NotUsage);
    }

    let parsed: JsonlLine = serde_json::from_str(line)?;
    if parsed.line_type.as_deref() != Some("assistant") {
        return Err(LineError::NotUsage);
    }
    let message = parsed.message.ok_or(LineError::NotUsage)?;
    let usage = message.usage.ok_or(LineError::NotUsage)?;
    let timestamp = parsed
        .timestamp
        .filter(|ts| !ts.is_empty())
        .ok_or(LineError::NoTimestamp)?;

    let model = message
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or("unknown");

    Ok(UsageEvent {
        day: day_prefix(&timestamp).to_string(),
        model: normalize_model(model),
        input: usage.input_tokens.unwrap_or(0),
        output: usage.output_tokens.unwrap_or(0),
    })
}

/// Fold one session log into `aggregation`.
///
/// Lines are parsed independently and bad ones are skipped. With `min_date`,
/// events whose day sorts before it are dropped; `YYYY-MM-DD` strings order
/// the same lexicographically and chronologically. The file's events are only
/// merged once the whole file has been read, so a read error mid-file leaves
/// `aggregation` untouched.
pub fn fold_file(
    path: &Path,
    min_date: Option<&str>,
    aggregation: &mut Aggregation,
) -> Result<FileStats, ExtractError> {
    let file = std::fs::File::open(path).map_err(|source| ExtractError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = std::io::BufReader::new(file);

    let mut local = Aggregation::new();
    let mut stats = FileStats::default();
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| ExtractError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if bytes_read == 0 {
            break;
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        // Bad lines are an expected part of append-only logs; skip them.
        let event = match parse_line(&buf) {
            Ok(e) => e,
            Err(_) => {
                stats.skipped += 1;
                continue;
            }
        };

        if let Some(floor) = min_date {
            if event.day.as_str() < floor {
                stats.skipped += 1;
                continue;
            }
        }

        local.add(event);
        stats.counted += 1;
    }

    aggregation.merge(local);
    Ok(stats)
}

/// Fold every file in `files`, dropping the ones that can't be read.
fn fold_files<I>(files: I, min_date: Option<&str>) -> Aggregation
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut aggregation = Aggregation::new();
    for path in files {
        match fold_file(&path, min_date, &mut aggregation) {
            Ok(stats) => {
                tracing::debug!(
                    path = %path.display(),
                    counted = stats.counted,
                    skipped = stats.skipped,
                    "Folded session log"
                );
            }
            // Only this file drops out.
            Err(err) => tracing::debug!(error = %err, "Skipping session log"),
        }
    }
    tracing::debug!(keys = aggregation.len(), "Aggregation finished");
    aggregation
}

/// Aggregate every session log under `root`, with no date filter.
pub fn extract_all(root: &Path) -> Vec<UsageRecord> {
    fold_files(scanner::discover(root), None).into_records()
}

/// Aggregate only logs modified strictly after `since_ms`, keeping events
/// on or after `min_date`.
pub fn extract_modified(root: &Path, since_ms: i64, min_date: Option<&str>) -> Vec<UsageRecord> {
    let modified = scanner::discover(root)
        .into_iter()
        .filter(|path| match scanner::mtime_ms(path) {
            Some(mtime) => mtime > since_ms,
            None => false,
        });
    fold_files(modified, min_date).into_records()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn assistant_line(ts: &str, model: &str, input: u64, output: u64) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{}","message":{{"model":"{}","usage":{{"input_tokens":{},"output_tokens":{}}}}}}}"#,
            ts, model, input, output
        )
    }

    fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn totals(aggregation: &Aggregation, day: &str, model: &str) -> Option<TokenTotals> {
        aggregation
            .totals
            .get(&UsageKey {
                day: day.to_string(),
                model: model.to_string(),
            })
            .copied()
    }

    fn set_mtime_ms(path: &Path, ms: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_millis(ms))
            .unwrap();
    }

    #[test]
    fn normalize_model_families() {
        assert_eq!(normalize_model("claude-3-opus-20240229"), "Opus");
        assert_eq!(normalize_model("claude-3-5-sonnet"), "Sonnet");
        assert_eq!(normalize_model("claude-3-haiku"), "Haiku");
        assert_eq!(normalize_model("some-other-model"), "some-other-model");
    }

    #[test]
    fn normalize_model_is_case_sensitive_and_ordered() {
        assert_eq!(normalize_model("Claude-OPUS"), "Claude-OPUS");
        assert_eq!(normalize_model("opus-sonnet-haiku"), "Opus");
        assert_eq!(normalize_model("sonnet-haiku"), "Sonnet");
    }

    #[test]
    fn day_prefix_truncates_to_ten_chars() {
        assert_eq!(day_prefix("2025-02-24T10:00:00.000Z"), "2025-02-24");
        assert_eq!(day_prefix("2025-02-24"), "2025-02-24");
        assert_eq!(day_prefix("2025"), "2025");
    }

    #[test]
    fn parse_line_counts_assistant_usage() {
        let line = assistant_line("2025-02-24T10:00:00Z", "claude-sonnet-4-5", 1000, 200);
        let event = parse_line(line.as_bytes()).unwrap();
        assert_eq!(
            event,
            UsageEvent {
                day: "2025-02-24".into(),
                model: "Sonnet".into(),
                input: 1000,
                output: 200,
            }
        );
    }

    #[test]
    fn parse_line_defaults_missing_counts_and_model() {
        let line = r#"{"type":"assistant","timestamp":"2025-02-24T10:00:00Z","message":{"usage":{}}}"#;
        let event = parse_line(line.as_bytes()).unwrap();
        assert_eq!(event.model, "unknown");
        assert_eq!(event.input, 0);
        assert_eq!(event.output, 0);
    }

    #[test]
    fn parse_line_maps_empty_model_to_unknown() {
        let line = r#"{"type":"assistant","timestamp":"2025-02-24T10:00:00Z","message":{"model":"","usage":{"input_tokens":1}}}"#;
        let event = parse_line(line.as_bytes()).unwrap();
        assert_eq!(event.model, "unknown");
        assert_eq!(event.input, 1);
    }

    #[test]
    fn huge_token_counts_saturate_instead_of_overflowing() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "proj-a/big.jsonl",
            &[
                assistant_line("2025-05-01T10:00:00Z", "claude-opus-4", u64::MAX, 1),
                assistant_line("2025-05-01T11:00:00Z", "claude-opus-4", u64::MAX, 1),
            ],
        );
        write_log(
            dir.path(),
            "proj-b/big.jsonl",
            &[assistant_line("2025-05-01T12:00:00Z", "claude-opus-4", 5, u64::MAX)],
        );

        let records = extract_all(dir.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input, u64::MAX);
        assert_eq!(records[0].output, u64::MAX);
        assert_eq!(records[0].total_tokens(), u64::MAX);
    }

    #[test]
    fn parse_line_rejects_non_usage_events() {
        let user = r#"{"type":"user","timestamp":"2025-02-24T10:00:00Z","message":{"content":"hello"}}"#;
        assert!(matches!(parse_line(user.as_bytes()), Err(LineError::NotUsage)));

        let no_usage = r#"{"type":"assistant","timestamp":"2025-02-24T10:00:00Z","message":{"model":"claude-opus-4"}}"#;
        assert!(matches!(parse_line(no_usage.as_bytes()), Err(LineError::NotUsage)));

        let user_with_usage = r#"{"type":"user","timestamp":"2025-02-24T10:00:00Z","message":{"usage":{"input_tokens":5},"note":"assistant"}}"#;
        assert!(matches!(
            parse_line(user_with_usage.as_bytes()),
            Err(LineError::NotUsage)
        ));
    }

    #[test]
    fn parse_line_requires_timestamp() {
        let missing = r#"{"type":"assistant","message":{"model":"claude-opus-4","usage":{"input_tokens":5}}}"#;
        assert!(matches!(parse_line(missing.as_bytes()), Err(LineError::NoTimestamp)));

        let empty = r#"{"type":"assistant","timestamp":"","message":{"usage":{"input_tokens":5}}}"#;
        assert!(matches!(parse_line(empty.as_bytes()), Err(LineError::NoTimestamp)));
    }

    #[test]
    fn parse_line_reports_malformed_json() {
        let truncated = r#"{"type":"assistant","message":{"usage":{"input_tok"#;
        assert!(matches!(parse_line(truncated.as_bytes()), Err(LineError::Malformed(_))));

        let bad_shape = r#"{"type":"assistant","timestamp":1700000000,"message":{"usage":{}}}"#;
        assert!(matches!(parse_line(bad_shape.as_bytes()), Err(LineError::Malformed(_))));

        assert!(matches!(
            parse_line(&[0xff, 0xfe, b'{']),
            Err(LineError::Encoding(_))
        ));
    }

    #[test]
    fn fold_file_skips_bad_lines_and_sums_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "session.jsonl",
            &[
                assistant_line("2025-02-24T10:00:00Z", "claude-sonnet-4-5", 100, 10),
                "not json at all".to_string(),
                String::new(),
                r#"{"type":"user","message":{"content":"hi"}}"#.to_string(),
                r#"{"type":"assistant","message":{"usage":{"input_tok"#.to_string(),
                assistant_line("2025-02-24T23:59:59Z", "claude-3-5-sonnet", 50, 5),
                assistant_line("2025-02-25T00:00:01Z", "claude-opus-4", 7, 3),
            ],
        );

        let mut aggregation = Aggregation::new();
        let stats = fold_file(&path, None, &mut aggregation).unwrap();
        assert_eq!(stats.counted, 3);
        assert_eq!(stats.skipped, 3);
        assert_eq!(aggregation.len(), 2);
        assert_eq!(
            totals(&aggregation, "2025-02-24", "Sonnet"),
            Some(TokenTotals { input: 150, output: 15 })
        );
        assert_eq!(
            totals(&aggregation, "2025-02-25", "Opus"),
            Some(TokenTotals { input: 7, output: 3 })
        );
    }

    #[test]
    fn fold_file_applies_min_date() {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (1..=5)
            .map(|d| assistant_line(&format!("2024-01-0{}T12:00:00Z", d), "claude-3-haiku", 10, 1))
            .collect();
        let path = write_log(dir.path(), "days.jsonl", &lines);

        let mut aggregation = Aggregation::new();
        fold_file(&path, Some("2024-01-03"), &mut aggregation).unwrap();
        let days: Vec<String> = aggregation
            .into_records()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(days, vec!["2024-01-03", "2024-01-04", "2024-01-05"]);
    }

    #[test]
    fn fold_file_missing_file_is_an_error_and_leaves_aggregation_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregation = Aggregation::new();
        aggregation.add(UsageEvent {
            day: "2025-01-01".into(),
            model: "Opus".into(),
            input: 1,
            output: 1,
        });
        let err = fold_file(&dir.path().join("gone.jsonl"), None, &mut aggregation).unwrap_err();
        assert!(matches!(err, ExtractError::Open { .. }));
        assert_eq!(aggregation.len(), 1);
    }

    #[test]
    fn same_key_across_files_yields_one_record() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "proj-a/one.jsonl",
            &[assistant_line("2025-03-01T08:00:00Z", "claude-sonnet-4", 100, 20)],
        );
        write_log(
            dir.path(),
            "proj-b/two.jsonl",
            &[assistant_line("2025-03-01T18:00:00Z", "claude-3-7-sonnet", 30, 4)],
        );

        let records = extract_all(dir.path());
        assert_eq!(
            records,
            vec![UsageRecord {
                date: "2025-03-01".into(),
                model: "Sonnet".into(),
                input: 130,
                output: 24,
            }]
        );
    }

    #[test]
    fn aggregation_is_order_independent() {
        let events = vec![
            UsageEvent { day: "2025-01-01".into(), model: "Opus".into(), input: 5, output: 1 },
            UsageEvent { day: "2025-01-02".into(), model: "Opus".into(), input: 2, output: 2 },
            UsageEvent { day: "2025-01-01".into(), model: "Haiku".into(), input: 9, output: 0 },
            UsageEvent { day: "2025-01-01".into(), model: "Opus".into(), input: 1, output: 7 },
        ];

        let mut forward = Aggregation::new();
        for e in events.iter().cloned() {
            forward.add(e);
        }

        let mut reversed = Aggregation::new();
        for e in events.iter().rev().cloned() {
            reversed.add(e);
        }

        let mut split_a = Aggregation::new();
        let mut split_b = Aggregation::new();
        for (i, e) in events.iter().cloned().enumerate() {
            if i % 2 == 0 {
                split_b.add(e);
            } else {
                split_a.add(e);
            }
        }
        split_a.merge(split_b);

        let expected = forward.into_records();
        assert_eq!(reversed.into_records(), expected);
        assert_eq!(split_a.into_records(), expected);
        assert_eq!(expected.len(), 3);
    }

    #[test]
    fn extract_modified_only_reads_newer_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_log(
            dir.path(),
            "old.jsonl",
            &[assistant_line("2025-04-02T10:00:00Z", "claude-opus-4", 1000, 100)],
        );
        let new = write_log(
            dir.path(),
            "new.jsonl",
            &[
                assistant_line("2025-04-01T10:00:00Z", "claude-opus-4", 50, 5),
                assistant_line("2025-04-02T10:00:00Z", "claude-opus-4", 10, 1),
            ],
        );

        set_mtime_ms(&old, 1_000);
        set_mtime_ms(&new, 5_000);

        // Strictly greater: a file modified exactly at the cutoff is skipped.
        let records = extract_modified(dir.path(), 1_000, Some("2025-04-02"));
        assert_eq!(
            records,
            vec![UsageRecord {
                date: "2025-04-02".into(),
                model: "Opus".into(),
                input: 10,
                output: 1,
            }]
        );
    }

    #[test]
    fn extract_all_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_all(&dir.path().join("nope")).is_empty());
    }
}
