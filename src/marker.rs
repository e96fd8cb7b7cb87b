/// Marker grammar for speed-test simulation logs.
///
/// Each log line is classified by its leading text. Recognized lines carry
/// one metric for the current run (or start a new run); everything else is
/// noise and is ignored.
use crate::config::MarkerConfig;
use std::num::ParseIntError;

/// A recognized marker line with its extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// A new test run begins.
    RunStart,
    /// Minimum command length for the current run.
    CmdLen(i64),
    /// Bus utilization as a fraction (percentage / 100).
    Bus(f64),
    /// Utilization of one accelerator stream as a fraction.
    AccStream { index: usize, utilization: f64 },
}

impl Marker {
    /// Classify a single log line.
    ///
    /// Returns `Ok(None)` for lines that match no marker prefix. Prefixes are
    /// tested in order: run start, command length, bus, accelerator stream.
    pub fn classify(line: &str, markers: &MarkerConfig) -> Result<Option<Marker>, MarkerError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with(&markers.run_start) {
            return Ok(Some(Marker::RunStart));
        }
        if line.starts_with(&markers.cmd_len) {
            let text = after_last_colon(line);
            let value = parse_int(text, "cmd_len")?;
            return Ok(Some(Marker::CmdLen(value)));
        }
        if line.starts_with(&markers.bus) {
            return Ok(Some(Marker::Bus(parse_fraction(line, "bus")?)));
        }
        if line.starts_with(&markers.acc_stream) {
            let index = stream_index(line, markers.max_streams)?;
            let utilization = parse_fraction(line, "acc")?;
            return Ok(Some(Marker::AccStream { index, utilization }));
        }

        Ok(None)
    }

    /// Short name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Marker::RunStart => "run_start",
            Marker::CmdLen(_) => "cmd_len",
            Marker::Bus(_) => "bus",
            Marker::AccStream { .. } => "acc_stream",
        }
    }
}

/// Text after the final `:` in the line (the whole line if there is none).
fn after_last_colon(line: &str) -> &str {
    match line.rsplit_once(':') {
        Some((_, tail)) => tail,
        None => line,
    }
}

/// `"<n>/<d>"` after the final colon → `n / 100.0`.
fn parse_fraction(line: &str, field: &'static str) -> Result<f64, MarkerError> {
    let tail = after_last_colon(line);
    let numerator = tail.split('/').next().unwrap_or(tail);
    let percent = parse_int(numerator, field)?;
    Ok(percent as f64 / 100.0)
}

/// Stream index: the text between the last `stream` and the next `utilization`.
/// Indices at or above `max_streams` are rejected.
fn stream_index(line: &str, max_streams: usize) -> Result<usize, MarkerError> {
    let (_, after_stream) = line
        .rsplit_once("stream")
        .ok_or(MarkerError::MissingField { field: "stream" })?;
    let raw = match after_stream.split_once("utilization") {
        Some((index, _)) => index,
        None => after_stream,
    };
    let text = raw.trim();
    let index: usize = text.parse().map_err(|e| MarkerError::BadStreamIndex {
        text: text.to_string(),
        source: e,
    })?;
    if index >= max_streams {
        return Err(MarkerError::StreamIndexTooLarge {
            index,
            max: max_streams,
        });
    }
    Ok(index)
}

fn parse_int(raw: &str, field: &'static str) -> Result<i64, MarkerError> {
    let text = raw.trim();
    text.parse().map_err(|e| MarkerError::BadInteger {
        field,
        text: text.to_string(),
        source: e,
    })
}

/// Errors from extracting a value out of a recognized marker line.
#[derive(Debug)]
pub enum MarkerError {
    BadInteger {
        field: &'static str,
        text: String,
        source: ParseIntError,
    },
    BadStreamIndex {
        text: String,
        source: ParseIntError,
    },
    StreamIndexTooLarge {
        index: usize,
        max: usize,
    },
    MissingField {
        field: &'static str,
    },
}

impl std::fmt::Display for MarkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerError::BadInteger {
                field,
                text,
                source,
            } => write!(f, "invalid {field} value {text:?}: {source}"),
            MarkerError::BadStreamIndex { text, source } => {
                write!(f, "invalid accelerator stream index {text:?}: {source}")
            }
            MarkerError::StreamIndexTooLarge { index, max } => write!(
                f,
                "accelerator stream index {index} exceeds the limit of {max} streams"
            ),
            MarkerError::MissingField { field } => write!(f, "missing {field} in marker line"),
        }
    }
}

impl std::error::Error for MarkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarkerError::BadInteger { source, .. } => Some(source),
            MarkerError::BadStreamIndex { source, .. } => Some(source),
            MarkerError::StreamIndexTooLarge { .. } => None,
            MarkerError::MissingField { .. } => None,
        }
    }
}
