/// Single forward scan over a simulation log, building a [`RunTable`].
///
/// Lines are classified by [`Marker::classify`]. A run-start marker opens a
/// new record; metric markers fill the most recently opened one. Unmatched
/// lines are skipped. Any failure stops the scan with the 1-based line number.
use crate::config::MarkerConfig;
use crate::marker::{Marker, MarkerError};
use crate::record::RunTable;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Scan lines from any fallible line source.
pub fn parse_lines<I>(lines: I, markers: &MarkerConfig) -> Result<RunTable, ParseError>
where
    I: IntoIterator<Item = std::io::Result<String>>,
{
    let mut table = RunTable::new();
    let mut current: Option<usize> = None;

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| ParseError::Read { line_no, source: e })?;

        let marker = match Marker::classify(&line, markers) {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                return Err(ParseError::Malformed {
                    line_no,
                    line: line.trim_end().to_string(),
                    source: e,
                })
            }
        };

        if marker == Marker::RunStart {
            current = Some(table.start_run());
            tracing::debug!(line_no, run = table.len(), "run started");
            continue;
        }

        let run = match current {
            Some(i) => &mut table.runs[i],
            None => {
                return Err(ParseError::MissingStartMarker {
                    line_no,
                    line: line.trim_end().to_string(),
                })
            }
        };

        match marker {
            Marker::CmdLen(v) => run.cmd_len = Some(v),
            Marker::Bus(v) => run.bus = Some(v),
            Marker::AccStream { index, utilization } => {
                run.set_acc(index, utilization);
                table.observe_stream(index);
            }
            Marker::RunStart => {}
        }
        tracing::trace!(line_no, kind = marker.kind(), "metric recorded");
    }

    Ok(table)
}

/// Scan a buffered reader line by line.
pub fn parse_reader<R: BufRead>(reader: R, markers: &MarkerConfig) -> Result<RunTable, ParseError> {
    parse_lines(reader.lines(), markers)
}

/// Open and scan a log file. The file is closed when this returns, on every path.
pub fn parse_file(path: &Path, markers: &MarkerConfig) -> Result<RunTable, ParseError> {
    let file = std::fs::File::open(path).map_err(|e| ParseError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = std::io::BufReader::new(file);
    parse_reader(reader, markers)
}

/// Errors from scanning a log.
#[derive(Debug)]
pub enum ParseError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        line_no: usize,
        source: std::io::Error,
    },
    /// A metric marker appeared before any run-start marker.
    MissingStartMarker {
        line_no: usize,
        line: String,
    },
    Malformed {
        line_no: usize,
        line: String,
        source: MarkerError,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Open { path, source } => {
                write!(f, "failed to open log {}: {source}", path.display())
            }
            ParseError::Read { line_no, source } => {
                write!(f, "failed to read line {line_no}: {source}")
            }
            ParseError::MissingStartMarker { line_no, line } => write!(
                f,
                "line {line_no}: metric before any run-start marker: {line:?}"
            ),
            ParseError::Malformed {
                line_no,
                line,
                source,
            } => write!(f, "line {line_no}: {source}: {line:?}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Open { source, .. } => Some(source),
            ParseError::Read { source, .. } => Some(source),
            ParseError::MissingStartMarker { .. } => None,
            ParseError::Malformed { source, .. } => Some(source),
        }
    }
}
