/// Output destination for the rendered CSV.
///
/// The file sink writes to a temp file next to the destination and renames it
/// into place, so an existing table is only ever replaced by a complete one.
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    Stdout,
    File(PathBuf),
}

impl OutputSink {
    /// Write `contents` to the sink, replacing any existing file.
    pub fn write_all(&self, contents: &str) -> Result<(), SinkError> {
        match self {
            OutputSink::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                lock.write_all(contents.as_bytes())
                    .and_then(|_| lock.flush())
                    .map_err(|e| SinkError::Stdout { source: e })
            }
            OutputSink::File(path) => write_atomic(path, contents),
        }
    }

    /// Human-readable destination for log events.
    pub fn describe(&self) -> String {
        match self {
            OutputSink::Stdout => "<stdout>".to_string(),
            OutputSink::File(path) => path.display().to_string(),
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), SinkError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SinkError::Write {
        path: dir.to_path_buf(),
        source: e,
    })?;

    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| SinkError::Write {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;

    tmp.persist(path).map_err(|e| SinkError::Rename {
        from: e.file.path().to_path_buf(),
        to: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Errors from writing the output table.
#[derive(Debug)]
pub enum SinkError {
    Stdout {
        source: std::io::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Stdout { source } => write!(f, "failed to write to stdout: {source}"),
            SinkError::Write { path, source } => {
                write!(
                    f,
                    "failed to write temp output file in {}: {source}",
                    path.display()
                )
            }
            SinkError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Stdout { source } => Some(source),
            SinkError::Write { source, .. } => Some(source),
            SinkError::Rename { source, .. } => Some(source),
        }
    }
}
