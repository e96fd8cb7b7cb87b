use crate::emit::{EmitOptions, MissingPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub markers: MarkerConfig,
    pub output: OutputConfig,
}

/// Default upper bound (exclusive) on accelerator stream indices.
pub const MAX_STREAMS: usize = 4096;

/// Line prefixes that identify markers in the simulation transcript.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MarkerConfig {
    pub run_start: String,
    pub cmd_len: String,
    pub bus: String,
    pub acc_stream: String,
    /// Stream indices at or above this are rejected as malformed.
    pub max_streams: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub missing: MissingPolicy,
    pub precision: usize,
    pub stdout: bool,
}

// --- Default implementations ---

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            run_start: "simulate work columnreaderspeed_tc".to_string(),
            cmd_len: "# ** Note: Minimum command length:".to_string(),
            bus: "# ** Note: Bus utilization:".to_string(),
            acc_stream: "# ** Note: Acc stream".to_string(),
            max_streams: MAX_STREAMS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::Strict,
            precision: 2,
            stdout: false,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub missing: Option<MissingPolicy>,
    pub precision: Option<usize>,
    pub stdout: bool,
}

impl Config {
    /// Load config from `path`. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(p) => Config::load(p),
            None => Ok(Config::default()),
        }
    }

    /// Merge CLI overrides into this config.
    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(missing) = o.missing {
            self.output.missing = missing;
        }
        if let Some(precision) = o.precision {
            self.output.precision = precision;
        }
        if o.stdout {
            self.output.stdout = true;
        }
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            missing: self.output.missing,
            precision: self.output.precision,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.markers.run_start, "simulate work columnreaderspeed_tc");
        assert_eq!(cfg.output.missing, MissingPolicy::Strict);
        assert_eq!(cfg.output.precision, 2);
        assert!(!cfg.output.stdout);
        assert_eq!(cfg.emit_options(), EmitOptions::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[markers]
run_start = "simulate work columnwriterspeed_tc"

[output]
missing = "empty"
"#,
        )
        .unwrap();
        assert_eq!(cfg.markers.run_start, "simulate work columnwriterspeed_tc");
        assert_eq!(cfg.markers.bus, "# ** Note: Bus utilization:");
        assert_eq!(cfg.markers.max_streams, MAX_STREAMS);
        assert_eq!(cfg.output.missing, MissingPolicy::Empty);
        assert_eq!(cfg.output.precision, 2);
    }

    #[test]
    fn test_max_streams_from_file() {
        let cfg: Config = toml::from_str("[markers]\nmax_streams = 16\n").unwrap();
        assert_eq!(cfg.markers.max_streams, 16);
        assert_eq!(cfg.markers.run_start, "simulate work columnreaderspeed_tc");
    }

    #[test]
    fn test_empty_file_is_default() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("speedtest.toml");
        std::fs::write(&path, "[output]\nprecision = 4\nstdout = true\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.output.precision, 4);
        assert!(cfg.output.stdout);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = Config::load(Path::new("/nonexistent/speedtest.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("speedtest.toml");
        std::fs::write(&path, "[output]\nprecision = \"two\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("speedtest.toml"));
    }

    #[test]
    fn test_load_or_default_without_path() {
        assert_eq!(Config::load_or_default(None).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides_win() {
        let mut cfg = Config::default();
        cfg.output.precision = 4;
        cfg.apply_overrides(&Overrides {
            missing: Some(MissingPolicy::Zero),
            precision: Some(1),
            stdout: true,
        });
        assert_eq!(cfg.output.missing, MissingPolicy::Zero);
        assert_eq!(cfg.output.precision, 1);
        assert!(cfg.output.stdout);
    }

    #[test]
    fn test_absent_overrides_keep_file_values() {
        let mut cfg = Config::default();
        cfg.output.missing = MissingPolicy::Empty;
        cfg.output.stdout = true;
        cfg.apply_overrides(&Overrides::default());
        assert_eq!(cfg.output.missing, MissingPolicy::Empty);
        assert!(cfg.output.stdout);
    }
}
