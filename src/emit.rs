/// CSV rendering of a [`RunTable`].
///
/// The header is `cmd_len,bus` followed by one `acc<i>` column per stream seen
/// anywhere in the log. The whole table is rendered into memory first, so an
/// incomplete record aborts before anything reaches the output sink.
use crate::record::{RunRecord, RunTable};
use serde::Deserialize;
use std::fmt::Write as _;

/// What to write when a run lacks a value for some column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail with [`EmitError::IncompleteRecord`].
    #[default]
    Strict,
    /// Leave the field empty.
    Empty,
    /// Write `0` for `cmd_len`, zero at the configured precision for fractions.
    Zero,
}

/// Formatting options for [`emit_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    pub missing: MissingPolicy,
    /// Digits after the decimal point for `bus` and `acc<i>`.
    pub precision: usize,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::Strict,
            precision: 2,
        }
    }
}

/// Header row without the trailing newline.
pub fn header(acc_count: usize) -> String {
    let mut cols = vec!["cmd_len".to_string(), "bus".to_string()];
    cols.extend((0..acc_count).map(|i| format!("acc{i}")));
    cols.join(",")
}

/// Render the full table: header plus one `\n`-terminated row per run.
pub fn emit_csv(table: &RunTable, opts: &EmitOptions) -> Result<String, EmitError> {
    let mut out = header(table.acc_count);
    out.push('\n');

    for (i, run) in table.runs.iter().enumerate() {
        let row = emit_row(i + 1, run, table.acc_count, opts)?;
        out.push_str(&row);
        out.push('\n');
    }

    Ok(out)
}

/// One data row for `run` (1-based position `run_no`), without the newline.
fn emit_row(
    run_no: usize,
    run: &RunRecord,
    acc_count: usize,
    opts: &EmitOptions,
) -> Result<String, EmitError> {
    let mut row = String::new();
    let mut missing: Vec<String> = Vec::new();

    match run.cmd_len {
        Some(v) => {
            let _ = write!(row, "{v}");
        }
        None => {
            fill_missing(&mut row, run_no, "cmd_len", false, opts)?;
            missing.push("cmd_len".to_string());
        }
    }

    row.push(',');
    push_fraction(&mut row, run_no, "bus", run.bus, opts, &mut missing)?;

    for i in 0..acc_count {
        row.push(',');
        let column = format!("acc{i}");
        push_fraction(&mut row, run_no, &column, run.acc(i), opts, &mut missing)?;
    }

    if !missing.is_empty() {
        tracing::warn!(
            run = run_no,
            columns = %missing.join(","),
            policy = ?opts.missing,
            "run is missing values"
        );
    }

    Ok(row)
}

fn push_fraction(
    row: &mut String,
    run_no: usize,
    column: &str,
    value: Option<f64>,
    opts: &EmitOptions,
    missing: &mut Vec<String>,
) -> Result<(), EmitError> {
    match value {
        Some(v) => {
            let _ = write!(row, "{v:.prec$}", prec = opts.precision);
        }
        None => {
            fill_missing(row, run_no, column, true, opts)?;
            missing.push(column.to_string());
        }
    }
    Ok(())
}

fn fill_missing(
    row: &mut String,
    run_no: usize,
    column: &str,
    fractional: bool,
    opts: &EmitOptions,
) -> Result<(), EmitError> {
    match opts.missing {
        MissingPolicy::Strict => Err(EmitError::IncompleteRecord {
            run: run_no,
            column: column.to_string(),
        }),
        MissingPolicy::Empty => Ok(()),
        MissingPolicy::Zero => {
            if fractional {
                let _ = write!(row, "{:.prec$}", 0.0_f64, prec = opts.precision);
            } else {
                row.push('0');
            }
            Ok(())
        }
    }
}

/// Errors from rendering the table.
#[derive(Debug)]
pub enum EmitError {
    /// A run has no value for `column` and the policy is strict.
    IncompleteRecord { run: usize, column: String },
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::IncompleteRecord { run, column } => write!(
                f,
                "run {run} has no value for column {column} (use --missing empty or zero to fill)"
            ),
        }
    }
}

impl std::error::Error for EmitError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cmd_len: Option<i64>, bus: Option<f64>, acc: &[Option<f64>]) -> RunRecord {
        RunRecord {
            cmd_len,
            bus,
            acc: acc.to_vec(),
        }
    }

    fn two_run_table() -> RunTable {
        RunTable {
            runs: vec![
                run(Some(120), Some(0.85), &[Some(0.90), Some(0.75)]),
                run(Some(200), Some(0.92), &[Some(0.88), Some(0.80)]),
            ],
            acc_count: 2,
        }
    }

    #[test]
    fn test_header() {
        assert_eq!(header(0), "cmd_len,bus");
        assert_eq!(header(3), "cmd_len,bus,acc0,acc1,acc2");
    }

    #[test]
    fn test_emit_two_runs() {
        let csv = emit_csv(&two_run_table(), &EmitOptions::default()).unwrap();
        assert_eq!(
            csv,
            "cmd_len,bus,acc0,acc1\n120,0.85,0.90,0.75\n200,0.92,0.88,0.80\n"
        );
    }

    #[test]
    fn test_emit_empty_table_is_header_only() {
        let csv = emit_csv(&RunTable::new(), &EmitOptions::default()).unwrap();
        assert_eq!(csv, "cmd_len,bus\n");
    }

    #[test]
    fn test_emit_without_accelerators() {
        let table = RunTable {
            runs: vec![run(Some(8), Some(1.0), &[])],
            acc_count: 0,
        };
        let csv = emit_csv(&table, &EmitOptions::default()).unwrap();
        assert_eq!(csv, "cmd_len,bus\n8,1.00\n");
    }

    #[test]
    fn test_fractions_are_rounded_to_precision() {
        let table = RunTable {
            runs: vec![run(Some(1), Some(0.004), &[Some(0.996)])],
            acc_count: 1,
        };
        let csv = emit_csv(&table, &EmitOptions::default()).unwrap();
        assert_eq!(csv, "cmd_len,bus,acc0\n1,0.00,1.00\n");
    }

    #[test]
    fn test_out_of_range_values_are_not_clamped() {
        let table = RunTable {
            runs: vec![run(Some(-5), Some(1.25), &[])],
            acc_count: 0,
        };
        let csv = emit_csv(&table, &EmitOptions::default()).unwrap();
        assert_eq!(csv, "cmd_len,bus\n-5,1.25\n");
    }

    #[test]
    fn test_custom_precision() {
        let opts = EmitOptions {
            precision: 3,
            ..EmitOptions::default()
        };
        let csv = emit_csv(&two_run_table(), &opts).unwrap();
        assert_eq!(
            csv,
            "cmd_len,bus,acc0,acc1\n120,0.850,0.900,0.750\n200,0.920,0.880,0.800\n"
        );
    }

    fn gappy_table() -> RunTable {
        RunTable {
            runs: vec![
                run(Some(120), Some(0.85), &[Some(0.90), Some(0.75)]),
                // Second run never reported stream 1, nor bus
                run(Some(200), None, &[Some(0.88)]),
            ],
            acc_count: 2,
        }
    }

    #[test]
    fn test_strict_policy_fails_on_missing_value() {
        let err = emit_csv(&gappy_table(), &EmitOptions::default()).unwrap_err();
        match &err {
            EmitError::IncompleteRecord { run, column } => {
                assert_eq!(*run, 2);
                assert_eq!(column, "bus");
            }
        }
        assert!(err.to_string().contains("run 2"));
    }

    #[test]
    fn test_strict_policy_fails_on_missing_acc_slot() {
        let table = RunTable {
            runs: vec![run(Some(1), Some(0.5), &[None, Some(0.2)])],
            acc_count: 2,
        };
        let err = emit_csv(&table, &EmitOptions::default()).unwrap_err();
        let EmitError::IncompleteRecord { run, column } = err;
        assert_eq!(run, 1);
        assert_eq!(column, "acc0");
    }

    #[test]
    fn test_empty_policy_leaves_blank_fields() {
        let opts = EmitOptions {
            missing: MissingPolicy::Empty,
            ..EmitOptions::default()
        };
        let csv = emit_csv(&gappy_table(), &opts).unwrap();
        assert_eq!(
            csv,
            "cmd_len,bus,acc0,acc1\n120,0.85,0.90,0.75\n200,,0.88,\n"
        );
    }

    #[test]
    fn test_zero_policy_fills_zeros() {
        let opts = EmitOptions {
            missing: MissingPolicy::Zero,
            ..EmitOptions::default()
        };
        let table = RunTable {
            runs: vec![run(None, None, &[None, Some(0.5)])],
            acc_count: 3,
        };
        let csv = emit_csv(&table, &opts).unwrap();
        assert_eq!(csv, "cmd_len,bus,acc0,acc1,acc2\n0,0.00,0.00,0.50,0.00\n");
    }

    #[test]
    fn test_emit_is_deterministic() {
        let table = gappy_table();
        let opts = EmitOptions {
            missing: MissingPolicy::Empty,
            ..EmitOptions::default()
        };
        assert_eq!(
            emit_csv(&table, &opts).unwrap(),
            emit_csv(&table, &opts).unwrap()
        );
    }

    #[test]
    fn test_missing_policy_deserialize() {
        #[derive(Deserialize)]
        struct Wrap {
            missing: MissingPolicy,
        }
        let w: Wrap = toml::from_str("missing = \"zero\"").unwrap();
        assert_eq!(w.missing, MissingPolicy::Zero);
        let w: Wrap = toml::from_str("missing = \"strict\"").unwrap();
        assert_eq!(w.missing, MissingPolicy::Strict);
        assert!(toml::from_str::<Wrap>("missing = \"lenient\"").is_err());
    }
}
