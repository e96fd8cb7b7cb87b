//! Per-run records accumulated while scanning a log.

/// Metrics reported for one test run.
///
/// Every field is optional: a run's log segment may omit any marker, and the
/// emitter decides what an absent value means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub cmd_len: Option<i64>,
    pub bus: Option<f64>,
    /// Accelerator stream utilizations, indexed by stream. Grown on demand to
    /// the highest index this run reported; shorter than the table-wide count
    /// when later streams were never seen in this run.
    pub acc: Vec<Option<f64>>,
}

impl RunRecord {
    /// Record a stream utilization, growing the slot vector as needed.
    pub fn set_acc(&mut self, index: usize, utilization: f64) {
        if index >= self.acc.len() {
            self.acc.resize(index + 1, None);
        }
        self.acc[index] = Some(utilization);
    }

    /// Utilization for stream `index`, `None` when this run never reported it.
    pub fn acc(&self, index: usize) -> Option<f64> {
        self.acc.get(index).copied().flatten()
    }
}

/// All runs found in a log, in order of appearance, plus the accelerator
/// column count discovered across the whole file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTable {
    pub runs: Vec<RunRecord>,
    /// Highest stream index seen in any run, plus one.
    pub acc_count: usize,
}

impl RunTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty record and return its index.
    pub fn start_run(&mut self) -> usize {
        self.runs.push(RunRecord::default());
        self.runs.len() - 1
    }

    /// Widen the accelerator column count to cover `index`. Never shrinks.
    pub fn observe_stream(&mut self, index: usize) {
        if let Some(count) = index.checked_add(1) {
            if count > self.acc_count {
                self.acc_count = count;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
