use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// A discovered corpus file and the key it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    pub path: PathBuf,
    /// Path relative to the corpus root; exclusion matching runs against this.
    pub relative: PathBuf,
    pub key: String,
}

/// Metrics for one benchmark after a successful sdvc run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Measurement {
    pub instructions: u64,
    pub binary_size: u64,
}

/// Benchmark key -> measurement. Ordered so every rendering is deterministic.
pub type Results = BTreeMap<String, Measurement>;

/// Discovery output split by the exclusion filter.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub included: Vec<Benchmark>,
    pub excluded: Vec<Benchmark>,
}

/// What the table merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub rows: usize,
    pub augmented: usize,
    /// Result keys that matched no row in the table.
    pub unmatched_keys: Vec<String>,
}
