use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::StatsError;
use crate::types::{Benchmark, Plan};

/// Recursively find every regular file under `root` with the given extension.
///
/// Results are sorted by path so runs are reproducible. Symlinks are not
/// followed.
pub fn discover_benchmarks(root: &Path, extension: &str) -> Result<Vec<PathBuf>, StatsError> {
    if !root.is_dir() {
        return Err(StatsError::CorpusNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| StatsError::CorpusWalk { source })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

/// The key a benchmark is reported under: its file name without extension.
pub fn benchmark_key(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn is_excluded(path: &Path, exclusions: &[String]) -> bool {
    let path = path.to_string_lossy();
    exclusions
        .iter()
        .any(|word| !word.is_empty() && path.contains(word.as_str()))
}

/// Discover the corpus and split it into included and excluded benchmarks.
pub fn plan(root: &Path, extension: &str, exclusions: &[String]) -> Result<Plan, StatsError> {
    let mut plan = Plan::default();

    for path in discover_benchmarks(root, extension)? {
        let Some(key) = benchmark_key(&path) else {
            debug!(path = %path.display(), "skipping file without a usable name");
            continue;
        };
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path.as_path())
            .to_path_buf();
        let excluded = is_excluded(&relative, exclusions);
        let benchmark = Benchmark {
            path,
            relative,
            key,
        };
        if excluded {
            plan.excluded.push(benchmark);
        } else {
            plan.included.push(benchmark);
        }
    }

    Ok(plan)
}
