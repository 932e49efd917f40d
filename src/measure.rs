use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::errors::StatsError;
use crate::types::{Benchmark, Measurement, Results};

/// Handle on the sdvc executable.
#[derive(Debug, Clone)]
pub struct Sdvc {
    program: PathBuf,
}

impl Sdvc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Compile `input` into `artifact` in verbose mode and return the
    /// instruction count sdvc reports.
    ///
    /// Blocks until sdvc exits. A non-zero exit is an error carrying sdvc's
    /// stderr.
    pub fn compile(&self, input: &Path, artifact: &Path) -> Result<u64, StatsError> {
        debug!(program = %self.program.display(), input = %input.display(), "invoking sdvc");

        let output = Command::new(&self.program)
            .arg("-v")
            .arg("-c")
            .arg(input)
            .arg("-o")
            .arg(artifact)
            .output()
            .map_err(|source| StatsError::ToolSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(StatsError::ToolFailed {
                path: input.to_path_buf(),
                status: output.status,
                stderr: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_instruction_count(&stdout).map_err(|detail| StatsError::MalformedOutput {
            path: input.to_path_buf(),
            detail,
        })
    }
}

/// Pull the instruction count out of sdvc's verbose output: the last
/// whitespace-separated token of the last non-blank line.
pub fn parse_instruction_count(stdout: &str) -> Result<u64, String> {
    let last_line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "no output".to_string())?;

    let token = last_line
        .split_whitespace()
        .last()
        .ok_or_else(|| "no output".to_string())?;

    token
        .parse::<u64>()
        .map_err(|_| format!("expected an instruction count, found '{}'", token))
}

/// `<out_dir>/<key>.<extension>`
pub fn artifact_path(out_dir: &Path, key: &str, extension: &str) -> PathBuf {
    out_dir.join(format!("{}.{}", key, extension))
}

/// Compile one benchmark and measure the artifact it produced.
pub fn measure_benchmark(
    sdvc: &Sdvc,
    benchmark: &Benchmark,
    artifact: &Path,
) -> Result<Measurement, StatsError> {
    let instructions = sdvc.compile(&benchmark.path, artifact)?;
    let binary_size = std::fs::metadata(artifact)
        .map_err(|source| StatsError::ArtifactMissing {
            path: artifact.to_path_buf(),
            source,
        })?
        .len();

    Ok(Measurement {
        instructions,
        binary_size,
    })
}

/// Measure every benchmark in order, stopping at the first failure.
///
/// `out_dir` must already exist; it is never created here.
pub fn collect_results(
    sdvc: &Sdvc,
    benchmarks: &[Benchmark],
    out_dir: &Path,
    artifact_extension: &str,
) -> Result<Results, StatsError> {
    if !out_dir.is_dir() {
        return Err(StatsError::OutputDirNotFound {
            path: out_dir.to_path_buf(),
        });
    }

    let mut results = Results::new();
    for (i, benchmark) in benchmarks.iter().enumerate() {
        info!(
            key = %benchmark.key,
            index = i + 1,
            total = benchmarks.len(),
            "measuring benchmark"
        );
        let artifact = artifact_path(out_dir, &benchmark.key, artifact_extension);
        let measurement = measure_benchmark(sdvc, benchmark, &artifact)?;
        debug!(
            key = %benchmark.key,
            instructions = measurement.instructions,
            binary_size = measurement.binary_size,
            "measured"
        );
        if results.insert(benchmark.key.clone(), measurement).is_some() {
            warn!(
                key = %benchmark.key,
                path = %benchmark.path.display(),
                "duplicate benchmark key, keeping the latest result"
            );
        }
    }

    Ok(results)
}
