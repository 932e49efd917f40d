use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(thiserror::Error, Debug)]
pub enum StatsError {
    #[error("Benchmark corpus not found at {path}")]
    CorpusNotFound { path: PathBuf },

    #[error("Failed to walk benchmark corpus: {source}")]
    CorpusWalk { source: walkdir::Error },

    #[error("Output directory {path} does not exist. Create it before running")]
    OutputDirNotFound { path: PathBuf },

    #[error("Failed to run {program}: {source}")]
    ToolSpawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("sdvc failed on {path} ({status}){stderr}")]
    ToolFailed {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Unexpected sdvc output for {path}: {detail}")]
    MalformedOutput { path: PathBuf, detail: String },

    #[error("Missing output artifact {path}: {source}")]
    ArtifactMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read stats table {path}: {source}")]
    TableRead { path: PathBuf, source: csv::Error },

    #[error("Failed to write stats table {path}: {source}")]
    TableWrite { path: PathBuf, source: csv::Error },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },
}
