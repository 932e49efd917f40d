//! Run configuration, loaded from `sdvc-stats.toml`.
//!
//! Lookup order: an explicit `--config` path, `./sdvc-stats.toml`, then
//! `<config_dir>/sdvc-stats/config.toml`. Keys missing from the file keep
//! their defaults, and command-line flags override whatever was loaded.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::StatsError;

pub const CONFIG_FILE_NAME: &str = "sdvc-stats.toml";

pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "blocks",
    "driving_phils",
    "mcs",
    "loyd",
    "synapse",
    "telephony",
    "brp2",
    "prop",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the benchmark corpus, walked recursively.
    pub corpus: PathBuf,
    /// Extension of benchmark input files, without the dot.
    pub extension: String,
    /// Path to the sdvc executable.
    pub sdvc: PathBuf,
    /// Directory receiving compiled artifacts. Must already exist.
    pub out_dir: PathBuf,
    pub artifact_extension: String,
    /// Source statistics table.
    pub table: PathBuf,
    /// Destination table. Defaults to `<stem>_1.<ext>` next to `table`.
    pub output: Option<PathBuf>,
    /// Substrings of corpus-relative paths that are never benchmarked.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("../sdve-beem-benchmark"),
            extension: "sdve".to_string(),
            sdvc: PathBuf::from("./sdvc"),
            out_dir: PathBuf::from("bin"),
            artifact_extension: "out".to_string(),
            table: PathBuf::from("../sdve-beem-benchmark/stats.csv"),
            output: None,
            exclude: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let content = std::fs::read_to_string(path).map_err(|source| StatsError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| StatsError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Load the first config file found in the lookup order, or the defaults.
    pub fn load_default() -> Result<Self, StatsError> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load(&local);
        }
        match Self::user_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sdvc-stats").join("config.toml"))
    }

    /// Destination table path, explicit or derived from the source table.
    pub fn output_table(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => default_output_path(&self.table),
        }
    }
}

/// `dir/stats.csv` -> `dir/stats_1.csv`.
pub fn default_output_path(table: &Path) -> PathBuf {
    let stem = table
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match table.extension() {
        Some(ext) => format!("{}_1.{}", stem, ext.to_string_lossy()),
        None => format!("{}_1", stem),
    };
    table.with_file_name(name)
}
