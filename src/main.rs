use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sdvc_stats::config::Config;
use sdvc_stats::discover;
use sdvc_stats::display;
use sdvc_stats::measure::{self, Sdvc};
use sdvc_stats::table;

#[derive(Parser)]
#[command(
    name = "sdvc-stats",
    version,
    about = "Run sdvc over a benchmark corpus and append instruction counts and binary sizes to a stats table"
)]
struct Cli {
    /// Root of the benchmark corpus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Directory for compiled artifacts (must exist)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Path to the sdvc executable
    #[arg(long)]
    sdvc: Option<PathBuf>,

    /// Source stats table
    #[arg(long)]
    table: Option<PathBuf>,

    /// Destination stats table [default: <table stem>_1.<ext>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip benchmarks whose path contains this substring (repeatable, replaces the defaults)
    #[arg(long = "exclude", value_name = "SUBSTR")]
    exclude: Vec<String>,

    /// Config file [default: ./sdvc-stats.toml, then the user config dir]
    #[arg(long)]
    config: Option<PathBuf>,

    /// List the benchmarks that would be measured and exit
    #[arg(long)]
    list: bool,

    #[arg(long)]
    json: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(corpus) = self.corpus {
            config.corpus = corpus;
        }
        if let Some(out_dir) = self.out_dir {
            config.out_dir = out_dir;
        }
        if let Some(sdvc) = self.sdvc {
            config.sdvc = sdvc;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        config
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    let (list, json) = (cli.list, cli.json);
    let config = cli.apply(config);

    let plan = discover::plan(&config.corpus, &config.extension, &config.exclude)?;
    info!(
        corpus = %config.corpus.display(),
        included = plan.included.len(),
        excluded = plan.excluded.len(),
        "discovered benchmarks"
    );

    if list {
        print!("{}", display::format_plan(&plan));
        return Ok(());
    }

    if plan.included.is_empty() {
        warn!("no benchmarks to measure, the table will be copied unchanged");
    }

    let sdvc = Sdvc::new(config.sdvc.clone());
    info!(
        sdvc = %sdvc.program().display(),
        out_dir = %config.out_dir.display(),
        "compiling benchmarks"
    );
    let results = measure::collect_results(
        &sdvc,
        &plan.included,
        &config.out_dir,
        &config.artifact_extension,
    )?;

    let destination = config.output_table();
    let merge = table::augment_table(&config.table, &destination, &results)?;

    let output = if json {
        display::format_json(&results, &merge, Utc::now())
    } else {
        display::format_summary(&results, &merge)
    };
    print!("{}", output);
    if json {
        println!();
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
        process::exit(1);
    }
}
