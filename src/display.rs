use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::types::{MergeSummary, Plan, Results};

fn style_key() -> Style {
    Style::new().cyan().bold()
}

fn style_dim_italic() -> Style {
    Style::new().dimmed().italic()
}

/// Render a byte count compactly: "512 B", "4.0 KiB", "1.5 MiB".
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < MIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / MIB)
    }
}

/// Human summary of a run: one aligned line per benchmark, then a footer
/// describing the table merge.
pub fn format_summary(results: &Results, merge: &MergeSummary) -> String {
    let mut out = String::new();

    let header = format!("Measured {} benchmarks:", results.len());
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push_str("\n\n");

    if !results.is_empty() {
        let key_width = results.keys().map(|k| k.len()).max().unwrap_or(0);
        let count_width = results
            .values()
            .map(|m| m.instructions.to_string().len())
            .max()
            .unwrap_or(0);
        let key_style = style_key();

        for (key, m) in results {
            let key_colored = format!("{:<width$}", key, width = key_width)
                .if_supports_color(Stream::Stdout, |s| s.style(key_style))
                .to_string();
            let count_colored = format!("{:>width$}", m.instructions, width = count_width)
                .if_supports_color(Stream::Stdout, |s| s.yellow())
                .to_string();
            let size_colored = format!("{:>10}", format_bytes(m.binary_size))
                .if_supports_color(Stream::Stdout, |s| s.green())
                .to_string();

            out.push_str(&format!(
                "  {}  {} instr  {}\n",
                key_colored, count_colored, size_colored
            ));
        }

        out.push('\n');
    }

    let footer = format!("Augmented {} of {} rows", merge.augmented, merge.rows);
    out.push_str(
        &footer
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    if !merge.unmatched_keys.is_empty() {
        let note = format!("No table row for: {}", merge.unmatched_keys.join(", "));
        out.push_str(
            &note
                .if_supports_color(Stream::Stdout, |s| s.style(style_dim_italic()))
                .to_string(),
        );
        out.push('\n');
    }

    out
}

/// What a run would do, without doing it.
pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let key_style = style_key();
    let dim_it = style_dim_italic();

    out.push_str(&format!("Benchmarks to measure ({}):\n", plan.included.len()));
    for benchmark in &plan.included {
        out.push_str(&format!(
            "  {}  {}\n",
            benchmark
                .key
                .if_supports_color(Stream::Stdout, |s| s.style(key_style)),
            benchmark.relative.display()
        ));
    }

    if !plan.excluded.is_empty() {
        out.push_str(&format!("\nExcluded ({}):\n", plan.excluded.len()));
        for benchmark in &plan.excluded {
            let line = benchmark.relative.display().to_string();
            out.push_str(&format!(
                "  {}\n",
                line.if_supports_color(Stream::Stdout, |s| s.style(dim_it))
            ));
        }
    }

    out
}

#[derive(Serialize)]
struct JsonRun<'a> {
    generated_at: String,
    results: Vec<JsonResult<'a>>,
    merge: &'a MergeSummary,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    key: &'a str,
    instructions: u64,
    binary_size: u64,
}

pub fn format_json(results: &Results, merge: &MergeSummary, now: DateTime<Utc>) -> String {
    let run = JsonRun {
        generated_at: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        results: results
            .iter()
            .map(|(key, m)| JsonResult {
                key,
                instructions: m.instructions,
                binary_size: m.binary_size,
            })
            .collect(),
        merge,
    };

    serde_json::to_string_pretty(&run).unwrap_or_else(|_| "{}".to_string())
}
