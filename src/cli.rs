//! Console output shared by the annocache binaries. Everything goes to stderr
//! so stdout stays free for data.

use std::time::Instant;

use colored::Colorize;

use crate::perf;

const SECTION_WIDTH: usize = 50;
const KEY_WIDTH: usize = 20;
const COLUMN_WIDTH: usize = 12;

pub fn banner(subtitle: &str) {
    eprintln!("\n{} {}\n", "Annocache".bold().cyan(), subtitle.dimmed());
}

pub fn section(title: &str) {
    let rule = "─".repeat(SECTION_WIDTH);
    eprintln!("{} {}", title.bold().blue(), rule.dimmed());
}

pub fn kv(key: &str, value: &str) {
    eprintln!("  {:<KEY_WIDTH$} {value}", key.dimmed());
}

pub fn success(msg: &str) {
    eprintln!("  {} {msg}", "✓".green().bold());
}

pub fn warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow(), msg.yellow());
}

/// One row of a right-aligned per-chromosome table.
pub fn table_row(name: &str, columns: &[String]) {
    let cells: String = columns
        .iter()
        .map(|cell| format!("{cell:>COLUMN_WIDTH$}"))
        .collect();
    eprintln!("  {:<8}{cells}", name.bold());
}

/// Wall time and peak memory since `start`.
pub fn print_summary(start: Instant) {
    let memory = perf::peak_memory_bytes().map_or_else(|| "N/A".to_string(), perf::format_bytes);
    eprintln!();
    eprintln!(
        "{}  {}",
        "Time".dimmed(),
        perf::format_elapsed(start.elapsed()).bold()
    );
    eprintln!("{}  {}", "Peak memory".dimmed(), memory.bold());
    eprintln!();
}
