//! Inspect command implementation.

use super::{format_size, Format};
use plansync_store::{LocalStore, StoreStats};
use std::fmt::Write;

/// Renders table counts, ledger summary and journal size.
pub fn run(store: &LocalStore, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let stats = store.stats()?;

    match format {
        Format::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&stats)?)),
        Format::Text => Ok(render_text(&stats)),
    }
}

fn render_text(stats: &StoreStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PlanSync Store Inspection");
    let _ = writeln!(out, "=========================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Tables ({} rows total):", stats.total_rows());
    for (table, rows) in &stats.tables {
        let _ = writeln!(out, "  {table:<20} {rows:>8}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Ledger:");
    let _ = writeln!(out, "  Pending:    {}", stats.pending);
    let _ = writeln!(out, "  Failed:     {}", stats.failed);
    let _ = writeln!(out);
    let _ = writeln!(out, "Journal:");
    let _ = writeln!(out, "  Size:       {}", format_size(stats.journal_bytes));
    let _ = writeln!(out, "  Entries:    {}", stats.journal_entries);
    out
}
