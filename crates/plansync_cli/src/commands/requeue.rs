//! Requeue command implementation.

use chrono::Utc;
use plansync_store::LocalStore;
use std::fmt::Write;

/// Resets failed ledger records to pending.
pub fn run(store: &LocalStore, dry_run: bool) -> Result<String, Box<dyn std::error::Error>> {
    let mut out = String::new();

    if dry_run {
        let failed = store.failed();
        let _ = writeln!(out, "[Dry run] Would requeue {} record(s)", failed.len());
        for op in &failed {
            let _ = writeln!(
                out,
                "  {} {} ({} retries)",
                op.entity_type.table_name(),
                op.entity_id,
                op.retry_count
            );
        }
        return Ok(out);
    }

    let count = store.requeue_failed(Utc::now())?;
    store.sync()?;
    let _ = writeln!(out, "Requeued {count} record(s)");
    Ok(out)
}
