//! Pending command implementation.

use super::Format;
use plansync_model::EntityType;
use plansync_protocol::PendingOperation;
use plansync_store::LocalStore;
use std::fmt::Write;

/// Lists ledger records, optionally only failed ones or one table's.
pub fn run(
    store: &LocalStore,
    failed_only: bool,
    table: Option<&str>,
    format: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let entity_type = table.map(EntityType::parse_table).transpose()?;

    let mut records = if failed_only {
        store.failed()
    } else {
        store.all_pending()
    };
    if let Some(entity_type) = entity_type {
        records.retain(|op| op.entity_type == entity_type);
    }
    records.sort_by(|a, b| {
        (a.entity_type.sync_tier(), a.updated_at).cmp(&(b.entity_type.sync_tier(), b.updated_at))
    });

    match format {
        Format::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&records)?)),
        Format::Text => Ok(render_text(&records)),
    }
}

fn render_text(records: &[PendingOperation]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        let _ = writeln!(out, "No ledger records.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<18} {:<38} {:<8} {:<8} {:>5}  {}",
        "TABLE", "ID", "OP", "STATUS", "RETRY", "LAST ERROR"
    );
    for op in records {
        let _ = writeln!(
            out,
            "{:<18} {:<38} {:<8} {:<8} {:>5}  {}",
            op.entity_type.table_name(),
            op.entity_id,
            op.operation.as_str(),
            op.status.as_str(),
            op.retry_count,
            op.last_error.as_deref().unwrap_or("-"),
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{} record(s)", records.len());
    out
}
