//! Compact command implementation.

use super::format_size;
use plansync_store::LocalStore;
use std::fmt::Write;

/// Rewrites the journal with only live state.
pub fn run(store: &LocalStore) -> Result<String, Box<dyn std::error::Error>> {
    let report = store.compact()?;

    let mut out = String::new();
    let _ = writeln!(out, "Compaction complete");
    let _ = writeln!(out, "  Before:  {}", format_size(report.bytes_before));
    let _ = writeln!(out, "  After:   {}", format_size(report.bytes_after));
    let _ = writeln!(out, "  Entries: {}", report.entries);
    if report.bytes_before > report.bytes_after {
        let saved = report.bytes_before - report.bytes_after;
        let _ = writeln!(out, "  Saved:   {}", format_size(saved));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::{Entity, EntityType, Task};
    use plansync_store::StoreConfig;

    #[test]
    fn compaction_drops_overwritten_frames() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), StoreConfig::new()).unwrap();

        let mut task = Task::new("u1", "draft");
        let id = task.id.clone();
        for i in 0..10 {
            task.title = format!("draft {i}");
            store.put(Entity::from(task.clone())).unwrap();
        }

        let out = run(&store).unwrap();
        assert!(out.contains("Compaction complete"));
        assert!(out.contains("Saved:"));
        assert!(store.get(EntityType::Task, &id).is_some());
    }
}
