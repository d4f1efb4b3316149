use std::path::Path;

use anyhow::Context;
use forge_core::memory::MemoryStore;
use forge_core::paths;

use crate::output::{print_json, print_table};

pub fn run(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    if !paths::roster_path(root).exists() {
        anyhow::bail!("not initialized: run 'forge init'");
    }

    let store = MemoryStore::new(paths::memory_path(root));
    let mut entries = store.load_all().context("failed to load memory store")?;

    // Newest first, bounded.
    entries.reverse();
    entries.truncate(limit);

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No memory entries.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.mode.clone(),
                e.status.as_str().to_string(),
                e.target.clone(),
                e.summary.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "MODE", "STATUS", "TARGET", "SUMMARY"], rows);
    Ok(())
}
