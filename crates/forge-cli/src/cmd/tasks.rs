use std::path::Path;

use anyhow::Context;
use forge_core::ledger::TaskLedger;
use forge_core::paths;

use crate::output::{print_json, print_table};

pub fn run(root: &Path, limit: u32, target: Option<&str>, json: bool) -> anyhow::Result<()> {
    if !paths::roster_path(root).exists() {
        anyhow::bail!("not initialized: run 'forge init'");
    }

    let ledger = TaskLedger::open(&paths::ledger_path(root)).context("failed to open ledger")?;
    let tasks = ledger
        .list_recent(limit, target)
        .context("failed to list tasks")?;

    if json {
        return print_json(&tasks);
    }

    if tasks.is_empty() {
        println!("No tasks recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.status.to_string(),
                t.target.clone(),
                t.updated_at.clone(),
                truncate(&t.goal, 60),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "TARGET", "UPDATED", "GOAL"], rows);
    Ok(())
}

fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        s.to_string()
    } else {
        let head: String = s.chars().take(n).collect();
        format!("{head}…")
    }
}
