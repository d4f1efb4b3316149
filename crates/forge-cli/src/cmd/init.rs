use std::path::Path;

use anyhow::Context;
use forge_core::config::{Config, WarnLevel};
use forge_core::roster::default_roster_yaml;
use forge_core::{io, paths};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing forge workspace in: {}", root.display());

    io::ensure_dir(&paths::forge_dir(root)).context("failed to create .forge directory")?;

    let wrote_config = if paths::config_path(root).exists() {
        false
    } else {
        Config::default().save(root).context("failed to write config")?;
        true
    };
    println!(
        "  {} {}",
        if wrote_config { "created" } else { "exists " },
        paths::CONFIG_FILE
    );

    let wrote_roster = io::write_if_missing(
        &paths::roster_path(root),
        default_roster_yaml().as_bytes(),
    )
    .context("failed to write agent roster")?;
    println!(
        "  {} {}",
        if wrote_roster { "created" } else { "exists " },
        paths::ROSTER_FILE
    );

    // Ledger and memory are workspace-local state, not repo content.
    io::ensure_gitignore_entry(root, paths::LEDGER_FILE)?;
    io::ensure_gitignore_entry(root, paths::MEMORY_FILE)?;

    let config = Config::load(root)?;
    for warning in config.validate() {
        let tag = match warning.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("  {tag}: {}", warning.message);
    }

    println!("Done. Define or adjust personas in {}", paths::ROSTER_FILE);
    Ok(())
}
