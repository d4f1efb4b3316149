use std::path::Path;

use anyhow::Context;
use forge_core::config::{Config, WarnLevel};
use forge_core::paths;
use forge_core::roster::Roster;

use crate::output::print_json;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();
    let personas: Vec<String> = match Roster::load(&paths::roster_path(root)) {
        Ok(roster) => roster.names().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    };

    if json {
        return print_json(&serde_json::json!({
            "config": {
                "model": config.model.model,
                "base_url": config.model.base_url,
                "interpreter": config.runner.interpreter,
                "test_command": config.runner.test_command,
                "max_retries": config.runner.max_retries,
            },
            "personas": personas,
            "warnings": warnings,
        }));
    }

    println!("model:        {}", config.model.model);
    println!("base_url:     {}", config.model.base_url);
    println!("interpreter:  {}", config.runner.interpreter);
    println!("test_command: {}", config.runner.test_command);
    println!("max_retries:  {}", config.runner.max_retries);
    if personas.is_empty() {
        println!("personas:     (roster not initialized)");
    } else {
        println!("personas:     {}", personas.join(", "));
    }

    if warnings.is_empty() {
        println!("\nConfiguration OK.");
    } else {
        println!();
        for warning in &warnings {
            let tag = match warning.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("{tag}: {}", warning.message);
        }
    }
    Ok(())
}
