use std::path::Path;

use anyhow::Context;
use forge_core::config::Config;
use forge_core::engine::Orchestrator;

use crate::output::print_json;

#[allow(clippy::too_many_arguments)]
pub fn run(
    root: &Path,
    file: &str,
    desc: &str,
    run_after: bool,
    triad: bool,
    edit: bool,
    max_retries: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let backend = crate::cmd::backend(&config)?;
    let orch = Orchestrator::with_config(root, config, backend)
        .context("failed to open workspace")?;

    let rt = crate::cmd::runtime()?;

    if edit {
        let outcome = rt
            .block_on(orch.edit_file(file, desc))
            .context("edit failed")?;
        if json {
            return print_json(&outcome);
        }
        println!("Edited {}", outcome.path);
        println!("{}", outcome.tool_result);
        println!("--- preview ---\n{}", outcome.preview);
        return Ok(());
    }

    if triad {
        let outcome = rt
            .block_on(orch.triad_generate_file(file, desc))
            .context("triad generation failed")?;
        if json {
            return print_json(&outcome);
        }
        println!("Triad generation complete (task {})", outcome.task_id);
        for candidate in &outcome.candidates {
            println!("  candidate: {} ({})", candidate.label, candidate.name);
        }
        println!("{}", outcome.tool_result);
        println!("--- final preview ---\n{}", outcome.final_preview);
        return Ok(());
    }

    if run_after {
        let report = rt
            .block_on(orch.generate_and_run(file, desc, max_retries))
            .context("generate-and-run failed")?;
        if json {
            return print_json(&report);
        }
        println!(
            "Generated {} (task {}), {} run attempt(s), final exit code {}",
            report.path,
            report.task_id,
            report.runs.len(),
            report.final_exit_code
        );
        if let Some(last) = report.runs.last() {
            if !last.stdout.is_empty() {
                println!("--- stdout ---\n{}", last.stdout);
            }
            if !last.stderr.is_empty() {
                println!("--- stderr ---\n{}", last.stderr);
            }
        }
        return Ok(());
    }

    let outcome = rt
        .block_on(orch.generate_file(file, desc))
        .context("generation failed")?;
    if json {
        return print_json(&outcome);
    }
    println!("Generated {} (task {})", outcome.path, outcome.task_id);
    println!("{}", outcome.tool_result);
    println!("--- preview ---\n{}", outcome.preview);
    Ok(())
}
