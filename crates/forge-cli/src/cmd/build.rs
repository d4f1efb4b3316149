use std::path::Path;

use anyhow::Context;
use forge_core::config::Config;
use forge_core::engine::Orchestrator;

use crate::output::print_json;

pub fn run(
    root: &Path,
    project_root: &str,
    desc: &str,
    run_tests: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let backend = crate::cmd::backend(&config)?;
    let orch = Orchestrator::with_config(root, config, backend)
        .context("failed to open workspace")?;

    let rt = crate::cmd::runtime()?;
    let outcome = rt
        .block_on(orch.plan_and_build_project(project_root, desc))
        .context("project build failed")?;

    if json {
        return print_json(&outcome);
    }

    println!("Project planning and generation complete!");
    println!("Project task id: {}", outcome.project_task_id);
    println!("Project root:    {}", outcome.project_root);
    println!("Plan summary:    {}", outcome.plan.summary);
    println!("Files generated: {}", outcome.files.len());
    for file in &outcome.files {
        println!(" - {} (task {})", file.path, file.task_id);
    }

    if run_tests {
        let result = rt
            .block_on(orch.run_project_tests(project_root))
            .context("test run failed")?;
        crate::cmd::print_test_output(&result);
    }

    Ok(())
}
