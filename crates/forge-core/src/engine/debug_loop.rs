//! The generate→run→debug retry loop.
//!
//! After generation the file is run under the configured interpreter. A
//! non-zero exit feeds the full source and full stderr to the debugger
//! persona for a bounded number of full-file rewrites; the run history is
//! returned intact so no failed run's stderr is ever discarded.

use model_gateway::ChatMessage;

use crate::engine::{Orchestrator, RunReport};
use crate::error::Result;
use crate::ledger::TaskStatus;
use crate::process::{RunOutput, ScriptRunner};
use crate::protocol::strip_code_fences;

impl Orchestrator {
    /// Generate `path`, run it, and debug-rewrite on failure up to
    /// `max_retries` times (None = the configured default). With
    /// `max_retries = N` at most `N + 1` runs happen.
    pub async fn generate_and_run(
        &self,
        path: &str,
        description: &str,
        max_retries: Option<u32>,
    ) -> Result<RunReport> {
        let generate = self.generate_file(path, description).await?;
        let task_id = generate.task_id;
        let max_retries = max_retries.unwrap_or(self.config.runner.max_retries);

        let runner = ScriptRunner::new(self.workspace.root(), &self.config.runner.interpreter);
        let timeout = self.config.run_timeout();

        let mut runs: Vec<RunOutput> = Vec::new();
        let mut attempts = 0u32;
        let final_exit_code;

        loop {
            attempts += 1;
            self.roster().ensure_tool_allowed("runner", "code_runner")?;
            let run = runner.run(path, &[], timeout).await?;
            tracing::info!(task_id, attempt = attempts, exit_code = run.exit_code, "ran file");

            let exit_code = run.exit_code;
            let cmd = run.cmd.join(" ");
            let stdout = run.stdout.clone();
            let stderr = run.stderr.clone();
            runs.push(run);

            if exit_code == 0 {
                final_exit_code = exit_code;
                self.ledger().complete(
                    task_id,
                    TaskStatus::RunSuccess,
                    &format!("Command: {cmd}, stdout: {stdout}"),
                )?;
                break;
            }

            if attempts > max_retries {
                final_exit_code = exit_code;
                self.ledger().complete(
                    task_id,
                    TaskStatus::RunFailed,
                    &format!("Final stderr: {stderr}"),
                )?;
                break;
            }

            self.debug_rewrite(path, &stderr).await?;
        }

        Ok(RunReport {
            task_id,
            path: path.to_string(),
            generate,
            runs,
            final_exit_code,
        })
    }

    /// One debugger round: full current source + full stderr in, full
    /// corrected file out, written over the original.
    async fn debug_rewrite(&self, path: &str, stderr: &str) -> Result<()> {
        let debugger = self.roster().get("debugger")?;
        self.roster().ensure_tool_allowed("debugger", "filesystem")?;

        let current_source = self.workspace.read(path)?;

        let prompt = format!(
            "You are debugging a source file.\n\
             Here is the current source code:\n\
             ----- SOURCE START -----\n\
             {current_source}\n\
             ----- SOURCE END -----\n\n\
             Here is the error output from running this file:\n\
             ----- ERROR START -----\n\
             {stderr}\n\
             ----- ERROR END -----\n\n\
             Return a FULLY CORRECTED version of the ENTIRE file.\n\
             Respond with ONLY the code. No explanations, no markdown, and no backticks."
        );

        let raw = self
            .backend
            .chat(&[
                ChatMessage::system(debugger.role.as_str()),
                ChatMessage::user(prompt),
            ])
            .await?;
        let fixed = strip_code_fences(&raw).trim().to_string();

        tracing::info!(path, "debugger rewrote file");
        self.workspace.write(path, &fixed)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::engine::testing::orchestrator;
    use crate::ledger::TaskStatus;

    #[tokio::test]
    async fn always_failing_file_runs_exactly_twice_then_run_failed() {
        // Reply 1: generated file (always fails). Reply 2: debugger "fix"
        // that still fails. max_retries = 1 → exactly 2 run attempts.
        let (_dir, backend, orch) = orchestrator([
            "echo first failure >&2\nexit 1",
            "echo second failure >&2\nexit 1",
        ]);

        let report = orch
            .generate_and_run("job.sh", "a failing script", Some(1))
            .await
            .unwrap();

        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.final_exit_code, 1);
        assert!(report.runs[0].stderr.contains("first failure"));
        assert!(report.runs[1].stderr.contains("second failure"));

        let task = orch.ledger().get(report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::RunFailed);
        assert!(task.message.contains("second failure"));

        // generation + one debug rewrite
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn success_on_second_attempt_records_run_success() {
        let (dir, backend, orch) = orchestrator([
            "echo broken >&2\nexit 1",
            "echo fixed\nexit 0",
        ]);

        let report = orch
            .generate_and_run("job.sh", "eventually works", Some(1))
            .await
            .unwrap();

        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.final_exit_code, 0);
        assert_eq!(backend.call_count(), 2, "one generation + one debug rewrite");

        let task = orch.ledger().get(report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::RunSuccess);

        // The debugger's rewrite is what's on disk now.
        let content = std::fs::read_to_string(dir.path().join("job.sh")).unwrap();
        assert!(content.contains("echo fixed"));

        // The debug prompt carried both the source and the stderr.
        let debug_prompt = backend.user_prompt(1);
        assert!(debug_prompt.contains("SOURCE START"));
        assert!(debug_prompt.contains("exit 1"));
        assert!(debug_prompt.contains("broken"));
    }

    #[tokio::test]
    async fn immediate_success_runs_once_with_no_debugger_call() {
        let (_dir, backend, orch) = orchestrator(["echo ok\nexit 0"]);

        let report = orch
            .generate_and_run("ok.sh", "works first try", None)
            .await
            .unwrap();

        assert_eq!(report.runs.len(), 1);
        assert_eq!(report.final_exit_code, 0);
        assert_eq!(backend.call_count(), 1, "generation only");

        let task = orch.ledger().get(report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::RunSuccess);
    }

    #[tokio::test]
    async fn zero_retries_fails_after_single_run() {
        let (_dir, backend, orch) = orchestrator(["exit 7"]);

        let report = orch
            .generate_and_run("once.sh", "no retries", Some(0))
            .await
            .unwrap();

        assert_eq!(report.runs.len(), 1);
        assert_eq!(report.final_exit_code, 7);
        assert_eq!(backend.call_count(), 1);

        let task = orch.ledger().get(report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::RunFailed);
    }
}
