//! Subprocess execution for generated code: run one script, or a project's
//! test suite, with a hard timeout and captured output.
//!
//! Stdout and stderr are drained by background tasks while the child runs,
//! so a chatty script can never deadlock the pipe. On timeout the child is
//! killed and the result is reported in-band (exit code -1, a timeout note
//! in stderr) — run attempts are data for the debug loop, not exceptions.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{ForgeError, Result};

pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub cmd: Vec<String>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub cmd: Vec<String>,
    pub workdir: String,
}

// ---------------------------------------------------------------------------
// ScriptRunner
// ---------------------------------------------------------------------------

/// Runs generated scripts under the configured interpreter, confined to the
/// workspace root.
pub struct ScriptRunner {
    root: PathBuf,
    interpreter: String,
}

impl ScriptRunner {
    pub fn new(root: &Path, interpreter: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            interpreter: interpreter.into(),
        }
    }

    /// Run the script at workspace-relative `path` with a hard timeout.
    pub async fn run(
        &self,
        path: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<RunOutput> {
        let script = resolve_confined(&self.root, path)?;

        let mut cmd_line = vec![
            self.interpreter.clone(),
            script.to_string_lossy().into_owned(),
        ];
        cmd_line.extend(args.iter().cloned());

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&script)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        run_with_timeout(command, cmd_line, timeout).await
    }
}

// ---------------------------------------------------------------------------
// TestRunner
// ---------------------------------------------------------------------------

/// Runs a project's test suite (pytest by convention) in its root.
pub struct TestRunner {
    root: PathBuf,
    test_command: String,
}

impl TestRunner {
    pub fn new(root: &Path, test_command: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            test_command: test_command.into(),
        }
    }

    /// Run tests for `project_root` (workspace-relative). A missing tests
    /// directory is not an error: the runner is invoked in the project root
    /// and the framework reports "no tests collected".
    pub async fn run(&self, project_root: &str, tests_path: Option<&str>) -> Result<TestOutput> {
        let workdir = resolve_confined(&self.root, project_root)?;
        let tests_dir = workdir.join(tests_path.unwrap_or("tests"));

        let mut cmd_line = vec![self.test_command.clone()];
        let mut command = Command::new(&self.test_command);
        if tests_dir.exists() {
            command.arg(&tests_dir);
            cmd_line.push(tests_dir.to_string_lossy().into_owned());
        }
        command
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let workdir_str = workdir.to_string_lossy().into_owned();
        match run_with_timeout(command, cmd_line.clone(), DEFAULT_TEST_TIMEOUT).await {
            Ok(out) => Ok(TestOutput {
                exit_code: out.exit_code,
                stdout: out.stdout,
                stderr: out.stderr,
                cmd: out.cmd,
                workdir: workdir_str,
            }),
            // Spawn failures (e.g. pytest not installed) are reported
            // in-band, matching the script-vs-infrastructure split callers
            // expect from a test run.
            Err(e) => Ok(TestOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
                cmd: cmd_line,
                workdir: workdir_str,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

fn resolve_confined(root: &Path, relative: &str) -> Result<PathBuf> {
    use std::path::Component;
    let rel = Path::new(relative);
    if rel.is_absolute() {
        return Err(ForgeError::PathEscape(relative.to_string()));
    }
    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
    {
        return Err(ForgeError::PathEscape(relative.to_string()));
    }
    Ok(root.join(rel))
}

async fn run_with_timeout(
    mut command: Command,
    cmd_line: Vec<String>,
    timeout: Duration,
) -> Result<RunOutput> {
    let mut child = command.spawn()?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => (status?.code().unwrap_or(-1), false),
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "process timed out, killing");
            let _ = child.kill().await;
            let _ = child.wait().await;
            (-1, true)
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let mut stderr = stderr_task.await.unwrap_or_default();

    if timed_out {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "process timed out after {}s and was killed",
            timeout.as_secs()
        ));
    }

    tracing::debug!(exit_code, timed_out, "process finished");
    Ok(RunOutput {
        exit_code,
        stdout,
        stderr,
        cmd: cmd_line,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> ScriptRunner {
        // `sh` is universally available in test environments; the engine
        // configures a real interpreter from config.
        ScriptRunner::new(dir.path(), "sh")
    }

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.sh"), "echo hello\n").unwrap();

        let out = runner(&dir)
            .run("ok.sh", &[], DEFAULT_RUN_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn run_captures_stderr_on_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.sh"), "echo broken >&2\nexit 3\n").unwrap();

        let out = runner(&dir)
            .run("bad.sh", &[], DEFAULT_RUN_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("broken"));
    }

    #[tokio::test]
    async fn run_kills_on_timeout() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("slow.sh"), "sleep 30\n").unwrap();

        let out = runner(&dir)
            .run("slow.sh", &[], Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(out.exit_code, -1);
        assert!(out.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn run_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let err = runner(&dir)
            .run("../outside.sh", &[], DEFAULT_RUN_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::PathEscape(_)));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_command_in_band() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("proj")).unwrap();

        let runner = TestRunner::new(dir.path(), "definitely-not-a-real-test-tool");
        let out = runner.run("proj", None).await.unwrap();
        assert_eq!(out.exit_code, -1);
        assert!(!out.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_runner_appends_tests_dir_only_when_present() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("proj/tests")).unwrap();

        // `true` exits 0 regardless of args; we only inspect the command line.
        let runner = TestRunner::new(dir.path(), "true");
        let with_tests = runner.run("proj", None).await.unwrap();
        assert_eq!(with_tests.cmd.len(), 2);

        std::fs::remove_dir_all(dir.path().join("proj/tests")).unwrap();
        let without_tests = runner.run("proj", None).await.unwrap();
        assert_eq!(without_tests.cmd.len(), 1);
        assert_eq!(without_tests.exit_code, 0);
    }
}
