//! The orchestration engine: wires the ledger, memory store, roster,
//! workspace, and model backend into the high-level operations.
//!
//! One [`Orchestrator`] drives one workspace. Operations are sequential —
//! persona calls within an operation never overlap, and every operation
//! records its outcome in the ledger before any error propagates to the
//! caller.

mod debug_loop;
mod generate;
mod project;
mod triad;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use model_gateway::ChatBackend;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::ledger::TaskLedger;
use crate::memory::MemoryStore;
use crate::paths;
use crate::plan::{MetaPlan, Plan};
use crate::process::{RunOutput, TestOutput, TestRunner};
use crate::roster::Roster;
use crate::workspace::Workspace;

pub use triad::TRIAD_PERSONAS;

/// Bounded preview of the final artifact carried in outcome records.
pub const FINAL_PREVIEW_LEN: usize = 400;
/// Bounded preview of each triad candidate.
pub const CANDIDATE_PREVIEW_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Outcome records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOutcome {
    pub task_id: i64,
    pub path: String,
    pub tool_result: String,
    pub content: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub path: String,
    pub tool_result: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub name: String,
    pub label: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriadOutcome {
    pub task_id: i64,
    pub path: String,
    pub candidates: Vec<CandidateSummary>,
    pub final_preview: String,
    pub tool_result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task_id: i64,
    pub path: String,
    pub generate: GenerateOutcome,
    pub runs: Vec<RunOutput>,
    pub final_exit_code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub project_task_id: i64,
    pub project_root: String,
    pub plan: Plan,
    pub files: Vec<GenerateOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaBuildOutcome {
    pub project_task_id: i64,
    pub project_root: String,
    pub meta_plan: MetaPlan,
    pub files: Vec<GenerateOutcome>,
}

/// First `n` characters of `text` (not bytes — previews must never split a
/// UTF-8 character).
pub(crate) fn preview(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    root: PathBuf,
    config: Config,
    backend: Arc<dyn ChatBackend>,
    ledger: TaskLedger,
    memory: MemoryStore,
    roster: Roster,
    workspace: Workspace,
}

impl Orchestrator {
    /// Open an initialized workspace with its on-disk config.
    pub fn open(root: &Path, backend: Arc<dyn ChatBackend>) -> Result<Self> {
        let config = Config::load(root)?;
        Self::with_config(root, config, backend)
    }

    /// Open with an explicit config (used by front-ends and tests).
    pub fn with_config(
        root: &Path,
        config: Config,
        backend: Arc<dyn ChatBackend>,
    ) -> Result<Self> {
        let roster = Roster::load(&paths::roster_path(root))?;
        let ledger = TaskLedger::open(&paths::ledger_path(root))?;
        let memory = MemoryStore::new(paths::memory_path(root));
        let workspace = Workspace::new(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            backend,
            ledger,
            memory,
            roster,
            workspace,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Run the project's test suite (missing tests directories simply
    /// collect nothing).
    pub async fn run_project_tests(&self, project_root: &str) -> Result<TestOutput> {
        self.roster
            .ensure_tool_allowed("tester", "test_runner")?;
        let runner = TestRunner::new(self.workspace.root(), &self.config.runner.test_command);
        runner.run(project_root, None).await
    }
}

// ---------------------------------------------------------------------------
// Test fixtures shared by the engine submodules
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::roster::default_roster_yaml;
    use model_gateway::scripted::ScriptedBackend;
    use tempfile::TempDir;

    /// A workspace with the default roster scaffolded, a `sh` interpreter
    /// (universally available under test), and a scripted backend.
    pub fn orchestrator(
        replies: impl IntoIterator<Item = impl Into<String>>,
    ) -> (TempDir, Arc<ScriptedBackend>, Orchestrator) {
        orchestrator_with_config(replies, |_| {})
    }

    /// Same as [`orchestrator`], with a hook to adjust the config first.
    pub fn orchestrator_with_config(
        replies: impl IntoIterator<Item = impl Into<String>>,
        adjust: impl FnOnce(&mut Config),
    ) -> (TempDir, Arc<ScriptedBackend>, Orchestrator) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".forge")).unwrap();
        std::fs::write(dir.path().join(".forge/agents.yaml"), default_roster_yaml()).unwrap();

        let mut config = Config::default();
        config.runner.interpreter = "sh".to_string();
        config.runner.run_timeout_secs = 10;
        adjust(&mut config);

        let backend = Arc::new(ScriptedBackend::new(replies));
        let orch = Orchestrator::with_config(dir.path(), config, backend.clone()).unwrap();
        (dir, backend, orch)
    }
}
