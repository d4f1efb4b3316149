//! The single-file generation cycle: prompt the writer persona, strip
//! incidental fencing, persist through the confined workspace, and record
//! the attempt in both the ledger and the memory store.

use model_gateway::ChatMessage;

use crate::engine::{preview, EditOutcome, GenerateOutcome, Orchestrator, FINAL_PREVIEW_LEN};
use crate::error::Result;
use crate::ledger::TaskStatus;
use crate::memory::{MemoryStatus, DEFAULT_HINT_ENTRIES};
use crate::protocol::strip_code_fences;

impl Orchestrator {
    /// Generate one file at workspace-relative `path` from `description`.
    ///
    /// The ledger task and a memory entry are written on both outcomes;
    /// a raised error is fatal to the calling operation, never retried at
    /// this layer.
    pub async fn generate_file(&self, path: &str, description: &str) -> Result<GenerateOutcome> {
        let goal = format!("Generate file {path}: {description}");
        let task_id = self.ledger().create(&goal, path)?;
        tracing::info!(task_id, path, "generating file");

        match self.generate_inner(path, description).await {
            Ok((content, tool_result)) => {
                self.ledger()
                    .complete(task_id, TaskStatus::Generated, &tool_result)?;
                self.memory().remember(
                    "file",
                    description,
                    path,
                    MemoryStatus::Success,
                    &format!("Generated file {path}"),
                    serde_json::json!({ "tool_result": tool_result }),
                )?;
                Ok(GenerateOutcome {
                    task_id,
                    path: path.to_string(),
                    tool_result,
                    preview: preview(&content, FINAL_PREVIEW_LEN),
                    content,
                })
            }
            Err(e) => {
                self.ledger()
                    .complete(task_id, TaskStatus::Failed, &e.to_string())?;
                self.memory().remember(
                    "file",
                    description,
                    path,
                    MemoryStatus::Failed,
                    &format!("Failed generating file {path}: {e}"),
                    serde_json::json!({}),
                )?;
                Err(e)
            }
        }
    }

    async fn generate_inner(&self, path: &str, description: &str) -> Result<(String, String)> {
        let writer = self.roster().get("code_writer")?;

        let hint = self
            .memory()
            .hint(
                self.backend.as_ref(),
                "file",
                description,
                path,
                DEFAULT_HINT_ENTRIES,
            )
            .await?;
        let hint_text = if hint.is_empty() {
            String::new()
        } else {
            format!("\n\nHints from past experience:\n{hint}\n")
        };

        let prompt = format!(
            "Write a single, complete, runnable Python 3 source file.\n\
             - Target file path (for your information only): {path}\n\
             - The file must be pure Python 3 code ONLY.\n\
             - DO NOT use shell commands, bash, os.system, subprocess, or EOF heredocs.\n\
             - DO NOT write commands that create or modify files.\n\
             - Just write the Python code itself.\n\
             - Prefer a simple structure with a main() function and the usual\n\
             \x20 if __name__ == '__main__': main() pattern when appropriate.\n\
             \n\
             Requirements for this file:\n\
             {description}\n\
             {hint_text}\n\
             Respond with ONLY the file content. No explanations, no markdown, no backticks."
        );

        let raw = self
            .backend
            .chat(&[
                ChatMessage::system(writer.role.as_str()),
                ChatMessage::user(prompt),
            ])
            .await?;
        let content = strip_code_fences(&raw).trim().to_string();

        self.roster().ensure_tool_allowed("code_writer", "filesystem")?;
        let tool_result = self.workspace.write(path, &content)?;
        Ok((content, tool_result))
    }

    /// Edit an existing file in place, preserving behavior where possible.
    /// Falls back to creating the file when it doesn't exist.
    pub async fn edit_file(&self, path: &str, description: &str) -> Result<EditOutcome> {
        let current = if self.workspace.exists(path)? {
            self.workspace.read(path)?
        } else {
            String::new()
        };

        let role = "You are a senior code editor working on an existing project.\n\
             You MUST treat the current file content as the source of truth and EDIT it.\n\
             Rules:\n\
             - Preserve existing public APIs and behavior unless explicitly told to change them.\n\
             - Prefer minimal changes over full rewrites.\n\
             - If something is unclear or impossible without more context, leave a TODO comment \
             instead of guessing.\n\
             - Respond with ONLY the full updated file content (no explanations, no markdown).";

        let prompt = format!(
            "You are editing this existing file.\n\
             User request:\n{description}\n\n\
             Current file content:\n\
             ---------------- BEGIN FILE ----------------\n\
             {current}\n\
             ----------------- END FILE -----------------\n\n\
             Return ONLY the full updated file content. No explanations, no markdown."
        );

        let raw = self
            .backend
            .chat(&[ChatMessage::system(role), ChatMessage::user(prompt)])
            .await?;
        let content = strip_code_fences(&raw).trim().to_string();
        let tool_result = self.workspace.write(path, &content)?;

        Ok(EditOutcome {
            path: path.to_string(),
            tool_result,
            preview: preview(&content, FINAL_PREVIEW_LEN),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::orchestrator;
    use crate::error::ForgeError;

    #[tokio::test]
    async fn generate_writes_file_and_records_success() {
        let (dir, backend, orch) = orchestrator(["print('hello')"]);

        let outcome = orch
            .generate_file("app/main.py", "print a greeting")
            .await
            .unwrap();

        assert_eq!(outcome.content, "print('hello')");
        assert!(outcome.tool_result.contains("app/main.py"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app/main.py")).unwrap(),
            "print('hello')"
        );

        let task = orch.ledger().get(outcome.task_id).unwrap();
        assert_eq!(task.status, crate::ledger::TaskStatus::Generated);
        assert!(task.goal.contains("app/main.py"));

        let entries = orch.memory().load_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, crate::memory::MemoryStatus::Success);

        // Empty memory store at prompt time: exactly one (writer) call.
        assert_eq!(backend.call_count(), 1);
        let prompt = backend.user_prompt(0);
        assert!(prompt.contains("print a greeting"));
        assert!(!prompt.contains("Hints from past experience"));
    }

    #[tokio::test]
    async fn generate_strips_accidental_fences() {
        let (_dir, _backend, orch) = orchestrator(["```python\nx = 1\n```"]);
        let outcome = orch.generate_file("x.py", "set x").await.unwrap();
        assert_eq!(outcome.content, "x = 1");
    }

    #[tokio::test]
    async fn generate_failure_records_failed_task_and_memory() {
        // A path escape makes the workspace write fail after the model call.
        let (_dir, _backend, orch) = orchestrator(["content"]);
        let err = orch
            .generate_file("../escape.py", "break out")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::PathEscape(_)));

        let recent = orch.ledger().list_recent(1, None).unwrap();
        assert_eq!(recent[0].status, crate::ledger::TaskStatus::Failed);

        let entries = orch.memory().load_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, crate::memory::MemoryStatus::Failed);
        assert!(entries[0].summary.contains("Failed generating file"));
    }

    #[tokio::test]
    async fn generate_includes_memory_hint_when_relevant_history_exists() {
        let (_dir, backend, orch) = orchestrator([
            "Hints from past experience: the csv module worked well.",
            "import csv",
        ]);
        orch.memory()
            .remember(
                "file",
                "parse csv data",
                "tools/parse.py",
                crate::memory::MemoryStatus::Success,
                "used csv module",
                serde_json::json!({}),
            )
            .unwrap();

        let outcome = orch
            .generate_file("tools/reader.py", "parse csv data rows")
            .await
            .unwrap();
        assert_eq!(outcome.content, "import csv");

        // Call 0 compresses episodes, call 1 is the writer prompt with the
        // hint appended.
        assert_eq!(backend.call_count(), 2);
        let writer_prompt = backend.user_prompt(1);
        assert!(writer_prompt.contains("Hints from past experience"));
        assert!(writer_prompt.contains("csv module worked well"));
    }

    #[tokio::test]
    async fn edit_rewrites_existing_file_with_current_content_in_prompt() {
        let (dir, backend, orch) = orchestrator(["x = 2  # bumped"]);
        std::fs::write(dir.path().join("conf.py"), "x = 1").unwrap();

        let outcome = orch.edit_file("conf.py", "bump x to 2").await.unwrap();
        assert!(outcome.preview.contains("x = 2"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("conf.py")).unwrap(),
            "x = 2  # bumped"
        );

        let prompt = backend.user_prompt(0);
        assert!(prompt.contains("BEGIN FILE"));
        assert!(prompt.contains("x = 1"));
    }

    #[tokio::test]
    async fn edit_missing_file_creates_it() {
        let (dir, _backend, orch) = orchestrator(["fresh = True"]);
        orch.edit_file("new.py", "create it").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("new.py")).unwrap(),
            "fresh = True"
        );
    }
}
