//! Triad consensus: three independently-styled personas each produce a full
//! candidate file, and the chief persona selects or merges them into the one
//! artifact that reaches disk. The engine imposes no scoring of its own —
//! merge judgment belongs to the chief.

use model_gateway::ChatMessage;

use crate::engine::{
    preview, CandidateSummary, Orchestrator, TriadOutcome, CANDIDATE_PREVIEW_LEN,
    FINAL_PREVIEW_LEN,
};
use crate::error::Result;
use crate::ledger::TaskStatus;
use crate::protocol::strip_code_fences;

/// The fixed trio of engineering personas, with their prompt labels.
pub const TRIAD_PERSONAS: [(&str, &str); 3] = [
    ("sentinel_engineer", "Sentinel"),
    ("storm_engineer", "Storm"),
    ("creator_engineer", "Creator"),
];

struct Candidate {
    name: String,
    label: String,
    code: String,
}

impl Orchestrator {
    /// Generate `path` via the triad: three full candidates, one chief
    /// merge, one write.
    pub async fn triad_generate_file(
        &self,
        path: &str,
        description: &str,
    ) -> Result<TriadOutcome> {
        let goal = format!("Triad generate file {path}: {description}");
        let task_id = self.ledger().create(&goal, path)?;

        match self.triad_inner(path, description).await {
            Ok((candidates, final_code, tool_result)) => {
                self.ledger().complete(
                    task_id,
                    TaskStatus::Generated,
                    &format!("Triad candidates: {}, wrote final file.", candidates.len()),
                )?;
                Ok(TriadOutcome {
                    task_id,
                    path: path.to_string(),
                    candidates: candidates
                        .iter()
                        .map(|c| CandidateSummary {
                            name: c.name.clone(),
                            label: c.label.clone(),
                            preview: preview(&c.code, CANDIDATE_PREVIEW_LEN),
                        })
                        .collect(),
                    final_preview: preview(&final_code, FINAL_PREVIEW_LEN),
                    tool_result,
                })
            }
            Err(e) => {
                self.ledger()
                    .complete(task_id, TaskStatus::Failed, &e.to_string())?;
                Err(e)
            }
        }
    }

    async fn triad_inner(
        &self,
        path: &str,
        description: &str,
    ) -> Result<(Vec<Candidate>, String, String)> {
        // 1) Independent candidates — no persona sees another's output.
        let mut candidates = Vec::with_capacity(TRIAD_PERSONAS.len());
        for (name, label) in TRIAD_PERSONAS {
            let agent = self.roster().get(name)?;

            let prompt = format!(
                "You are one of three collaborating software engineers.\n\
                 Your persona: {label} engineer.\n\n\
                 Your task is to produce a single, complete Python 3 source file that satisfies:\n\
                 - Target file path (for your information only): {path}\n\
                 - Requirements:\n{description}\n\n\
                 You should follow your own engineering style as described in your system role.\n\
                 Respond with ONLY the code for this file. No explanations, no markdown, no backticks."
            );

            let raw = self
                .backend
                .chat(&[
                    ChatMessage::system(agent.role.as_str()),
                    ChatMessage::user(prompt),
                ])
                .await?;

            tracing::debug!(persona = name, "collected triad candidate");
            candidates.push(Candidate {
                name: name.to_string(),
                label: label.to_string(),
                code: strip_code_fences(&raw).trim().to_string(),
            });
        }

        // 2) Chief selects or merges — its response is the final artifact,
        //    verbatim after fence stripping.
        let chief = self.roster().get("chief_engineer")?;

        let mut lines = vec![
            "You are the chief engineer. You will receive three candidate files \
             for the SAME target file. Your job is to choose or merge them into ONE final file."
                .to_string(),
            String::new(),
            format!("Target file path (for your information only): {path}"),
            format!("Original requirements:\n{description}"),
            String::new(),
            "Here are the candidates:".to_string(),
        ];
        for (idx, cand) in candidates.iter().enumerate() {
            lines.push(format!(
                "\nCandidate {n} ({label}):\n\
                 ----- CANDIDATE {n} START -----\n\
                 {code}\n\
                 ----- CANDIDATE {n} END -----",
                n = idx + 1,
                label = cand.label,
                code = cand.code,
            ));
        }
        lines.push(
            "\nInstructions:\n\
             - Carefully compare the candidates.\n\
             - Choose the best one, or merge their ideas into a single improved file.\n\
             - The final result must be valid, runnable code.\n\
             - Respond with ONLY the final code. No commentary, no markdown, no backticks."
                .to_string(),
        );

        let chief_raw = self
            .backend
            .chat(&[
                ChatMessage::system(chief.role.as_str()),
                ChatMessage::user(lines.join("\n")),
            ])
            .await?;
        let final_code = strip_code_fences(&chief_raw).trim().to_string();

        // 3) Only the chief's artifact is written to disk.
        self.roster().ensure_tool_allowed("code_writer", "filesystem")?;
        let tool_result = self.workspace.write(path, &final_code)?;

        Ok((candidates, final_code, tool_result))
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
    async fn chief_receives_all_three_labeled_candidates() {
        // Two identical candidates and one divergent — the engine must pass
        // all three through distinctly labeled and take the chief verbatim.
        let (dir, backend, orch) = orchestrator([
            "shared = 'impl'",
            "shared = 'impl'",
            "divergent = 'impl'",
            "final_artifact = 'merged'",
        ]);

        let outcome = orch
            .triad_generate_file("mod.py", "a module")
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 4);
        let chief_prompt = backend.user_prompt(3);
        assert!(chief_prompt.contains("Candidate 1 (Sentinel)"));
        assert!(chief_prompt.contains("Candidate 2 (Storm)"));
        assert!(chief_prompt.contains("Candidate 3 (Creator)"));
        assert!(chief_prompt.contains("divergent = 'impl'"));
        assert!(chief_prompt.contains("a module"));

        // No post-filtering: whatever the chief returned is on disk.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mod.py")).unwrap(),
            "final_artifact = 'merged'"
        );
        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(outcome.candidates[0].label, "Sentinel");

        let task = orch.ledger().get(outcome.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Generated);
        assert!(task.message.contains("Triad candidates: 3"));
    }

    #[tokio::test]
    async fn candidate_previews_are_bounded() {
        let long_candidate = "x".repeat(1000);
        let (_dir, _backend, orch) = orchestrator([
            long_candidate.clone(),
            long_candidate.clone(),
            long_candidate.clone(),
            long_candidate,
        ]);

        let outcome = orch
            .triad_generate_file("big.py", "something large")
            .await
            .unwrap();
        assert_eq!(outcome.candidates[0].preview.len(), 200);
        assert_eq!(outcome.final_preview.len(), 400);
    }

    #[tokio::test]
    async fn personas_are_prompted_independently() {
        let (_dir, backend, orch) = orchestrator(["a", "b", "c", "final"]);
        orch.triad_generate_file("f.py", "desc").await.unwrap();

        // No candidate prompt contains another persona's output.
        for idx in 0..3 {
            let prompt = backend.user_prompt(idx);
            assert!(!prompt.contains("CANDIDATE"));
            assert!(prompt.contains("collaborating software engineers"));
        }
    }

    #[tokio::test]
    async fn backend_failure_marks_task_failed() {
        // Only two replies for four needed calls — the third persona call
        // errors, and the ledger must still record the failure.
        let (_dir, _backend, orch) = orchestrator(["a", "b"]);
        let err = orch.triad_generate_file("f.py", "desc").await;
        assert!(err.is_err());

        let recent = orch.ledger().list_recent(1, None).unwrap();
        assert_eq!(recent[0].status, TaskStatus::Failed);
    }
}
