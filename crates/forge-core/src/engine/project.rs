//! Project planning and building.
//!
//! The standard path asks the planner persona for a file manifest (through
//! the bounded JSON repair cycle) and fans every file out through the
//! single-file generation cycle. The meta path asks the full triad for
//! richer meta-plans — agents, files, dependencies, tests — has the chief
//! merge them, and applies the result: roster upserts, a dependency
//! manifest, and the same per-file fan-out.

use std::collections::BTreeSet;

use model_gateway::ChatMessage;

use crate::engine::{BuildOutcome, GenerateOutcome, MetaBuildOutcome, Orchestrator};
use crate::error::{ForgeError, Result};
use crate::ledger::TaskStatus;
use crate::memory::{MemoryStatus, DEFAULT_HINT_ENTRIES};
use crate::paths::REQUIREMENTS_FILE;
use crate::plan::{normalize_rel_path, normalize_root, FileSpec, MetaPlan, Plan};
use crate::protocol::{extract_json, repair_cycle};
use crate::engine::triad::TRIAD_PERSONAS;

const PLAN_SCHEMA_HINT: &str = r#"{
  "summary": "short summary of the project",
  "files": [
    {
      "path": "relative/path.py",
      "description": "What goes in this file",
      "entrypoint": true or false
    }
  ]
}"#;

const META_SCHEMA_HINT: &str = r#"{
  "project": {
    "root": "string, project root path",
    "summary": "short summary of the project"
  },
  "agents": [
    {
      "name": "agent_name",
      "role": "detailed role description text",
      "allowed_tools": ["filesystem", "code_runner", "test_runner"]
    }
  ],
  "files": [
    {
      "path": "relative/path.py",
      "description": "what this file contains",
      "entrypoint": true or false
    }
  ],
  "dependencies": ["package1", "package2"],
  "tests": [
    {
      "path": "tests/test_file.py",
      "description": "what is tested here"
    }
  ]
}"#;

impl Orchestrator {
    // -----------------------------------------------------------------------
    // Standard plan + build
    // -----------------------------------------------------------------------

    /// Ask the planner persona for a normalized file manifest.
    async fn plan_project(&self, project_root: &str, goal: &str) -> Result<Plan> {
        let planner = self.roster().get("planner")?;

        let prompt = format!(
            "Design a small but well-structured Python project.\n\
             Project root (for your information only): {project_root}\n\n\
             High-level goal:\n{goal}\n\n\
             Remember:\n\
             - Respond with ONLY JSON following this schema:\n{PLAN_SCHEMA_HINT}\n\
             - No markdown, no comments, no extra text."
        );

        let plan: Plan =
            repair_cycle(self.backend.as_ref(), &planner.role, &prompt, PLAN_SCHEMA_HINT).await?;
        plan.normalized(project_root)
    }

    /// Plan a multi-file project and generate every file under
    /// `project_root`. The first file-generation failure aborts the
    /// remaining fan-out; the project task is completed `failed` before the
    /// error reaches the caller.
    pub async fn plan_and_build_project(
        &self,
        project_root: &str,
        goal: &str,
    ) -> Result<BuildOutcome> {
        let project_goal = format!("Plan and build project at {project_root}: {goal}");
        let project_task_id = self.ledger().create(&project_goal, project_root)?;
        tracing::info!(project_task_id, project_root, "planning project");

        let result = async {
            let plan = self.plan_project(project_root, goal).await?;
            self.ledger().complete(
                project_task_id,
                TaskStatus::Planned,
                &format!("Planned {} files. Summary: {}", plan.files.len(), plan.summary),
            )?;

            let files = self.build_files(project_root, goal, &plan.files).await?;
            Ok::<_, ForgeError>((plan, files))
        }
        .await;

        match result {
            Ok((plan, files)) => {
                self.ledger().complete(
                    project_task_id,
                    TaskStatus::Completed,
                    &format!("Generated {} files.", files.len()),
                )?;
                self.memory().remember(
                    "project",
                    goal,
                    project_root,
                    MemoryStatus::Success,
                    &format!("Built project at {project_root} ({} files)", files.len()),
                    serde_json::json!({ "files": files.len() }),
                )?;
                Ok(BuildOutcome {
                    project_task_id,
                    project_root: project_root.to_string(),
                    plan,
                    files,
                })
            }
            Err(e) => {
                self.ledger()
                    .complete(project_task_id, TaskStatus::Failed, &e.to_string())?;
                self.memory().remember(
                    "project",
                    goal,
                    project_root,
                    MemoryStatus::Failed,
                    &format!("Failed building project at {project_root}: {e}"),
                    serde_json::json!({}),
                )?;
                Err(e)
            }
        }
    }

    /// Generate each spec through the single-file cycle, enriched with the
    /// overall goal and its entrypoint annotation.
    async fn build_files(
        &self,
        project_root: &str,
        goal: &str,
        specs: &[FileSpec],
    ) -> Result<Vec<GenerateOutcome>> {
        let root_norm = normalize_root(project_root);
        let mut results = Vec::new();

        for spec in specs {
            let Some(rel_path) = normalize_rel_path(&spec.path, &root_norm) else {
                continue;
            };

            let full_path = if root_norm.is_empty() {
                rel_path
            } else {
                format!("{root_norm}/{rel_path}")
            };

            let full_desc = format!(
                "{}\n\nOverall project goal: {goal}\nThis file is{} the main entrypoint.",
                spec.description,
                if spec.entrypoint { "" } else { " not" },
            );

            let outcome = self.generate_file(&full_path, &full_desc).await?;
            results.push(outcome);
        }

        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Meta-plan + build
    // -----------------------------------------------------------------------

    /// Collect meta-plan proposals from the triad and have the chief merge
    /// them. Individual candidates that fail to parse are skipped — the
    /// triad redundancy tolerates a single bad candidate — but all three
    /// failing fails the build.
    async fn triad_meta_plan(
        &self,
        project_root: &str,
        goal: &str,
        hint: &str,
    ) -> Result<MetaPlan> {
        let hint_text = if hint.is_empty() {
            String::new()
        } else {
            format!("\n\nHints from past experience:\n{hint}\n")
        };

        let mut candidates: Vec<(String, MetaPlan)> = Vec::new();
        for (name, label) in TRIAD_PERSONAS {
            let agent = self.roster().get(name)?;

            let prompt = format!(
                "You are one of three collaborating software engineers.\n\
                 Your persona: {label} engineer.\n\n\
                 Your task is to propose a meta-plan for a Python project.\n\
                 Project root (for your information only): {project_root}\n\
                 High-level goal:\n{goal}\n\n\
                 Your meta-plan should describe:\n\
                 - Which AGENTS should be added or used (names, roles, allowed_tools).\n\
                 - Which FILES the project should contain (paths, descriptions, entrypoint flags).\n\
                 - Which DEPENDENCIES should be listed in requirements.txt.\n\
                 - Which TESTS should exist (paths + descriptions).\n\
                 {hint_text}\n\
                 Return a JSON object with the following structure:\n{META_SCHEMA_HINT}\n\
                 Respond with ONLY JSON. No markdown, no comments, no extra text."
            );

            let raw = self
                .backend
                .chat(&[
                    ChatMessage::system(agent.role.as_str()),
                    ChatMessage::user(prompt),
                ])
                .await?;

            match serde_json::from_str::<MetaPlan>(extract_json(&raw)) {
                Ok(plan) => candidates.push((label.to_string(), plan)),
                Err(e) => {
                    tracing::warn!(persona = name, error = %e, "skipping invalid meta-plan candidate");
                }
            }
        }

        if candidates.is_empty() {
            return Err(ForgeError::NoMetaCandidates);
        }

        let chief = self.roster().get("chief_engineer")?;

        let mut lines = vec![
            "You are the chief engineer.".to_string(),
            "You will receive several candidate META-PLANS for the SAME project.".to_string(),
            "Each meta-plan is a JSON object with keys: project, agents, files, dependencies, tests.".to_string(),
            "Your job is to MERGE them into ONE FINAL META-PLAN that follows the same schema.".to_string(),
            "You must:".to_string(),
            "- Preserve the best ideas from each candidate.".to_string(),
            "- Avoid duplicates in agents, files, dependencies, and tests.".to_string(),
            "- Ensure paths are coherent and under the given project root.".to_string(),
            "- Ensure each agent has a useful role and allowed_tools list.".to_string(),
            "- Ensure files have clear descriptions and at least one entrypoint file.".to_string(),
            "- Ensure dependencies cover all required libraries but are not redundant.".to_string(),
            "- Ensure tests make sense for the chosen structure.".to_string(),
            "Respond with ONLY a single JSON object following the schema. No markdown, no comments.".to_string(),
            format!("Project root (for your information only): {project_root}"),
            format!("High-level goal:\n{goal}\n"),
            "Here are the candidate meta-plans:".to_string(),
        ];
        for (idx, (label, plan)) in candidates.iter().enumerate() {
            lines.push(format!(
                "----- META-PLAN {n} ({label}) START -----\n{json}\n----- META-PLAN {n} END -----\n",
                n = idx + 1,
                json = serde_json::to_string_pretty(plan)?,
            ));
        }
        lines.push("\nNow produce the final merged meta-plan JSON.\nRemember: ONLY JSON, no extra text.".to_string());

        let chief_raw = self
            .backend
            .chat(&[
                ChatMessage::system(chief.role.as_str()),
                ChatMessage::user(lines.join("\n")),
            ])
            .await?;

        let merged = extract_json(&chief_raw);
        let meta_plan: MetaPlan =
            serde_json::from_str(merged).map_err(|source| ForgeError::Protocol {
                invalid: merged.to_string(),
                source,
            })?;

        Ok(meta_plan.normalized(project_root, goal))
    }

    /// Full meta-build: triad meta-plans, chief merge, then application —
    /// roster upserts, dependency manifest, and file generation fan-out.
    pub async fn meta_build_project(
        &mut self,
        project_root: &str,
        goal: &str,
    ) -> Result<MetaBuildOutcome> {
        let project_goal = format!("Meta-build project at {project_root}: {goal}");
        let project_task_id = self.ledger().create(&project_goal, project_root)?;
        tracing::info!(project_task_id, project_root, "meta-building project");

        let hint = self
            .memory()
            .hint(
                self.backend.as_ref(),
                "meta-project",
                goal,
                project_root,
                DEFAULT_HINT_ENTRIES,
            )
            .await?;

        let result = async {
            let meta_plan = self.triad_meta_plan(project_root, goal, &hint).await?;

            let merged = self.roster.merge_specs(&meta_plan.agents)?;
            if merged > 0 {
                self.roster.save()?;
                tracing::info!(merged, "updated agent roster from meta-plan");
            }

            self.write_requirements(project_root, &meta_plan.dependencies)?;

            let specs = meta_plan.file_specs();
            let files = self.build_files(project_root, goal, &specs).await?;
            Ok::<_, ForgeError>((meta_plan, files))
        }
        .await;

        match result {
            Ok((meta_plan, files)) => {
                self.ledger().complete(
                    project_task_id,
                    TaskStatus::Completed,
                    &format!("Meta-plan applied. Generated {} files.", files.len()),
                )?;
                self.memory().remember(
                    "meta-project",
                    goal,
                    project_root,
                    MemoryStatus::Success,
                    &format!("Meta-built project at {project_root} ({} files)", files.len()),
                    serde_json::json!({
                        "files": files.len(),
                        "agents": meta_plan.agents.len(),
                        "dependencies": meta_plan.dependencies.clone(),
                    }),
                )?;
                Ok(MetaBuildOutcome {
                    project_task_id,
                    project_root: project_root.to_string(),
                    meta_plan,
                    files,
                })
            }
            Err(e) => {
                self.ledger()
                    .complete(project_task_id, TaskStatus::Failed, &e.to_string())?;
                self.memory().remember(
                    "meta-project",
                    goal,
                    project_root,
                    MemoryStatus::Failed,
                    &format!("Failed meta-building project at {project_root}: {e}"),
                    serde_json::json!({}),
                )?;
                Err(e)
            }
        }
    }

    /// Write the deduplicated, sorted dependency manifest under the project
    /// root. Skipped entirely when the list is empty.
    fn write_requirements(&self, project_root: &str, dependencies: &[String]) -> Result<()> {
        let deps: BTreeSet<&str> = dependencies
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect();
        if deps.is_empty() {
            return Ok(());
        }

        let root_norm = normalize_root(project_root);
        let manifest_path = if root_norm.is_empty() {
            REQUIREMENTS_FILE.to_string()
        } else {
            format!("{root_norm}/{REQUIREMENTS_FILE}")
        };

        let mut content = deps.into_iter().collect::<Vec<_>>().join("\n");
        content.push('\n');
        self.workspace.write(&manifest_path, &content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
