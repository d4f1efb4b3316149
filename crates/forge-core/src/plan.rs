//! Typed plan and meta-plan records, validated immediately after parse.
//!
//! Personas emit these as JSON; nothing downstream touches raw maps. Path
//! normalization lives here too: planner output routinely re-includes the
//! project root, uses backslashes, or sneaks in traversal segments, and all
//! of that is cleaned up in one place before any file is generated.

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entrypoint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

impl Plan {
    /// Validate and normalize every file path against `project_root`.
    /// A plan left with zero usable files is a protocol failure, not an
    /// empty success.
    pub fn normalized(mut self, project_root: &str) -> Result<Plan> {
        let root = normalize_root(project_root);
        self.files = self
            .files
            .into_iter()
            .filter_map(|f| {
                normalize_rel_path(&f.path, &root).map(|path| FileSpec {
                    path,
                    description: f.description.trim().to_string(),
                    entrypoint: f.entrypoint,
                })
            })
            .collect();

        if self.files.is_empty() {
            return Err(ForgeError::EmptyPlan);
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// MetaPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaPlan {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

impl MetaPlan {
    /// Force `project.root` to the caller-supplied root (the personas' own
    /// guess is informational only), default the summary to the goal, and
    /// deduplicate the dependency list preserving first occurrence.
    pub fn normalized(mut self, project_root: &str, goal: &str) -> MetaPlan {
        self.project.root = project_root.to_string();
        if self.project.summary.trim().is_empty() {
            self.project.summary = goal.to_string();
        }

        let mut seen = std::collections::HashSet::new();
        self.dependencies.retain(|d| {
            let key = d.trim().to_string();
            !key.is_empty() && seen.insert(key)
        });

        self
    }

    /// Files and tests flattened into one generation work list. Tests are
    /// never entrypoints.
    pub fn file_specs(&self) -> Vec<FileSpec> {
        let mut specs: Vec<FileSpec> = self
            .files
            .iter()
            .map(|f| FileSpec {
                path: f.path.trim().replace('\\', "/"),
                description: f.description.trim().to_string(),
                entrypoint: f.entrypoint,
            })
            .collect();
        specs.extend(self.tests.iter().map(|t| FileSpec {
            path: t.path.trim().replace('\\', "/"),
            description: t.description.trim().to_string(),
            entrypoint: false,
        }));
        specs.retain(|f| !f.path.is_empty());
        specs
    }
}

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Canonical comparison form of a project root: forward slashes, no leading
/// `./` or stray slashes.
pub fn normalize_root(root: &str) -> String {
    root.replace('\\', "/")
        .trim_matches(|c| c == '.' || c == '/')
        .to_string()
}

/// Normalize one planner-emitted path relative to the (already normalized)
/// project root. Returns `None` when the entry must be dropped: empty paths
/// and anything containing a `..` segment.
pub fn normalize_rel_path(path: &str, root_norm: &str) -> Option<String> {
    let mut path = path.trim().replace('\\', "/");
    while path.starts_with('/') {
        path.remove(0);
    }

    if path.split('/').any(|part| part == "..") {
        return None;
    }

    // Strip every leading repetition of the project-root prefix; personas
    // sometimes re-include it, occasionally more than once.
    if !root_norm.is_empty() {
        let prefix = format!("{root_norm}/");
        while path.starts_with(&prefix) {
            path = path[prefix.len()..].to_string();
        }
    }

    let path = path.trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileSpec {
        FileSpec {
            path: path.to_string(),
            description: "desc".to_string(),
            entrypoint: false,
        }
    }

    #[test]
    fn root_prefix_stripped_exactly_per_repetition() {
        let root = normalize_root("src/my_app");
        for (input, expected) in [
            ("main.py", Some("main.py")),                          // N = 0
            ("src/my_app/main.py", Some("main.py")),               // N = 1
            ("src/my_app/src/my_app/main.py", Some("main.py")),    // N = 2
            ("src/my_app/pkg/mod.py", Some("pkg/mod.py")),
        ] {
            assert_eq!(
                normalize_rel_path(input, &root).as_deref(),
                expected,
                "input: {input}"
            );
        }
    }

    #[test]
    fn traversal_segments_drop_the_entry() {
        let root = normalize_root("proj");
        assert_eq!(normalize_rel_path("../escape.py", &root), None);
        assert_eq!(normalize_rel_path("pkg/../../escape.py", &root), None);
        assert_eq!(normalize_rel_path("..", &root), None);
    }

    #[test]
    fn backslashes_and_leading_slashes_are_cleaned() {
        let root = normalize_root("proj");
        assert_eq!(
            normalize_rel_path("\\pkg\\mod.py", &root).as_deref(),
            Some("pkg/mod.py")
        );
        assert_eq!(
            normalize_rel_path("//abs/style.py", &root).as_deref(),
            Some("abs/style.py")
        );
    }

    #[test]
    fn empty_paths_are_dropped() {
        let root = normalize_root("proj");
        assert_eq!(normalize_rel_path("", &root), None);
        assert_eq!(normalize_rel_path("   ", &root), None);
        assert_eq!(normalize_rel_path("proj/", &root), None);
    }

    #[test]
    fn normalize_root_handles_dot_and_backslash_forms() {
        assert_eq!(normalize_root("./src/app"), "src/app");
        assert_eq!(normalize_root("src\\app"), "src/app");
        assert_eq!(normalize_root("/src/app/"), "src/app");
    }

    #[test]
    fn plan_with_only_bad_files_is_a_protocol_failure() {
        let plan = Plan {
            summary: "s".into(),
            files: vec![file("../nope.py"), file("")],
        };
        assert!(matches!(
            plan.normalized("proj"),
            Err(ForgeError::EmptyPlan)
        ));
    }

    #[test]
    fn plan_normalization_keeps_good_files() {
        let plan = Plan {
            summary: "demo".into(),
            files: vec![file("proj/main.py"), file("../bad.py"), file("util.py")],
        };
        let normalized = plan.normalized("proj").unwrap();
        let paths: Vec<&str> = normalized.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.py", "util.py"]);
    }

    #[test]
    fn plan_parses_from_planner_json() {
        let json = r#"{
            "summary": "small tool",
            "files": [
                {"path": "main.py", "description": "entry", "entrypoint": true},
                {"path": "util.py", "description": "helpers"}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.files.len(), 2);
        assert!(plan.files[0].entrypoint);
        assert!(!plan.files[1].entrypoint);
    }

    #[test]
    fn meta_plan_defaults_missing_keys_to_empty() {
        let meta: MetaPlan = serde_json::from_str(r#"{"project": {"root": "x"}}"#).unwrap();
        assert!(meta.agents.is_empty());
        assert!(meta.files.is_empty());
        assert!(meta.dependencies.is_empty());
        assert!(meta.tests.is_empty());
    }

    #[test]
    fn meta_plan_normalization_forces_root_and_dedupes_dependencies() {
        let meta = MetaPlan {
            project: ProjectInfo {
                root: "personas/own/guess".into(),
                summary: "".into(),
            },
            dependencies: vec![
                "requests".into(),
                "pdfplumber".into(),
                "requests".into(),
                "  ".into(),
            ],
            ..Default::default()
        };
        let meta = meta.normalized("real/root", "the goal");
        assert_eq!(meta.project.root, "real/root");
        assert_eq!(meta.project.summary, "the goal");
        assert_eq!(meta.dependencies, vec!["requests", "pdfplumber"]);
    }

    #[test]
    fn meta_plan_file_specs_include_tests_as_non_entrypoints() {
        let meta = MetaPlan {
            files: vec![FileSpec {
                path: "app.py".into(),
                description: "main".into(),
                entrypoint: true,
            }],
            tests: vec![TestSpec {
                path: "tests/test_app.py".into(),
                description: "covers app".into(),
            }],
            ..Default::default()
        };
        let specs = meta.file_specs();
        assert_eq!(specs.len(), 2);
        assert!(specs[0].entrypoint);
        assert!(!specs[1].entrypoint);
        assert_eq!(specs[1].path, "tests/test_app.py");
    }
}
