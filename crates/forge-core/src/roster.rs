//! The agent roster: a named-mapping YAML document defining every persona
//! (role text + allowed tool names). Personas are configuration, not code —
//! meta-plans can add or update them at runtime via [`Roster::upsert`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::io::atomic_write;
use crate::paths::validate_agent_name;
use crate::plan::AgentSpec;

// ---------------------------------------------------------------------------
// AgentDef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub role: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterDoc {
    agents: BTreeMap<String, AgentDef>,
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Roster {
    path: PathBuf,
    agents: BTreeMap<String, AgentDef>,
}

impl Roster {
    /// Load the roster document. A missing file means the workspace was
    /// never initialized; a present-but-malformed document is a fatal
    /// configuration error, not a silent default.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForgeError::NotInitialized);
        }
        let data = std::fs::read_to_string(path)?;
        let doc: RosterDoc = serde_yaml::from_str(&data)
            .map_err(|e| ForgeError::RosterInvalid(format!("{}: {e}", path.display())))?;
        if doc.agents.is_empty() {
            return Err(ForgeError::RosterInvalid(format!(
                "{}: expected a non-empty 'agents' mapping",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            agents: doc.agents,
        })
    }

    /// Look up a persona. Unknown names are a configuration error at the
    /// point of use.
    pub fn get(&self, name: &str) -> Result<&AgentDef> {
        self.agents
            .get(name)
            .ok_or_else(|| ForgeError::UnknownAgent(name.to_string()))
    }

    /// Check that `agent` may invoke `tool`.
    pub fn ensure_tool_allowed(&self, agent: &str, tool: &str) -> Result<()> {
        let def = self.get(agent)?;
        if def.allowed_tools.iter().any(|t| t == tool) {
            return Ok(());
        }
        Err(ForgeError::ToolNotAllowed {
            agent: agent.to_string(),
            tool: tool.to_string(),
        })
    }

    /// Insert or replace a persona by name — last write wins.
    pub fn upsert(&mut self, name: &str, def: AgentDef) -> Result<()> {
        validate_agent_name(name)?;
        self.agents.insert(name.to_string(), def);
        Ok(())
    }

    /// Merge meta-plan agent specs into the roster. Entries with an empty
    /// name or role are skipped; invalid names fail loudly.
    pub fn merge_specs(&mut self, specs: &[AgentSpec]) -> Result<usize> {
        let mut merged = 0;
        for spec in specs {
            let name = spec.name.trim();
            let role = spec.role.trim();
            if name.is_empty() || role.is_empty() {
                continue;
            }
            self.upsert(
                name,
                AgentDef {
                    role: role.to_string(),
                    allowed_tools: spec.allowed_tools.clone(),
                },
            )?;
            merged += 1;
        }
        Ok(merged)
    }

    /// Persist the roster document atomically.
    pub fn save(&self) -> Result<()> {
        let doc = RosterDoc {
            agents: self.agents.clone(),
        };
        let data = serde_yaml::to_string(&doc)?;
        atomic_write(&self.path, data.as_bytes())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Default roster
// ---------------------------------------------------------------------------

/// The nine stock personas scaffolded by `forge init`.
pub fn default_roster_yaml() -> String {
    let mut agents = BTreeMap::new();

    let mut add = |name: &str, role: &str, tools: &[&str]| {
        agents.insert(
            name.to_string(),
            AgentDef {
                role: role.to_string(),
                allowed_tools: tools.iter().map(|t| t.to_string()).collect(),
            },
        );
    };

    add(
        "planner",
        "You are a software project planner. Given a high-level goal, you design \
         a small, well-structured file layout. You always respond with a single \
         JSON object matching the schema you are given: a 'summary' string and a \
         'files' list of {path, description, entrypoint} objects. No markdown.",
        &[],
    );
    add(
        "code_writer",
        "You are a careful software engineer. You write complete, runnable, \
         self-contained source files exactly matching the requirements you are \
         given. You respond with file content only: no explanations, no markdown, \
         no backticks.",
        &["filesystem"],
    );
    add(
        "runner",
        "You execute generated programs and report their output faithfully.",
        &["code_runner"],
    );
    add(
        "debugger",
        "You are a debugging specialist. Given a source file and the error output \
         from running it, you return a fully corrected version of the entire file. \
         You respond with code only: no explanations, no markdown, no backticks.",
        &["filesystem", "code_runner"],
    );
    add(
        "tester",
        "You run project test suites and summarize failures precisely.",
        &["test_runner"],
    );
    add(
        "sentinel_engineer",
        "You are the Sentinel engineer: defensive and correctness-obsessed. You \
         favor explicit error handling, input validation, and predictable control \
         flow over cleverness.",
        &[],
    );
    add(
        "storm_engineer",
        "You are the Storm engineer: pragmatic and fast. You favor the shortest \
         working implementation, standard-library solutions, and minimal \
         abstraction.",
        &[],
    );
    add(
        "creator_engineer",
        "You are the Creator engineer: design-minded. You favor clean interfaces, \
         clear naming, and structure that will survive the next three features.",
        &[],
    );
    add(
        "chief_engineer",
        "You are the chief engineer. You review candidate implementations from \
         other engineers and select or merge them into one final artifact of the \
         highest quality. You respond with the final content only.",
        &["filesystem"],
    );

    serde_yaml::to_string(&RosterDoc { agents }).expect("default roster serializes")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
