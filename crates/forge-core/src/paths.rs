use crate::error::{ForgeError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FORGE_DIR: &str = ".forge";

pub const CONFIG_FILE: &str = ".forge/config.yaml";
pub const ROSTER_FILE: &str = ".forge/agents.yaml";
pub const LEDGER_FILE: &str = ".forge/tasks.db";
pub const MEMORY_FILE: &str = ".forge/memory.json";

pub const REQUIREMENTS_FILE: &str = "requirements.txt";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn forge_dir(root: &Path) -> PathBuf {
    root.join(FORGE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn roster_path(root: &Path) -> PathBuf {
    root.join(ROSTER_FILE)
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE)
}

pub fn memory_path(root: &Path) -> PathBuf {
    root.join(MEMORY_FILE)
}

// ---------------------------------------------------------------------------
// Agent name validation
// ---------------------------------------------------------------------------

static AGENT_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn agent_name_re() -> &'static Regex {
    AGENT_NAME_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap())
}

/// Roster keys double as config identifiers and prompt labels, so they are
/// held to snake_case identifiers.
pub fn validate_agent_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !agent_name_re().is_match(name) {
        return Err(ForgeError::InvalidAgentName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
