//! Episodic memory: a durable log of past orchestration attempts, plus the
//! scoring pass that surfaces relevant episodes into new prompts.
//!
//! The store is one JSON file holding the full ordered entry collection;
//! every append re-serializes the whole collection and replaces the file
//! atomically. Scoring is a cheap local heuristic so the model call behind
//! [`MemoryStore::hint`] happens at most once per request, and only when
//! local evidence exists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use model_gateway::{ChatBackend, ChatMessage};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::atomic_write;

pub const DEFAULT_HINT_ENTRIES: usize = 5;

// ---------------------------------------------------------------------------
// MemoryEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Success,
    Failed,
    Partial,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Success => "success",
            MemoryStatus::Failed => "failed",
            MemoryStatus::Partial => "partial",
        }
    }
}

/// One remembered episode of the orchestrator doing something.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: u64,
    /// Operation tag: "file", "project", "meta-project", ...
    pub mode: String,
    pub goal: String,
    pub target: String,
    pub status: MemoryStatus,
    pub summary: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn goal_tokens(goal: &str) -> HashSet<String> {
    goal.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn path_tokens(target: &str) -> HashSet<String> {
    target
        .to_lowercase()
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Relevance of `entry` to a new (mode, goal, target) task:
/// +3 same mode, +1 per shared goal word, +2 per shared path segment,
/// +2 for a past success.
pub fn score_entry(
    entry: &MemoryEntry,
    mode: &str,
    goal_toks: &HashSet<String>,
    path_toks: &HashSet<String>,
) -> i64 {
    let mut s = 0i64;
    if entry.mode == mode {
        s += 3;
    }
    s += goal_tokens(&entry.goal).intersection(goal_toks).count() as i64;
    s += 2 * path_tokens(&entry.target).intersection(path_toks).count() as i64;
    if entry.status == MemoryStatus::Success {
        s += 2;
    }
    s
}

/// Rank `entries` by descending relevance, keeping only positive scores and
/// at most `max_entries`. The sort is stable, so equal scores keep their
/// original (chronological) order — the ranking is deterministic for a
/// fixed entry set.
pub fn rank_entries<'a>(
    entries: &'a [MemoryEntry],
    mode: &str,
    goal: &str,
    target: &str,
    max_entries: usize,
) -> Vec<&'a MemoryEntry> {
    let goal_toks = goal_tokens(goal);
    let path_toks = path_tokens(target);

    let mut scored: Vec<(i64, &MemoryEntry)> = entries
        .iter()
        .map(|e| (score_entry(e, mode, &goal_toks, &path_toks), e))
        .collect();
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));

    scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .take(max_entries)
        .map(|(_, e)| e)
        .collect()
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the full entry collection. A missing file is an empty store; an
    /// unreadable collection is treated the same way (and warned about)
    /// rather than poisoning every future operation.
    pub fn load_all(&self) -> Result<Vec<MemoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&data) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "memory store unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Append a new entry (id = max existing + 1) and rewrite the collection.
    pub fn remember(
        &self,
        mode: &str,
        goal: &str,
        target: &str,
        status: MemoryStatus,
        summary: &str,
        metadata: serde_json::Value,
    ) -> Result<MemoryEntry> {
        let mut entries = self.load_all()?;
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;

        let entry = MemoryEntry {
            id: next_id,
            mode: mode.to_string(),
            goal: goal.to_string(),
            target: target.to_string(),
            status,
            summary: summary.to_string(),
            metadata,
            created_at: Utc::now(),
        };
        entries.push(entry.clone());

        let data = serde_json::to_vec_pretty(&entries)?;
        atomic_write(&self.path, &data)?;
        Ok(entry)
    }

    /// Distill relevant past episodes into a short advisory for a new task.
    ///
    /// Returns an empty string — without calling the model — when the store
    /// is empty or nothing scores above zero.
    pub async fn hint(
        &self,
        backend: &dyn ChatBackend,
        mode: &str,
        goal: &str,
        target: &str,
        max_entries: usize,
    ) -> Result<String> {
        let entries = self.load_all()?;
        if entries.is_empty() {
            return Ok(String::new());
        }

        let top = rank_entries(&entries, mode, goal, target, max_entries);
        if top.is_empty() {
            return Ok(String::new());
        }

        let episodes = top
            .iter()
            .map(|e| {
                format!(
                    "- [#{}] mode={}, status={}, target={:?}, summary={}",
                    e.id,
                    e.mode,
                    e.status.as_str(),
                    e.target,
                    e.summary
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are the memory of a multi-agent coding system.\n\
             You will see a new task (mode + goal + target) and several past episodes.\n\
             Summarize what lessons or patterns from the past episodes should guide\n\
             the new task. Focus on:\n\
             - libraries/dependencies that were useful\n\
             - project structures that worked\n\
             - common pitfalls (e.g. import paths, missing requirements)\n\
             - anything that should be reused or avoided.\n\n\
             NEW TASK:\n- mode: {mode}\n- goal: {goal}\n- target: {target}\n\n\
             PAST EPISODES:\n{episodes}\n\n\
             Now write a short advisory note (3-10 lines) that can be included in\n\
             prompts to other agents. Plain text, no markdown, phrased as\n\
             'Hints from past experience: ...'."
        );

        let reply = backend
            .chat(&[
                ChatMessage::system("You are a helpful memory summarizer."),
                ChatMessage::user(prompt),
            ])
            .await?;

        Ok(reply.trim().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
