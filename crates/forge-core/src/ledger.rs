//! Durable task ledger: one row per unit of orchestrated work.
//!
//! Every operation (file generation, project build, meta-build) opens a task
//! in status `running` and completes it exactly once with a terminal status.
//! Ids are SQLite rowids: monotonically increasing, never reused.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Generated,
    Planned,
    Completed,
    Failed,
    RunSuccess,
    RunFailed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Generated => "generated",
            TaskStatus::Planned => "planned",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::RunSuccess => "run_success",
            TaskStatus::RunFailed => "run_failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "generated" => TaskStatus::Generated,
            "planned" => TaskStatus::Planned,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "run_success" => TaskStatus::RunSuccess,
            "run_failed" => TaskStatus::RunFailed,
            _ => TaskStatus::Running,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub goal: String,
    pub target: String,
    pub status: TaskStatus,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// TaskLedger
// ---------------------------------------------------------------------------

pub struct TaskLedger {
    conn: Mutex<Connection>,
}

impl TaskLedger {
    /// Open or create the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal TEXT NOT NULL,
                target TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new task in status `running` and return its id.
    pub fn create(&self, goal: &str, target: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tasks (goal, target, status, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, '', ?4, ?4)",
            rusqlite::params![goal, target, TaskStatus::Running.as_str(), now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the single completion of a task: status and message, stamped
    /// with a fresh `updated_at`.
    pub fn complete(&self, id: i64, status: TaskStatus, message: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, message = ?2, updated_at = ?3 WHERE id = ?4",
            rusqlite::params![status.as_str(), message, now, id],
        )?;
        if changed == 0 {
            return Err(ForgeError::TaskNotFound(id));
        }
        Ok(())
    }

    /// Fetch a single task by id.
    pub fn get(&self, id: i64) -> Result<TaskRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, goal, target, status, message, created_at, updated_at
             FROM tasks WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], row_to_record)?;
        rows.next()
            .transpose()?
            .ok_or(ForgeError::TaskNotFound(id))
    }

    /// Most-recent-first listing, optionally filtered to targets under a
    /// path prefix.
    pub fn list_recent(&self, limit: u32, target_prefix: Option<&str>) -> Result<Vec<TaskRecord>> {
        let mut out = Vec::new();
        let conn = self.conn.lock().unwrap();
        match target_prefix {
            Some(prefix) => {
                let mut stmt = conn.prepare(
                    "SELECT id, goal, target, status, message, created_at, updated_at
                     FROM tasks WHERE target LIKE ?1 ESCAPE '\\' ORDER BY id DESC LIMIT ?2",
                )?;
                let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
                let rows = stmt.query_map(rusqlite::params![pattern, limit], row_to_record)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, goal, target, status, message, created_at, updated_at
                     FROM tasks ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map([limit], row_to_record)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    let status: String = row.get(3)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        goal: row.get(1)?,
        target: row.get(2)?,
        status: TaskStatus::parse(&status),
        message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, TaskLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = TaskLedger::open(&dir.path().join("tasks.db")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn create_assigns_monotonic_ids() {
        let (_dir, ledger) = open_tmp();
        let a = ledger.create("first", "a.py").unwrap();
        let b = ledger.create("second", "b.py").unwrap();
        assert!(b > a);
    }

    #[test]
    fn task_lifecycle_running_to_terminal() {
        let (_dir, ledger) = open_tmp();
        let id = ledger.create("generate thing", "src/thing.py").unwrap();

        let task = ledger.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.message, "");

        ledger
            .complete(id, TaskStatus::Generated, "wrote 120 bytes")
            .unwrap();
        let task = ledger.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Generated);
        assert_eq!(task.message, "wrote 120 bytes");
    }

    #[test]
    fn complete_unknown_id_errors() {
        let (_dir, ledger) = open_tmp();
        let err = ledger.complete(999, TaskStatus::Failed, "boom").unwrap_err();
        assert!(matches!(err, ForgeError::TaskNotFound(999)));
    }

    #[test]
    fn list_recent_is_newest_first() {
        let (_dir, ledger) = open_tmp();
        for i in 0..5 {
            ledger.create(&format!("goal {i}"), "x.py").unwrap();
        }
        let recent = ledger.list_recent(3, None).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id);
        assert!(recent[1].id > recent[2].id);
    }

    #[test]
    fn list_recent_filters_by_target_prefix() {
        let (_dir, ledger) = open_tmp();
        ledger.create("a", "src/app/main.py").unwrap();
        ledger.create("b", "src/lib/util.py").unwrap();
        ledger.create("c", "src/app/cli.py").unwrap();

        let app = ledger.list_recent(10, Some("src/app/")).unwrap();
        assert_eq!(app.len(), 2);
        assert!(app.iter().all(|t| t.target.starts_with("src/app/")));
    }

    #[test]
    fn ids_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        let first = {
            let ledger = TaskLedger::open(&path).unwrap();
            ledger.create("persisted", "a.py").unwrap()
        };
        let ledger = TaskLedger::open(&path).unwrap();
        let next = ledger.create("after reopen", "b.py").unwrap();
        assert!(next > first);
        assert_eq!(ledger.get(first).unwrap().goal, "persisted");
    }
}
