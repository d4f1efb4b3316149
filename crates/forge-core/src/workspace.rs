//! Workspace-confined file access. Every read and write the personas cause
//! goes through here; any path resolving outside the workspace root fails
//! rather than succeeds.

use std::path::{Component, Path, PathBuf};

use crate::error::{ForgeError, Result};

pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path, rejecting absolute paths and any
    /// traversal segment. The check is lexical so it also covers paths that
    /// don't exist yet.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if rel.is_absolute() {
            return Err(ForgeError::PathEscape(relative.to_string()));
        }
        for component in rel.components() {
            match component {
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    return Err(ForgeError::PathEscape(relative.to_string()));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }
        Ok(self.root.join(rel))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        Ok(std::fs::read_to_string(path)?)
    }

    /// Write `content`, creating parent directories. Returns a short
    /// confirmation used in ledger messages and memory metadata.
    pub fn write(&self, relative: &str, content: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(format!("wrote {} bytes to {relative}", content.len()))
    }

    pub fn exists(&self, relative: &str) -> Result<bool> {
        Ok(self.resolve(relative)?.exists())
    }

    /// All files under `relative` (or the whole workspace), as
    /// root-relative forward-slash paths.
    pub fn list(&self, relative: &str) -> Result<Vec<String>> {
        let dir = self.resolve(relative)?;
        let mut out = Vec::new();
        if dir.is_dir() {
            collect_files(&dir, &self.root, &mut out)?;
        }
        out.sort();
        Ok(out)
    }
}

fn collect_files(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, root, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
