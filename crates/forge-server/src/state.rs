use std::path::PathBuf;
use std::sync::Arc;

use forge_core::engine::Orchestrator;
use model_gateway::ChatBackend;

use crate::error::AppError;

/// Shared request state: the workspace root and the chat backend.
///
/// The engine itself is opened per request — it holds a SQLite connection,
/// and a fresh open keeps handlers free of cross-request locking.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub backend: Arc<dyn ChatBackend>,
}

impl AppState {
    pub fn new(root: PathBuf, backend: Arc<dyn ChatBackend>) -> Self {
        Self { root, backend }
    }

    pub fn orchestrator(&self) -> Result<Orchestrator, AppError> {
        Ok(Orchestrator::open(&self.root, self.backend.clone())?)
    }
}
