use axum::extract::{Query, State};
use axum::Json;
use forge_core::ledger::TaskLedger;
use forge_core::memory::MemoryStore;
use forge_core::paths;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Ledger / memory listings
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub target: Option<String>,
}

fn default_limit() -> u32 {
    20
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    let ledger = TaskLedger::open(&paths::ledger_path(&state.root))?;
    let tasks = ledger.list_recent(params.limit, params.target.as_deref())?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn list_memory(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    let store = MemoryStore::new(paths::memory_path(&state.root));
    let mut entries = store.load_all()?;
    entries.reverse();
    entries.truncate(params.limit as usize);
    Ok(Json(json!({ "entries": entries })))
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub triad: bool,
    #[serde(default)]
    pub run: bool,
    pub max_retries: Option<u32>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    let orch = state.orchestrator()?;

    if req.triad {
        let outcome = orch.triad_generate_file(&req.path, &req.description).await?;
        return Ok(Json(serde_json::to_value(outcome)?));
    }
    if req.run {
        let report = orch
            .generate_and_run(&req.path, &req.description, req.max_retries)
            .await?;
        return Ok(Json(serde_json::to_value(report)?));
    }
    let outcome = orch.generate_file(&req.path, &req.description).await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

#[derive(Deserialize)]
pub struct EditRequest {
    pub path: String,
    pub description: String,
}

pub async fn edit(
    State(state): State<AppState>,
    Json(req): Json<EditRequest>,
) -> Result<Json<Value>, AppError> {
    let orch = state.orchestrator()?;
    let outcome = orch.edit_file(&req.path, &req.description).await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub project_root: String,
    pub goal: String,
}

pub async fn build_project(
    State(state): State<AppState>,
    Json(req): Json<ProjectRequest>,
) -> Result<Json<Value>, AppError> {
    let orch = state.orchestrator()?;
    let outcome = orch
        .plan_and_build_project(&req.project_root, &req.goal)
        .await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

pub async fn meta_build(
    State(state): State<AppState>,
    Json(req): Json<ProjectRequest>,
) -> Result<Json<Value>, AppError> {
    let mut orch = state.orchestrator()?;
    let outcome = orch.meta_build_project(&req.project_root, &req.goal).await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

#[derive(Deserialize)]
pub struct TestRequest {
    pub project_root: String,
}

pub async fn run_tests(
    State(state): State<AppState>,
    Json(req): Json<TestRequest>,
) -> Result<Json<Value>, AppError> {
    let orch = state.orchestrator()?;
    let result = orch.run_project_tests(&req.project_root).await?;
    Ok(Json(serde_json::to_value(result)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
