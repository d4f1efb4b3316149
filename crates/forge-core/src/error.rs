use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("not initialized: run 'forge init'")]
    NotInitialized,

    #[error("model returned invalid JSON even after repair attempt: {source}\nJSON string was:\n{invalid}")]
    Protocol {
        invalid: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("planner returned no usable files")]
    EmptyPlan,

    #[error("triad meta-planning failed: no valid JSON meta-plans produced")]
    NoMetaCandidates,

    #[error("attempted path escape outside of the workspace root: {0}")]
    PathEscape(String),

    #[error("agent '{0}' is not defined in the roster")]
    UnknownAgent(String),

    #[error("agent '{agent}' is not allowed to use tool '{tool}'")]
    ToolNotAllowed { agent: String, tool: String },

    #[error("invalid agent roster: {0}")]
    RosterInvalid(String),

    #[error("invalid agent name '{0}': must be lowercase alphanumeric with underscores")]
    InvalidAgentName(String),

    #[error("task not found: {0}")]
    TaskNotFound(i64),

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error(transparent)]
    Gateway(#[from] model_gateway::GatewayError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
